#![allow(dead_code)]

use chrono::NaiveDate;
use smartdca::domain::error::DataError;
use smartdca::domain::price_series::{PricePoint, PriceSeries};
use smartdca::ports::data_port::DataPort;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub enum MockError {
    Unknown,
    Unavailable(String),
    Malformed(String),
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<f64>>,
    pub errors: HashMap<String, MockError>,
    pub delays: HashMap<String, Duration>,
    pub fetches: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            delays: HashMap::new(),
            fetches: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_closes(mut self, ticker: &str, closes: Vec<f64>) -> Self {
        self.data.insert(ticker.to_string(), closes);
        self
    }

    pub fn with_error(mut self, ticker: &str, error: MockError) -> Self {
        self.errors.insert(ticker.to_string(), error);
        self
    }

    pub fn with_delay(mut self, ticker: &str, delay: Duration) -> Self {
        self.delays.insert(ticker.to_string(), delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn fetch_history(
        &self,
        ticker: &str,
        _lookback: chrono::Duration,
    ) -> Result<PriceSeries, DataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(ticker) {
            std::thread::sleep(*delay);
        }

        let result = if let Some(error) = self.errors.get(ticker) {
            Err(match error {
                MockError::Unknown => DataError::UnknownTicker {
                    ticker: ticker.to_string(),
                },
                MockError::Unavailable(reason) => DataError::Unavailable {
                    ticker: ticker.to_string(),
                    reason: reason.clone(),
                },
                MockError::Malformed(reason) => DataError::Malformed {
                    ticker: ticker.to_string(),
                    reason: reason.clone(),
                },
            })
        } else {
            match self.data.get(ticker) {
                Some(closes) => Ok(series(ticker, closes)),
                None => Err(DataError::UnknownTicker {
                    ticker: ticker.to_string(),
                }),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn list_tickers(&self) -> Result<Vec<String>, DataError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let start = date(2023, 1, 2);
    PriceSeries::new(
        ticker,
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c))
            .collect(),
    )
}

pub fn flat(price: f64, count: usize) -> Vec<f64> {
    vec![price; count]
}

/// 300 closes ending at `current`, where the trailing 200 average `trend` and
/// the trailing 252 peak at `high` (or `current`, if higher).
pub fn shaped(current: f64, trend: f64, high: f64) -> Vec<f64> {
    // first 100 points sit outside the trend window but inside the high window
    let mut closes = vec![high; 100];
    let fill = (trend * 200.0 - current) / 199.0;
    assert!(fill <= high.max(current), "fill {fill} exceeds high {high}");
    closes.extend(vec![fill; 199]);
    closes.push(current);
    closes
}

pub fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
