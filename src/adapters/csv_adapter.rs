//! CSV directory data adapter.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with a header row. The `date`
//! and `close` columns are found by name, so both `date,open,high,low,close,volume`
//! and Yahoo-style `Date,Open,High,Low,Close,Adj Close,Volume` exports load.
//! Files are snapshots: the lookback window is anchored at the last date in
//! the file, not at today.

use crate::domain::error::DataError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn malformed(ticker: &str, reason: impl Into<String>) -> DataError {
    DataError::Malformed {
        ticker: ticker.to_string(),
        reason: reason.into(),
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

impl DataPort for CsvAdapter {
    fn fetch_history(&self, ticker: &str, lookback: Duration) -> Result<PriceSeries, DataError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DataError::UnknownTicker {
                ticker: ticker.to_string(),
            },
            _ => DataError::Unavailable {
                ticker: ticker.to_string(),
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| malformed(ticker, format!("CSV header error: {}", e)))?
            .clone();
        let date_col =
            find_column(&headers, "date").ok_or_else(|| malformed(ticker, "missing date column"))?;
        let close_col = find_column(&headers, "close")
            .ok_or_else(|| malformed(ticker, "missing close column"))?;

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| malformed(ticker, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(date_col)
                .ok_or_else(|| malformed(ticker, format!("row {}: missing date", line + 1)))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                malformed(ticker, format!("row {}: invalid date format: {}", line + 1, e))
            })?;

            let close_str = record
                .get(close_col)
                .ok_or_else(|| malformed(ticker, format!("row {}: missing close", line + 1)))?
                .trim();
            // exports mark holidays and halted days with blank or "null" closes
            if close_str.is_empty() || close_str.eq_ignore_ascii_case("null") {
                continue;
            }
            let close: f64 = close_str.parse().map_err(|e| {
                malformed(ticker, format!("row {}: invalid close value: {}", line + 1, e))
            })?;

            points.push(PricePoint::new(date, close));
        }

        let series = PriceSeries::new(ticker, points);
        match series.last().map(|p| p.date) {
            // a lookback reaching past the calendar keeps the whole file
            Some(last) => match last.checked_sub_signed(lookback) {
                Some(start) => Ok(series.since(start)),
                None => Ok(series),
            },
            None => Ok(series),
        }
    }

    fn list_tickers(&self) -> Result<Vec<String>, DataError> {
        let unavailable = |reason: String| DataError::Unavailable {
            ticker: "*".to_string(),
            reason,
        };
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            unavailable(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}
