//! Yahoo Finance chart-API data adapter.
//!
//! Uses the public v8 chart endpoint with explicit `period1`/`period2` bounds
//! and daily bars. The adjusted close series is preferred when the response
//! carries one; null points (holidays, halts) are skipped.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Deserialize;

use crate::domain::error::DataError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::data_port::DataPort;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = concat!("smartdca/", env!("CARGO_PKG_VERSION"));

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(timeout: StdDuration) -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: StdDuration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Unavailable {
                ticker: "*".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, ticker: &str, lookback: Duration) -> String {
        let now = Utc::now();
        let start = now - lookback;
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(ticker),
            start.timestamp(),
            now.timestamp()
        )
    }
}

impl DataPort for YahooAdapter {
    fn fetch_history(&self, ticker: &str, lookback: Duration) -> Result<PriceSeries, DataError> {
        let url = self.chart_url(ticker, lookback);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header("referer", "https://finance.yahoo.com/")
            .send()
            .map_err(|e| DataError::Unavailable {
                ticker: ticker.to_string(),
                reason: format!("yahoo transport error: {e}"),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| DataError::Unavailable {
            ticker: ticker.to_string(),
            reason: format!("failed to read yahoo response: {e}"),
        })?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::UnknownTicker {
                ticker: ticker.to_string(),
            });
        }
        if !status.is_success() {
            // chart errors still come back as JSON with a reason we can classify
            if let Err(err @ DataError::UnknownTicker { .. }) = parse_chart(ticker, &body) {
                return Err(err);
            }
            return Err(DataError::Unavailable {
                ticker: ticker.to_string(),
                reason: format!("yahoo returned status {}", status.as_u16()),
            });
        }

        parse_chart(ticker, &body)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Converts a chart-API JSON body into a price series.
pub fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries, DataError> {
    let malformed = |reason: String| DataError::Malformed {
        ticker: ticker.to_string(),
        reason,
    };

    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| malformed(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(DataError::UnknownTicker {
                ticker: ticker.to_string(),
            });
        }
        return Err(DataError::Unavailable {
            ticker: ticker.to_string(),
            reason: format!("yahoo chart error {}: {}", error.code, error.description),
        });
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| malformed("no chart data in response".to_string()))?;

    // a valid symbol with no trading history yet has no timestamps
    let timestamps = match result.timestamp {
        Some(ts) => ts,
        None => return Ok(PriceSeries::empty(ticker)),
    };

    let adjusted = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .filter(|a| a.len() == timestamps.len());
    let closes = match adjusted {
        Some(adj) => adj,
        None => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .ok_or_else(|| malformed("no quote data".to_string()))?,
    };

    let mut points = Vec::with_capacity(timestamps.len());
    for (&ts, close) in timestamps.iter().zip(closes) {
        let Some(close) = close else { continue };
        let date = DateTime::<Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| malformed(format!("invalid timestamp {ts}")))?
            .date_naive();
        points.push(PricePoint::new(date, close));
    }

    Ok(PriceSeries::new(ticker, points))
}
