//! Trend and drawdown indicators for one price series.
//!
//! TREND(n) = mean of the trailing n closes, or of the whole series when it
//! holds fewer than n points. HIGH(m) = max of the trailing m closes, with the
//! same fallback. Both windows include the current (last) close.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::IndicatorError;
use crate::domain::price_series::PriceSeries;

pub const DEFAULT_TREND_WINDOW: usize = 200;
pub const DEFAULT_HIGH_WINDOW: usize = 252;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorWindows {
    pub trend: usize,
    pub high: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            trend: DEFAULT_TREND_WINDOW,
            high: DEFAULT_HIGH_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMetrics {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub current_price: f64,
    pub trend_average: f64,
    pub trailing_high: f64,
    pub drawdown: f64,
    pub trend_deviation: f64,
    pub points: usize,
    /// Set when the series was shorter than the trend window and the trend
    /// average fell back to the whole-series mean.
    pub trend_fallback: bool,
}

/// Mean of the last `period` values, or of all values if there are fewer.
/// Returns `None` for an empty slice or a zero period.
pub fn trailing_mean(values: &[f64], period: usize) -> Option<f64> {
    if values.is_empty() || period == 0 {
        return None;
    }
    let start = values.len().saturating_sub(period);
    let window = &values[start..];
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

/// Max of the last `period` values, or of all values if there are fewer.
/// NaN entries are ignored; a window of only NaNs yields `-inf`.
pub fn trailing_max(values: &[f64], period: usize) -> Option<f64> {
    if values.is_empty() || period == 0 {
        return None;
    }
    let start = values.len().saturating_sub(period);
    Some(values[start..].iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn require_positive(indicator: &'static str, value: f64) -> Result<f64, IndicatorError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(IndicatorError::InvalidIndicator { indicator, value })
    }
}

pub fn compute_metrics(
    series: &PriceSeries,
    windows: &IndicatorWindows,
) -> Result<AssetMetrics, IndicatorError> {
    let last = series.last().ok_or(IndicatorError::InsufficientData)?;
    let closes = series.closes();

    let current_price = require_positive("current price", last.close)?;
    let trend_average = trailing_mean(&closes, windows.trend)
        .ok_or(IndicatorError::InsufficientData)
        .and_then(|v| require_positive("trend average", v))?;
    let trailing_high = trailing_max(&closes, windows.high)
        .ok_or(IndicatorError::InsufficientData)
        .and_then(|v| require_positive("trailing high", v))?;

    // HIGH includes the current close, so the ratio is never positive; the
    // clamp only absorbs rounding.
    let drawdown = ((current_price - trailing_high) / trailing_high).min(0.0);
    let trend_deviation = (current_price - trend_average) / trend_average;

    Ok(AssetMetrics {
        ticker: series.ticker.clone(),
        as_of: last.date,
        current_price,
        trend_average,
        trailing_high,
        drawdown,
        trend_deviation,
        points: closes.len(),
        trend_fallback: closes.len() < windows.trend,
    })
}
