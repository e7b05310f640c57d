//! Market-data access port trait.

use crate::domain::error::DataError;
use crate::domain::price_series::PriceSeries;
use chrono::Duration;

pub trait DataPort {
    /// Daily closes covering roughly `lookback` up to the latest available
    /// date. Newly listed tickers may return fewer points.
    fn fetch_history(&self, ticker: &str, lookback: Duration) -> Result<PriceSeries, DataError>;

    /// Tickers the source can serve without a remote lookup. Sources that
    /// cannot enumerate return an empty list.
    fn list_tickers(&self) -> Result<Vec<String>, DataError> {
        Ok(Vec::new())
    }
}
