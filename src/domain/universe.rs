//! Ticker basket handling.
//!
//! Parses ticker lists from configuration or the command line and collapses
//! duplicates before anything is fetched.

use std::collections::HashSet;

/// Basket used when neither the config nor the command line names one.
pub const DEFAULT_TICKERS: [&str; 11] = [
    "SPY", "VT", "TSLA", "AAPL", "MSFT", "AMZN", "NFLX", "NVDA", "PLTR", "META", "GOOGL",
];

pub fn default_tickers() -> Vec<String> {
    DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("ticker list is empty")]
    Empty,
}

/// Parses a comma separated list into upper-case tickers. Duplicates are kept
/// here and collapsed by [`dedupe_tickers`].
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Err(UniverseError::Empty);
    }

    let mut tickers = Vec::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        tickers.push(trimmed.to_uppercase());
    }
    Ok(tickers)
}

/// Drops repeated tickers, keeping the first occurrence and the input order.
pub fn dedupe_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}
