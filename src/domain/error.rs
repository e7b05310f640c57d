//! Domain error types.
//!
//! Per-ticker failures ([`IndicatorError`], [`DataError`], [`TickerError`])
//! are recovered inside the engine and reported as diagnostics. Only
//! [`SmartDcaError`] ever reaches the caller of a whole run.

use serde::Serialize;
use std::time::Duration;

/// Indicator calculation failure for one price series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("insufficient data: price series is empty")]
    InsufficientData,

    #[error("invalid {indicator}: {value}")]
    InvalidIndicator { indicator: &'static str, value: f64 },
}

/// Market-data retrieval failure for one ticker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("unknown or delisted ticker {ticker}")]
    UnknownTicker { ticker: String },

    #[error("data source unavailable for {ticker}: {reason}")]
    Unavailable { ticker: String, reason: String },

    #[error("malformed data for {ticker}: {reason}")]
    Malformed { ticker: String, reason: String },
}

/// Why a ticker was excluded from a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickerError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch task failed: {0}")]
    TaskFailed(String),
}

/// Coarse failure category, stable for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTicker,
    DataSourceUnavailable,
    MalformedData,
    InsufficientData,
    InvalidIndicator,
}

impl TickerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TickerError::Data(DataError::UnknownTicker { .. }) => FailureKind::UnknownTicker,
            TickerError::Data(DataError::Unavailable { .. })
            | TickerError::Timeout(_)
            | TickerError::TaskFailed(_) => FailureKind::DataSourceUnavailable,
            TickerError::Data(DataError::Malformed { .. }) => FailureKind::MalformedData,
            TickerError::Indicator(IndicatorError::InsufficientData) => {
                FailureKind::InsufficientData
            }
            TickerError::Indicator(IndicatorError::InvalidIndicator { .. }) => {
                FailureKind::InvalidIndicator
            }
        }
    }
}

/// Top-level error type for smartdca.
#[derive(Debug, thiserror::Error)]
pub enum SmartDcaError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("no data available for any of {requested} tickers")]
    NoData { requested: usize },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SmartDcaError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SmartDcaError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&SmartDcaError> for std::process::ExitCode {
    fn from(err: &SmartDcaError) -> Self {
        let code: u8 = match err {
            SmartDcaError::Io(_) | SmartDcaError::Report { .. } => 1,
            SmartDcaError::ConfigParse { .. }
            | SmartDcaError::ConfigMissing { .. }
            | SmartDcaError::ConfigInvalid { .. } => 2,
            SmartDcaError::InvalidInput { .. } => 3,
            SmartDcaError::NoData { .. } => 5,
            SmartDcaError::Cancelled => 130,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ticker_kind() {
        let err = TickerError::from(DataError::UnknownTicker {
            ticker: "ZZZ".into(),
        });
        assert_eq!(err.kind(), FailureKind::UnknownTicker);
    }

    #[test]
    fn timeout_counts_as_unavailable() {
        let err = TickerError::Timeout(Duration::from_secs(10));
        assert_eq!(err.kind(), FailureKind::DataSourceUnavailable);
    }

    #[test]
    fn indicator_kinds() {
        assert_eq!(
            TickerError::from(IndicatorError::InsufficientData).kind(),
            FailureKind::InsufficientData
        );
        let invalid = IndicatorError::InvalidIndicator {
            indicator: "trend average",
            value: 0.0,
        };
        assert_eq!(
            TickerError::from(invalid).kind(),
            FailureKind::InvalidIndicator
        );
    }

    #[test]
    fn display_includes_ticker() {
        let err = DataError::Unavailable {
            ticker: "SPY".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "data source unavailable for SPY: connection reset"
        );
    }

    #[test]
    fn exit_codes() {
        use std::process::ExitCode;
        assert_eq!(ExitCode::from(&SmartDcaError::Cancelled), ExitCode::from(130));
        assert_eq!(
            ExitCode::from(&SmartDcaError::NoData { requested: 3 }),
            ExitCode::from(5)
        );
        assert_eq!(
            ExitCode::from(&SmartDcaError::invalid_input("empty")),
            ExitCode::from(3)
        );
        let config_err = SmartDcaError::ConfigInvalid {
            section: "data".into(),
            key: "lookback_days".into(),
            reason: "out of range".into(),
        };
        assert_eq!(ExitCode::from(&config_err), ExitCode::from(2));
    }
}
