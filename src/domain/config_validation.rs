//! Configuration validation.
//!
//! Checks every config field before a run so that typos fail loudly instead
//! of silently falling back to defaults.

use crate::domain::engine::MAX_CONCURRENCY;
use crate::domain::error::SmartDcaError;
use crate::domain::universe::{UniverseError, parse_tickers};
use crate::ports::config_port::ConfigPort;

pub const DATA_SOURCES: [&str; 2] = ["csv", "yahoo"];

pub const MAX_LOOKBACK_DAYS: i64 = 36_500;
pub const MAX_FETCH_TIMEOUT_SECS: f64 = 3_600.0;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SmartDcaError> {
    validate_allocation_section(config)?;
    validate_policy_section(config)?;
    validate_data_section(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SmartDcaError {
    SmartDcaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn require_numeric(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SmartDcaError> {
    if config.is_non_numeric(section, key) {
        return Err(invalid(section, key, format!("{key} must be a number")));
    }
    Ok(())
}

fn validate_allocation_section(config: &dyn ConfigPort) -> Result<(), SmartDcaError> {
    require_numeric(config, "allocation", "contribution")?;
    let contribution = config.get_double("allocation", "contribution", 0.0);
    if !contribution.is_finite() || contribution < 0.0 {
        return Err(invalid(
            "allocation",
            "contribution",
            "contribution must be non-negative",
        ));
    }

    if let Some(list) = config.get_string("allocation", "tickers") {
        parse_tickers(&list).map_err(|e| match e {
            UniverseError::Empty => SmartDcaError::ConfigMissing {
                section: "allocation".to_string(),
                key: "tickers".to_string(),
            },
            other => invalid("allocation", "tickers", other.to_string()),
        })?;
    }
    Ok(())
}

fn validate_policy_section(config: &dyn ConfigPort) -> Result<(), SmartDcaError> {
    for key in [
        "overextended_threshold",
        "deep_value_drawdown",
        "multiplier_overextended",
        "multiplier_deep_value",
        "multiplier_smart_buy",
        "multiplier_standard",
        "trend_window",
        "high_window",
    ] {
        require_numeric(config, "policy", key)?;
    }

    let threshold = config.get_double("policy", "overextended_threshold", 0.20);
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(invalid(
            "policy",
            "overextended_threshold",
            "overextended_threshold must be non-negative",
        ));
    }

    let drawdown = config.get_double("policy", "deep_value_drawdown", -0.20);
    if !drawdown.is_finite() || drawdown > 0.0 || drawdown < -1.0 {
        return Err(invalid(
            "policy",
            "deep_value_drawdown",
            "deep_value_drawdown must be between -1 and 0",
        ));
    }

    for key in [
        "multiplier_overextended",
        "multiplier_deep_value",
        "multiplier_smart_buy",
        "multiplier_standard",
    ] {
        let value = config.get_double("policy", key, 1.0);
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("policy", key, format!("{key} must be non-negative")));
        }
    }

    for key in ["trend_window", "high_window"] {
        if config.get_int("policy", key, 1) < 1 {
            return Err(invalid("policy", key, format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

fn validate_data_section(config: &dyn ConfigPort) -> Result<(), SmartDcaError> {
    for key in ["lookback_days", "fetch_timeout_secs", "max_concurrency"] {
        require_numeric(config, "data", key)?;
    }

    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase());
    if let Some(ref s) = source {
        if !DATA_SOURCES.contains(&s.as_str()) {
            return Err(invalid(
                "data",
                "source",
                format!("unknown source '{s}' (expected csv or yahoo)"),
            ));
        }
    }

    if source.as_deref() == Some("csv") {
        match config.get_string("data", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => {}
            _ => {
                return Err(SmartDcaError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
        }
    }

    let lookback = config.get_int("data", "lookback_days", 1);
    if !(1..=MAX_LOOKBACK_DAYS).contains(&lookback) {
        return Err(invalid(
            "data",
            "lookback_days",
            format!("lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}"),
        ));
    }
    let timeout = config.get_double("data", "fetch_timeout_secs", 1.0);
    if !timeout.is_finite() || timeout <= 0.0 || timeout > MAX_FETCH_TIMEOUT_SECS {
        return Err(invalid(
            "data",
            "fetch_timeout_secs",
            format!("fetch_timeout_secs must be positive and at most {MAX_FETCH_TIMEOUT_SECS}"),
        ));
    }
    let concurrency = config.get_int("data", "max_concurrency", 1);
    if !(1..=MAX_CONCURRENCY as i64).contains(&concurrency) {
        return Err(invalid(
            "data",
            "max_concurrency",
            format!("max_concurrency must be between 1 and {MAX_CONCURRENCY}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(result: Result<(), SmartDcaError>) -> String {
        match result {
            Err(SmartDcaError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    const VALID: &str = r#"
[allocation]
contribution = 1000
tickers = SPY,VT

[policy]
overextended_threshold = 0.2
deep_value_drawdown = -0.2

[data]
source = csv
csv_dir = ./data
lookback_days = 730
fetch_timeout_secs = 10
max_concurrency = 4
"#;

    #[test]
    fn valid_config_passes() {
        assert!(validate_config(&config(VALID)).is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert!(validate_config(&config("[allocation]\n")).is_ok());
    }

    #[test]
    fn negative_contribution() {
        let c = config("[allocation]\ncontribution = -5\n");
        assert_eq!(invalid_key(validate_config(&c)), "contribution");
    }

    #[test]
    fn non_numeric_contribution() {
        let c = config("[allocation]\ncontribution = lots\n");
        assert_eq!(invalid_key(validate_config(&c)), "contribution");
    }

    #[test]
    fn bad_ticker_list() {
        let c = config("[allocation]\ntickers = SPY,,VT\n");
        assert_eq!(invalid_key(validate_config(&c)), "tickers");
    }

    #[test]
    fn positive_deep_value_drawdown() {
        let c = config("[policy]\ndeep_value_drawdown = 0.2\n");
        assert_eq!(invalid_key(validate_config(&c)), "deep_value_drawdown");
    }

    #[test]
    fn negative_multiplier() {
        let c = config("[policy]\nmultiplier_smart_buy = -1\n");
        assert_eq!(invalid_key(validate_config(&c)), "multiplier_smart_buy");
    }

    #[test]
    fn zero_window() {
        let c = config("[policy]\ntrend_window = 0\n");
        assert_eq!(invalid_key(validate_config(&c)), "trend_window");
    }

    #[test]
    fn unknown_source() {
        let c = config("[data]\nsource = bloomberg\n");
        assert_eq!(invalid_key(validate_config(&c)), "source");
    }

    #[test]
    fn csv_source_needs_dir() {
        let c = config("[data]\nsource = csv\n");
        assert!(matches!(
            validate_config(&c),
            Err(SmartDcaError::ConfigMissing { key, .. }) if key == "csv_dir"
        ));
    }

    #[test]
    fn zero_concurrency() {
        let c = config("[data]\nmax_concurrency = 0\n");
        assert_eq!(invalid_key(validate_config(&c)), "max_concurrency");
    }

    #[test]
    fn zero_timeout() {
        let c = config("[data]\nfetch_timeout_secs = 0\n");
        assert_eq!(invalid_key(validate_config(&c)), "fetch_timeout_secs");
    }

    #[test]
    fn huge_lookback() {
        let c = config("[data]\nlookback_days = 1000000000000\n");
        assert_eq!(invalid_key(validate_config(&c)), "lookback_days");
        let c = config("[data]\nlookback_days = 200000000\n");
        assert_eq!(invalid_key(validate_config(&c)), "lookback_days");
    }

    #[test]
    fn huge_timeout() {
        let c = config("[data]\nfetch_timeout_secs = 1e30\n");
        assert_eq!(invalid_key(validate_config(&c)), "fetch_timeout_secs");
    }

    #[test]
    fn huge_concurrency() {
        let c = config("[data]\nmax_concurrency = 4611686018427387904\n");
        assert_eq!(invalid_key(validate_config(&c)), "max_concurrency");
        let c = config("[data]\nmax_concurrency = 65\n");
        assert_eq!(invalid_key(validate_config(&c)), "max_concurrency");
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        let c = config(
            "[data]\nlookback_days = 36500\nfetch_timeout_secs = 3600\nmax_concurrency = 64\n",
        );
        assert!(validate_config(&c).is_ok());
    }
}
