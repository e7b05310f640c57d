//! Allocation run orchestration.
//!
//! Fetches every ticker through the [`DataPort`] as a bounded fan-out on
//! tokio, reduces each series to [`AssetMetrics`], then classifies and
//! allocates the survivors. A ticker that fails at any step is dropped from
//! the run and recorded as a [`TickerFailure`]; it never aborts the batch.
//!
//! Dropping the future returned by [`run_allocation`] or [`collect_metrics`]
//! drops its `JoinSet`, which aborts every in-flight task. Port calls already
//! running on the blocking pool finish in the background and their output is
//! discarded.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::allocation::{self, AllocationResult, AllocationSummary};
use crate::domain::error::{FailureKind, SmartDcaError, TickerError};
use crate::domain::indicator::{AssetMetrics, IndicatorWindows, compute_metrics};
use crate::domain::universe::dedupe_tickers;
use crate::domain::valuation::ValuationPolicy;
use crate::ports::data_port::DataPort;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 730;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 64;

pub type SharedDataPort = Arc<dyn DataPort + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lookback: chrono::Duration,
    /// Upper bound on a single ticker's fetch, measured from the moment it
    /// gets a concurrency slot.
    pub fetch_timeout: Duration,
    pub max_concurrency: usize,
    pub windows: IndicatorWindows,
    pub policy: ValuationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback: chrono::Duration::days(DEFAULT_LOOKBACK_DAYS),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            windows: IndicatorWindows::default(),
            policy: ValuationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub kind: FailureKind,
    pub reason: String,
    #[serde(skip)]
    pub error: TickerError,
}

impl TickerFailure {
    pub fn new(ticker: impl Into<String>, error: TickerError) -> Self {
        Self {
            ticker: ticker.into(),
            kind: error.kind(),
            reason: error.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsBatch {
    /// De-duplicated tickers in request order.
    pub requested: Vec<String>,
    /// Metrics for tickers that succeeded, in request order.
    pub metrics: Vec<AssetMetrics>,
    /// Failures, in request order.
    pub failures: Vec<TickerFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationRun {
    pub requested: Vec<String>,
    pub summary: AllocationSummary,
    pub results: Vec<AllocationResult>,
    pub failures: Vec<TickerFailure>,
}

impl AllocationRun {
    /// Every requested ticker failed, so there is nothing to show.
    pub fn no_data_available(&self) -> bool {
        self.results.is_empty() && !self.requested.is_empty()
    }
}

fn validate_request(tickers: &[String], config: &EngineConfig) -> Result<(), SmartDcaError> {
    if tickers.is_empty() {
        return Err(SmartDcaError::invalid_input("ticker list is empty"));
    }
    if tickers.iter().any(|t| t.trim().is_empty()) {
        return Err(SmartDcaError::invalid_input("ticker identifiers must be non-empty"));
    }
    if config.max_concurrency == 0 || config.max_concurrency > MAX_CONCURRENCY {
        return Err(SmartDcaError::invalid_input(format!(
            "max_concurrency must be between 1 and {MAX_CONCURRENCY}"
        )));
    }
    if config.fetch_timeout.is_zero() {
        return Err(SmartDcaError::invalid_input("fetch timeout must be positive"));
    }
    if config.windows.trend == 0 || config.windows.high == 0 {
        return Err(SmartDcaError::invalid_input("indicator windows must be at least 1"));
    }
    Ok(())
}

async fn fetch_metrics(
    port: SharedDataPort,
    semaphore: Arc<Semaphore>,
    ticker: String,
    config: Arc<EngineConfig>,
) -> Result<AssetMetrics, TickerError> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| TickerError::TaskFailed(e.to_string()))?;

    let fetch_ticker = ticker.clone();
    let lookback = config.lookback;
    let handle = tokio::task::spawn_blocking(move || port.fetch_history(&fetch_ticker, lookback));

    let series = match tokio::time::timeout(config.fetch_timeout, handle).await {
        Err(_) => return Err(TickerError::Timeout(config.fetch_timeout)),
        Ok(Err(join_err)) => return Err(TickerError::TaskFailed(join_err.to_string())),
        Ok(Ok(fetched)) => fetched?,
    };
    if let Some((first, last, count)) = series.date_range() {
        debug!("{ticker}: {count} closes from {first} to {last}");
    }

    let mut metrics = compute_metrics(&series, &config.windows)?;
    metrics.ticker = ticker;
    Ok(metrics)
}

/// Fetches and reduces every ticker. Fails only on invalid input.
pub async fn collect_metrics(
    port: SharedDataPort,
    tickers: &[String],
    config: &EngineConfig,
) -> Result<MetricsBatch, SmartDcaError> {
    validate_request(tickers, config)?;

    let requested = dedupe_tickers(tickers);
    if requested.len() < tickers.len() {
        debug!(
            "dropped {} duplicate tickers",
            tickers.len() - requested.len()
        );
    }
    info!(
        "fetching {} tickers (concurrency {}, timeout {:?})",
        requested.len(),
        config.max_concurrency,
        config.fetch_timeout
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
    let shared_config = Arc::new(config.clone());
    let mut tasks = JoinSet::new();

    for (index, ticker) in requested.iter().cloned().enumerate() {
        let port = Arc::clone(&port);
        let semaphore = Arc::clone(&semaphore);
        let config = Arc::clone(&shared_config);
        tasks.spawn(async move {
            let outcome = fetch_metrics(port, semaphore, ticker.clone(), config).await;
            (index, ticker, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(requested.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!("ticker task aborted: {e}"),
        }
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut batch = MetricsBatch {
        requested,
        ..MetricsBatch::default()
    };
    for (_, ticker, outcome) in outcomes {
        match outcome {
            Ok(m) => {
                debug!(
                    "{}: price {:.2}, trend {:.2}, high {:.2}, drawdown {:.1}%, {} points",
                    m.ticker,
                    m.current_price,
                    m.trend_average,
                    m.trailing_high,
                    m.drawdown * 100.0,
                    m.points
                );
                if m.trend_fallback {
                    debug!(
                        "{}: {} points, trend average uses the whole series",
                        m.ticker, m.points
                    );
                }
                batch.metrics.push(m);
            }
            Err(e) => {
                warn!("skipping {ticker}: {e}");
                batch.failures.push(TickerFailure::new(ticker, e));
            }
        }
    }

    Ok(batch)
}

/// Runs a full allocation. Input errors fail before any fetch; per-ticker
/// errors only shrink the result.
pub async fn run_allocation(
    port: SharedDataPort,
    tickers: &[String],
    contribution: f64,
    config: &EngineConfig,
) -> Result<AllocationRun, SmartDcaError> {
    let contribution = allocation::validate_contribution(contribution)?;
    let batch = collect_metrics(port, tickers, config).await?;

    let results = allocation::allocate(batch.metrics, contribution, &config.policy);
    let summary = allocation::summarize(&results, contribution);

    if results.is_empty() {
        warn!("no data available for any of {} tickers", batch.requested.len());
    } else {
        info!(
            "allocated {:.2} of {:.2} across {} assets ({} skipped)",
            summary.total_allocated,
            contribution,
            results.len(),
            batch.failures.len()
        );
    }

    Ok(AllocationRun {
        requested: batch.requested,
        summary,
        results,
        failures: batch.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DataError;
    use crate::domain::price_series::{PricePoint, PriceSeries};
    use chrono::NaiveDate;

    struct FlatPort;

    impl DataPort for FlatPort {
        fn fetch_history(
            &self,
            ticker: &str,
            _lookback: chrono::Duration,
        ) -> Result<PriceSeries, DataError> {
            if ticker == "BAD" {
                return Err(DataError::UnknownTicker {
                    ticker: ticker.to_string(),
                });
            }
            let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
            Ok(PriceSeries::new(
                ticker,
                (0..300)
                    .map(|i| PricePoint::new(start + chrono::Duration::days(i), 100.0))
                    .collect(),
            ))
        }
    }

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_ticker_list_is_invalid() {
        let err = run_allocation(Arc::new(FlatPort), &[], 100.0, &EngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SmartDcaError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn zero_concurrency_is_invalid() {
        let config = EngineConfig {
            max_concurrency: 0,
            ..EngineConfig::default()
        };
        let err = run_allocation(Arc::new(FlatPort), &tickers(&["SPY"]), 100.0, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartDcaError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn oversized_concurrency_is_invalid() {
        let config = EngineConfig {
            max_concurrency: 1 << 62,
            ..EngineConfig::default()
        };
        let err = run_allocation(Arc::new(FlatPort), &tickers(&["SPY"]), 100.0, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartDcaError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn failure_is_recorded_with_kind() {
        let batch = collect_metrics(
            Arc::new(FlatPort),
            &tickers(&["SPY", "BAD"]),
            &EngineConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(batch.metrics.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].ticker, "BAD");
        assert_eq!(batch.failures[0].kind, FailureKind::UnknownTicker);
    }

    #[tokio::test]
    async fn no_data_available_when_everything_fails() {
        let run = run_allocation(
            Arc::new(FlatPort),
            &tickers(&["BAD"]),
            100.0,
            &EngineConfig::default(),
        )
        .await
        .unwrap();
        assert!(run.results.is_empty());
        assert!(run.no_data_available());
        assert_eq!(run.summary.total_allocated, 0.0);
    }
}
