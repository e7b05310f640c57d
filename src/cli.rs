//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report::{ReportFormat, reporter};
use crate::domain::allocation::AllocationFilter;
use crate::domain::config_validation::validate_config;
use crate::domain::engine::{
    self, AllocationRun, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_CONCURRENCY, EngineConfig,
    MetricsBatch, SharedDataPort,
};
use crate::domain::error::SmartDcaError;
use crate::domain::indicator::{DEFAULT_HIGH_WINDOW, DEFAULT_TREND_WINDOW, IndicatorWindows};
use crate::domain::universe::{UniverseError, default_tickers, parse_tickers};
use crate::domain::valuation::{
    DEFAULT_DEEP_VALUE_DRAWDOWN, DEFAULT_OVEREXTENDED_THRESHOLD, Multipliers, ValuationPolicy,
    ValuationState,
};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_CONTRIBUTION: f64 = 1000.0;

/// Grace period for blocking fetches still running when the CLI exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "smartdca",
    about = "Valuation-aware dollar-cost-averaging allocator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute this period's allocation across the basket
    Allocate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Total contribution, overrides [allocation] contribution
        #[arg(long, allow_negative_numbers = true)]
        contribution: Option<f64>,
        /// Comma separated tickers, overrides [allocation] tickers
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long, default_value = "text")]
        format: ReportFormat,
        /// all, opportunities, standard or hold-trim
        #[arg(long, default_value = "all")]
        filter: AllocationFilter,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show indicators and valuation state per ticker without allocating
    Inspect {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers available from the configured data source
    ListTickers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Allocate {
            config,
            contribution,
            tickers,
            format,
            filter,
            output,
        } => run_allocate(
            config.as_ref(),
            contribution,
            tickers.as_deref(),
            format,
            filter,
            output.as_ref(),
        ),
        Command::Inspect {
            config,
            tickers,
            format,
        } => run_inspect(config.as_ref(), tickers.as_deref(), format),
        Command::Validate { config } => run_validate(&config),
        Command::ListTickers { config } => run_list_tickers(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, SmartDcaError> {
    FileConfigAdapter::from_file(path).map_err(|e| SmartDcaError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn load_optional_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, SmartDcaError> {
    match path {
        Some(p) => {
            info!("Loading config from {}", p.display());
            load_config(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn build_policy(config: &dyn ConfigPort) -> ValuationPolicy {
    let defaults = Multipliers::default();
    ValuationPolicy {
        overextended_threshold: config.get_double(
            "policy",
            "overextended_threshold",
            DEFAULT_OVEREXTENDED_THRESHOLD,
        ),
        deep_value_drawdown: config.get_double(
            "policy",
            "deep_value_drawdown",
            DEFAULT_DEEP_VALUE_DRAWDOWN,
        ),
        multipliers: Multipliers {
            overextended: config.get_double(
                "policy",
                "multiplier_overextended",
                defaults.overextended,
            ),
            deep_value: config.get_double("policy", "multiplier_deep_value", defaults.deep_value),
            smart_buy: config.get_double("policy", "multiplier_smart_buy", defaults.smart_buy),
            standard: config.get_double("policy", "multiplier_standard", defaults.standard),
        },
    }
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, SmartDcaError> {
    validate_config(config)?;

    let timeout_secs = config.get_double(
        "data",
        "fetch_timeout_secs",
        engine::DEFAULT_FETCH_TIMEOUT.as_secs_f64(),
    );
    let fetch_timeout =
        Duration::try_from_secs_f64(timeout_secs).map_err(|e| SmartDcaError::ConfigInvalid {
            section: "data".into(),
            key: "fetch_timeout_secs".into(),
            reason: e.to_string(),
        })?;
    let lookback_days = config.get_int("data", "lookback_days", DEFAULT_LOOKBACK_DAYS);
    let lookback =
        chrono::Duration::try_days(lookback_days).ok_or_else(|| SmartDcaError::ConfigInvalid {
            section: "data".into(),
            key: "lookback_days".into(),
            reason: format!("{lookback_days} days is out of range"),
        })?;
    let max_concurrency = usize::try_from(config.get_int(
        "data",
        "max_concurrency",
        DEFAULT_MAX_CONCURRENCY as i64,
    ))
    .map_err(|e| SmartDcaError::ConfigInvalid {
        section: "data".into(),
        key: "max_concurrency".into(),
        reason: e.to_string(),
    })?;

    Ok(EngineConfig {
        lookback,
        fetch_timeout,
        max_concurrency,
        windows: IndicatorWindows {
            trend: config.get_int("policy", "trend_window", DEFAULT_TREND_WINDOW as i64) as usize,
            high: config.get_int("policy", "high_window", DEFAULT_HIGH_WINDOW as i64) as usize,
        },
        policy: build_policy(config),
    })
}

/// Command line list, then `[allocation] tickers`, then the default basket.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, SmartDcaError> {
    let to_input_error = |e: UniverseError| SmartDcaError::invalid_input(e.to_string());
    if let Some(list) = ticker_override {
        return parse_tickers(list).map_err(to_input_error);
    }
    match config.get_string("allocation", "tickers") {
        Some(list) => parse_tickers(&list).map_err(to_input_error),
        None => Ok(default_tickers()),
    }
}

pub fn resolve_contribution(contribution_override: Option<f64>, config: &dyn ConfigPort) -> f64 {
    contribution_override
        .unwrap_or_else(|| config.get_double("allocation", "contribution", DEFAULT_CONTRIBUTION))
}

fn default_source() -> &'static str {
    if cfg!(feature = "yahoo") { "yahoo" } else { "csv" }
}

pub fn build_data_port(
    config: &dyn ConfigPort,
    #[cfg_attr(not(feature = "yahoo"), allow(unused_variables))] fetch_timeout: Duration,
) -> Result<SharedDataPort, SmartDcaError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| default_source().to_string());

    match source.as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| SmartDcaError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            info!("Reading prices from {}", dir);
            Ok(Arc::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => {
            use crate::adapters::yahoo_adapter::YahooAdapter;
            let adapter =
                YahooAdapter::new(fetch_timeout).map_err(|e| SmartDcaError::ConfigInvalid {
                    section: "data".into(),
                    key: "source".into(),
                    reason: e.to_string(),
                })?;
            Ok(Arc::new(adapter))
        }
        other => Err(SmartDcaError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("data source '{other}' is not available in this build"),
        }),
    }
}

/// Drives `future` on a fresh runtime, abandoning it on Ctrl-C.
fn block_on_cancellable<T, F>(future: F) -> Result<T, SmartDcaError>
where
    F: Future<Output = Result<T, SmartDcaError>>,
{
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        tokio::select! {
            outcome = future => outcome,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, abandoning in-flight fetches");
                Err(SmartDcaError::Cancelled)
            }
        }
    });
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// Runs the engine and renders the result. Separated from [`run_allocate`] so
/// it can be driven with any data port and writer.
pub fn run_allocation_pipeline(
    data_port: SharedDataPort,
    tickers: &[String],
    contribution: f64,
    engine_config: &EngineConfig,
    format: ReportFormat,
    filter: AllocationFilter,
    out: &mut dyn Write,
) -> Result<AllocationRun, SmartDcaError> {
    let run = block_on_cancellable(engine::run_allocation(
        data_port,
        tickers,
        contribution,
        engine_config,
    ))?;

    reporter(format, engine_config.policy).write(&run, filter, out)?;

    if run.no_data_available() {
        return Err(SmartDcaError::NoData {
            requested: run.requested.len(),
        });
    }
    Ok(run)
}

fn open_output(output: Option<&PathBuf>) -> Result<Box<dyn Write>, SmartDcaError> {
    Ok(match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    })
}

fn run_allocate(
    config_path: Option<&PathBuf>,
    contribution: Option<f64>,
    tickers: Option<&str>,
    format: ReportFormat,
    filter: AllocationFilter,
    output: Option<&PathBuf>,
) -> Result<(), SmartDcaError> {
    let config = load_optional_config(config_path)?;
    let engine_config = build_engine_config(&config)?;
    let tickers = resolve_tickers(tickers, &config)?;
    let contribution = resolve_contribution(contribution, &config);
    let data_port = build_data_port(&config, engine_config.fetch_timeout)?;

    info!(
        "Allocating {:.2} across {} tickers",
        contribution,
        tickers.len()
    );

    let mut out = open_output(output)?;
    run_allocation_pipeline(
        data_port,
        &tickers,
        contribution,
        &engine_config,
        format,
        filter,
        &mut out,
    )?;

    if let Some(path) = output {
        info!("Report written to: {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct InspectRow {
    pub ticker: String,
    pub as_of: String,
    pub points: usize,
    pub current_price: f64,
    pub trend_average: f64,
    pub trailing_high: f64,
    pub drawdown: f64,
    pub trend_deviation: f64,
    pub trend_fallback: bool,
    pub valuation_state: ValuationState,
    pub multiplier: f64,
}

pub fn inspect_rows(batch: &MetricsBatch, policy: &ValuationPolicy) -> Vec<InspectRow> {
    batch
        .metrics
        .iter()
        .map(|m| {
            let state = policy.classify(m);
            InspectRow {
                ticker: m.ticker.clone(),
                as_of: m.as_of.format("%Y-%m-%d").to_string(),
                points: m.points,
                current_price: m.current_price,
                trend_average: m.trend_average,
                trailing_high: m.trailing_high,
                drawdown: m.drawdown,
                trend_deviation: m.trend_deviation,
                trend_fallback: m.trend_fallback,
                valuation_state: state,
                multiplier: policy.multiplier(state),
            }
        })
        .collect()
}

pub fn write_inspect(
    rows: &[InspectRow],
    batch: &MetricsBatch,
    format: ReportFormat,
    out: &mut dyn Write,
) -> Result<(), SmartDcaError> {
    let report_err = |e: &dyn std::fmt::Display| SmartDcaError::Report {
        reason: e.to_string(),
    };
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows).map_err(|e| report_err(&e))?;
            writeln!(out)?;
        }
        ReportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(&mut *out);
            for row in rows {
                wtr.serialize(row).map_err(|e| report_err(&e))?;
            }
            wtr.flush()?;
        }
        ReportFormat::Text => {
            for row in rows {
                writeln!(
                    out,
                    "{}: {} points to {}, price {:.2}, trend {:.2}{}, high {:.2}, drawdown {:.1}%, deviation {:+.1}% -> {} ({}x)",
                    row.ticker,
                    row.points,
                    row.as_of,
                    row.current_price,
                    row.trend_average,
                    if row.trend_fallback { " (short history)" } else { "" },
                    row.trailing_high,
                    row.drawdown * 100.0,
                    row.trend_deviation * 100.0,
                    row.valuation_state,
                    row.multiplier
                )?;
            }
            for failure in &batch.failures {
                writeln!(out, "{}: skipped ({})", failure.ticker, failure.reason)?;
            }
        }
    }
    Ok(())
}

fn run_inspect(
    config_path: Option<&PathBuf>,
    tickers: Option<&str>,
    format: ReportFormat,
) -> Result<(), SmartDcaError> {
    let config = load_optional_config(config_path)?;
    let engine_config = build_engine_config(&config)?;
    let tickers = resolve_tickers(tickers, &config)?;
    let data_port = build_data_port(&config, engine_config.fetch_timeout)?;

    let batch = block_on_cancellable(engine::collect_metrics(
        data_port,
        &tickers,
        &engine_config,
    ))?;
    let rows = inspect_rows(&batch, &engine_config.policy);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_inspect(&rows, &batch, format, &mut out)?;

    if rows.is_empty() {
        return Err(SmartDcaError::NoData {
            requested: batch.requested.len(),
        });
    }
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> Result<(), SmartDcaError> {
    info!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    let engine_config = build_engine_config(&config)?;
    let tickers = resolve_tickers(None, &config)?;
    let contribution = resolve_contribution(None, &config);
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| default_source().to_string());

    let mut out = io::stdout().lock();
    writeln!(out, "contribution:     {:.2}", contribution)?;
    writeln!(out, "tickers:          {}", tickers.join(", "))?;
    writeln!(out, "source:           {}", source)?;
    writeln!(out, "lookback:         {} days", engine_config.lookback.num_days())?;
    writeln!(out, "fetch timeout:    {:?}", engine_config.fetch_timeout)?;
    writeln!(out, "max concurrency:  {}", engine_config.max_concurrency)?;
    writeln!(
        out,
        "windows:          trend {}, high {}",
        engine_config.windows.trend, engine_config.windows.high
    )?;
    writeln!(out, "legend:           {}", engine_config.policy.legend())?;
    writeln!(out, "\nConfiguration is valid.")?;
    Ok(())
}

fn run_list_tickers(config_path: &PathBuf) -> Result<(), SmartDcaError> {
    let config = load_config(config_path)?;
    let engine_config = build_engine_config(&config)?;
    let data_port = build_data_port(&config, engine_config.fetch_timeout)?;

    let tickers = data_port
        .list_tickers()
        .map_err(io::Error::other)?;

    if tickers.is_empty() {
        warn!("data source cannot list tickers or has none");
    } else {
        let mut out = io::stdout().lock();
        for ticker in &tickers {
            writeln!(out, "{}", ticker)?;
        }
        info!("{} tickers found", tickers.len());
    }
    Ok(())
}
