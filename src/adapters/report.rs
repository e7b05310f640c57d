//! Report adapters implementing [`ReportPort`].
//!
//! - [`TextReport`]: aligned console table with a summary block and legend.
//! - [`JsonReport`]: summary, rows and failures as one JSON document.
//! - [`CsvReport`]: one CSV row per allocation result.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::allocation::{AllocationFilter, AllocationResult, AllocationSummary};
use crate::domain::engine::{AllocationRun, TickerFailure};
use crate::domain::error::SmartDcaError;
use crate::domain::valuation::ValuationPolicy;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "table" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(format!("unknown format '{other}' (expected text, json, csv)")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        })
    }
}

/// Builds the adapter for `format`. The policy feeds the text legend.
pub fn reporter(format: ReportFormat, policy: ValuationPolicy) -> Box<dyn ReportPort> {
    match format {
        ReportFormat::Text => Box::new(TextReport { policy }),
        ReportFormat::Json => Box::new(JsonReport { pretty: true }),
        ReportFormat::Csv => Box::new(CsvReport),
    }
}

fn io_err(e: std::io::Error) -> SmartDcaError {
    SmartDcaError::Io(e)
}

fn report_err(e: impl fmt::Display) -> SmartDcaError {
    SmartDcaError::Report {
        reason: e.to_string(),
    }
}

pub struct TextReport {
    pub policy: ValuationPolicy,
}

impl TextReport {
    fn write_summary(summary: &AllocationSummary, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "Base Invest:        ${:>12.2}", summary.total_contribution)?;
        writeln!(out, "Smart DCA Total:    ${:>12.2}", summary.total_allocated)?;
        writeln!(out, "Active Multiplier:  {:>12.2}x", summary.active_multiplier)?;
        writeln!(out, "Opportunities:      {:>13}", summary.opportunities)?;
        writeln!(out, "Base per Asset:     ${:>12.2}", summary.base_share)
    }

    fn write_rows(rows: &[&AllocationResult], out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "{:<8} {:>10} {:>10} {:>9} {:>9} {:<15} {:>5} {:>11}",
            "Ticker", "Price", "Trend", "vs Trend", "Drawdown", "Status", "Mult", "Invest"
        )?;
        for row in rows {
            let m = &row.metrics;
            let action = if row.multiplier > 0.0 {
                format!("${:.2}", row.investment_amount)
            } else {
                "Trim / Hold".to_string()
            };
            let trend_marker = if m.trend_fallback { "*" } else { "" };
            writeln!(
                out,
                "{:<8} {:>10.2} {:>9.2}{:<1} {:>8.1}% {:>8.1}% {:<15} {:>4}x {:>11}",
                m.ticker,
                m.current_price,
                m.trend_average,
                trend_marker,
                m.trend_deviation * 100.0,
                m.drawdown * 100.0,
                row.valuation_state.label(),
                row.multiplier,
                action
            )?;
        }
        if rows.iter().any(|r| r.metrics.trend_fallback) {
            writeln!(out, "* trend average over the full (short) history")?;
        }
        Ok(())
    }

    fn write_failures(failures: &[TickerFailure], out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "Skipped:")?;
        for f in failures {
            writeln!(out, "  {}: {}", f.ticker, f.reason)?;
        }
        Ok(())
    }
}

impl ReportPort for TextReport {
    fn write(
        &self,
        run: &AllocationRun,
        filter: AllocationFilter,
        out: &mut dyn Write,
    ) -> Result<(), SmartDcaError> {
        if run.no_data_available() {
            writeln!(
                out,
                "Could not fetch data. Check your connection or data directory and try again."
            )
            .map_err(io_err)?;
            return Ok(());
        }

        Self::write_summary(&run.summary, out).map_err(io_err)?;
        writeln!(out).map_err(io_err)?;
        writeln!(out, "Strategy Legend: {}", self.policy.legend()).map_err(io_err)?;
        writeln!(out).map_err(io_err)?;

        let rows = filter.apply(&run.results);
        if rows.is_empty() {
            writeln!(out, "No assets in this category.").map_err(io_err)?;
        } else {
            Self::write_rows(&rows, out).map_err(io_err)?;
        }

        if !run.failures.is_empty() {
            writeln!(out).map_err(io_err)?;
            Self::write_failures(&run.failures, out).map_err(io_err)?;
        }
        Ok(())
    }
}

pub struct JsonReport {
    pub pretty: bool,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    filter: String,
    summary: &'a AllocationSummary,
    results: Vec<&'a AllocationResult>,
    failures: &'a [TickerFailure],
}

impl ReportPort for JsonReport {
    fn write(
        &self,
        run: &AllocationRun,
        filter: AllocationFilter,
        out: &mut dyn Write,
    ) -> Result<(), SmartDcaError> {
        let doc = JsonDocument {
            filter: filter.to_string(),
            summary: &run.summary,
            results: filter.apply(&run.results),
            failures: &run.failures,
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &doc).map_err(report_err)?;
        } else {
            serde_json::to_writer(&mut *out, &doc).map_err(report_err)?;
        }
        writeln!(out).map_err(io_err)
    }
}

pub struct CsvReport;

#[derive(Serialize)]
struct CsvRow<'a> {
    ticker: &'a str,
    as_of: String,
    current_price: f64,
    trend_average: f64,
    trailing_high: f64,
    drawdown: f64,
    trend_deviation: f64,
    price_vs_trend: f64,
    valuation_gauge: f64,
    valuation_state: &'a str,
    multiplier: f64,
    investment_amount: f64,
}

impl ReportPort for CsvReport {
    fn write(
        &self,
        run: &AllocationRun,
        filter: AllocationFilter,
        out: &mut dyn Write,
    ) -> Result<(), SmartDcaError> {
        let mut wtr = csv::Writer::from_writer(out);
        for row in filter.apply(&run.results) {
            let m = &row.metrics;
            wtr.serialize(CsvRow {
                ticker: &m.ticker,
                as_of: m.as_of.format("%Y-%m-%d").to_string(),
                current_price: m.current_price,
                trend_average: m.trend_average,
                trailing_high: m.trailing_high,
                drawdown: m.drawdown,
                trend_deviation: m.trend_deviation,
                price_vs_trend: row.price_vs_trend(),
                valuation_gauge: row.valuation_gauge(),
                valuation_state: row.valuation_state.label(),
                multiplier: row.multiplier,
                investment_amount: row.investment_amount,
            })
            .map_err(report_err)?;
        }
        wtr.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::{allocate, summarize};
    use crate::domain::error::{DataError, TickerError};
    use crate::domain::indicator::AssetMetrics;
    use chrono::NaiveDate;

    fn metrics(ticker: &str, price: f64, trend: f64, high: f64) -> AssetMetrics {
        AssetMetrics {
            ticker: ticker.into(),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            current_price: price,
            trend_average: trend,
            trailing_high: high,
            drawdown: (price - high) / high,
            trend_deviation: (price - trend) / trend,
            points: 300,
            trend_fallback: false,
        }
    }

    fn sample_run() -> AllocationRun {
        let results = allocate(
            vec![
                metrics("SPY", 100.0, 100.0, 100.0),
                metrics("TSLA", 70.0, 90.0, 100.0),
                metrics("NVDA", 130.0, 100.0, 130.0),
            ],
            900.0,
            &ValuationPolicy::default(),
        );
        let summary = summarize(&results, 900.0);
        AllocationRun {
            requested: vec!["SPY".into(), "TSLA".into(), "NVDA".into(), "XXX".into()],
            summary,
            results,
            failures: vec![TickerFailure::new(
                "XXX",
                TickerError::Data(DataError::UnknownTicker {
                    ticker: "XXX".into(),
                }),
            )],
        }
    }

    fn render(port: &dyn ReportPort, run: &AllocationRun, filter: AllocationFilter) -> String {
        let mut buf = Vec::new();
        port.write(run, filter, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn format_parse() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("table".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("xml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn text_report_lists_rows_and_failures() {
        let text = render(
            &TextReport {
                policy: ValuationPolicy::default(),
            },
            &sample_run(),
            AllocationFilter::All,
        );
        assert!(text.contains("Smart DCA Total:    $      900.00"));
        assert!(text.contains("Deep Value Buy"));
        assert!(text.contains("$600.00"));
        assert!(text.contains("Trim / Hold"));
        assert!(text.contains("XXX: unknown or delisted ticker XXX"));
    }

    #[test]
    fn text_report_empty_category() {
        let text = render(
            &TextReport {
                policy: ValuationPolicy::default(),
            },
            &sample_run(),
            AllocationFilter::Standard,
        );
        assert!(text.contains("SPY"));
        assert!(!text.contains("TSLA "));

        let mut run = sample_run();
        run.results.retain(|r| r.multiplier != 1.0);
        let text = render(
            &TextReport {
                policy: ValuationPolicy::default(),
            },
            &run,
            AllocationFilter::Standard,
        );
        assert!(text.contains("No assets in this category."));
    }

    #[test]
    fn text_report_no_data() {
        let mut run = sample_run();
        run.results.clear();
        let text = render(
            &TextReport {
                policy: ValuationPolicy::default(),
            },
            &run,
            AllocationFilter::All,
        );
        assert!(text.starts_with("Could not fetch data."));
    }

    #[test]
    fn json_report_structure() {
        let text = render(&JsonReport { pretty: false }, &sample_run(), AllocationFilter::Opportunities);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["filter"], "opportunities");
        assert_eq!(value["summary"]["assets"], 3);
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
        assert_eq!(value["results"][0]["ticker"], "TSLA");
        assert_eq!(value["results"][0]["valuation_state"], "deep_value");
        assert_eq!(value["results"][0]["as_of"], "2024-06-03");
        assert_eq!(value["failures"][0]["kind"], "unknown_ticker");
    }

    #[test]
    fn csv_report_rows() {
        let text = render(&CsvReport, &sample_run(), AllocationFilter::All);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ticker,as_of,current_price"));
        assert!(lines[2].starts_with("TSLA,2024-06-03,70.0"));
        assert!(lines[3].ends_with("Overextended,0.0,0.0"));
    }
}
