//! Equal-weight base allocation scaled by valuation multipliers.
//!
//! base = contribution / n, amount[i] = base * multiplier[i]. Amounts are not
//! rescaled, so their sum is contribution * mean(multiplier).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::SmartDcaError;
use crate::domain::indicator::AssetMetrics;
use crate::domain::valuation::{ValuationPolicy, ValuationState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    #[serde(flatten)]
    pub metrics: AssetMetrics,
    pub valuation_state: ValuationState,
    pub multiplier: f64,
    pub investment_amount: f64,
}

impl AllocationResult {
    pub fn ticker(&self) -> &str {
        &self.metrics.ticker
    }

    /// Current price minus trend average.
    pub fn price_vs_trend(&self) -> f64 {
        self.metrics.current_price - self.metrics.trend_average
    }

    /// Position on an undervalued (0) to overvalued (1) scale; +/-20% from
    /// trend maps to the ends.
    pub fn valuation_gauge(&self) -> f64 {
        (0.5 + self.metrics.trend_deviation / 0.4).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSummary {
    pub total_contribution: f64,
    pub base_share: f64,
    pub total_allocated: f64,
    pub active_multiplier: f64,
    pub opportunities: usize,
    pub assets: usize,
}

/// Rejects negative or non-finite contributions.
pub fn validate_contribution(contribution: f64) -> Result<f64, SmartDcaError> {
    if !contribution.is_finite() {
        return Err(SmartDcaError::invalid_input(format!(
            "contribution must be a finite number, got {contribution}"
        )));
    }
    if contribution < 0.0 {
        return Err(SmartDcaError::invalid_input(format!(
            "contribution must be non-negative, got {contribution}"
        )));
    }
    Ok(contribution)
}

/// Classifies every asset and assigns its amount. Input order is preserved.
pub fn allocate(
    metrics: Vec<AssetMetrics>,
    contribution: f64,
    policy: &ValuationPolicy,
) -> Vec<AllocationResult> {
    if metrics.is_empty() {
        return Vec::new();
    }
    let base_share = contribution / metrics.len() as f64;

    metrics
        .into_iter()
        .map(|m| {
            let valuation_state = policy.classify(&m);
            let multiplier = policy.multiplier(valuation_state);
            AllocationResult {
                metrics: m,
                valuation_state,
                multiplier,
                investment_amount: base_share * multiplier,
            }
        })
        .collect()
}

pub fn summarize(results: &[AllocationResult], contribution: f64) -> AllocationSummary {
    // f64 `sum` of nothing is -0.0
    let total_allocated = results
        .iter()
        .map(|r| r.investment_amount)
        .fold(0.0, |acc, amount| acc + amount);
    let base_share = if results.is_empty() {
        0.0
    } else {
        contribution / results.len() as f64
    };
    let active_multiplier = if contribution > 0.0 {
        total_allocated / contribution
    } else {
        0.0
    };

    AllocationSummary {
        total_contribution: contribution,
        base_share,
        total_allocated,
        active_multiplier,
        opportunities: results.iter().filter(|r| r.multiplier > 1.0).count(),
        assets: results.len(),
    }
}

/// Row selection for presentation. Summaries always cover every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationFilter {
    #[default]
    All,
    /// Multiplier above 1.0.
    Opportunities,
    /// Multiplier exactly 1.0.
    Standard,
    /// Multiplier 0.0.
    HoldTrim,
}

impl AllocationFilter {
    pub fn matches(self, result: &AllocationResult) -> bool {
        match self {
            AllocationFilter::All => true,
            AllocationFilter::Opportunities => result.multiplier > 1.0,
            AllocationFilter::Standard => result.multiplier == 1.0,
            AllocationFilter::HoldTrim => result.multiplier == 0.0,
        }
    }

    pub fn apply(self, results: &[AllocationResult]) -> Vec<&AllocationResult> {
        results.iter().filter(|r| self.matches(r)).collect()
    }
}

impl FromStr for AllocationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(AllocationFilter::All),
            "opportunities" => Ok(AllocationFilter::Opportunities),
            "standard" => Ok(AllocationFilter::Standard),
            "hold-trim" | "hold" | "trim" => Ok(AllocationFilter::HoldTrim),
            other => Err(format!(
                "unknown filter '{other}' (expected all, opportunities, standard, hold-trim)"
            )),
        }
    }
}

impl fmt::Display for AllocationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationFilter::All => "all",
            AllocationFilter::Opportunities => "opportunities",
            AllocationFilter::Standard => "standard",
            AllocationFilter::HoldTrim => "hold-trim",
        };
        f.write_str(name)
    }
}
