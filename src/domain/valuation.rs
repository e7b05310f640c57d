//! Valuation classification.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | # | condition                                           | state        | mult |
//! |---|-----------------------------------------------------|--------------|------|
//! | 1 | price > trend AND deviation > overextended_threshold | Overextended | 0.0  |
//! | 2 | price < trend AND drawdown < deep_value_drawdown     | DeepValue    | 2.0  |
//! | 3 | price < trend                                       | SmartBuy     | 1.5  |
//! | 4 | otherwise                                           | Standard     | 1.0  |

use serde::Serialize;
use std::fmt;

use crate::domain::indicator::AssetMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationState {
    Overextended,
    DeepValue,
    SmartBuy,
    Standard,
}

impl ValuationState {
    pub const ALL: [ValuationState; 4] = [
        ValuationState::Overextended,
        ValuationState::DeepValue,
        ValuationState::SmartBuy,
        ValuationState::Standard,
    ];

    /// Fixed multiplier table.
    pub fn default_multiplier(self) -> f64 {
        match self {
            ValuationState::Overextended => 0.0,
            ValuationState::DeepValue => 2.0,
            ValuationState::SmartBuy => 1.5,
            ValuationState::Standard => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ValuationState::Overextended => "Overextended",
            ValuationState::DeepValue => "Deep Value Buy",
            ValuationState::SmartBuy => "Smart Buy",
            ValuationState::Standard => "Standard",
        }
    }
}

impl fmt::Display for ValuationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multipliers {
    pub overextended: f64,
    pub deep_value: f64,
    pub smart_buy: f64,
    pub standard: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            overextended: ValuationState::Overextended.default_multiplier(),
            deep_value: ValuationState::DeepValue.default_multiplier(),
            smart_buy: ValuationState::SmartBuy.default_multiplier(),
            standard: ValuationState::Standard.default_multiplier(),
        }
    }
}

pub const DEFAULT_OVEREXTENDED_THRESHOLD: f64 = 0.20;
pub const DEFAULT_DEEP_VALUE_DRAWDOWN: f64 = -0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationPolicy {
    /// Trend deviation above which a price over its trend is overextended.
    pub overextended_threshold: f64,
    /// Drawdown below which a price under its trend is deep value (negative).
    pub deep_value_drawdown: f64,
    pub multipliers: Multipliers,
}

impl Default for ValuationPolicy {
    fn default() -> Self {
        Self {
            overextended_threshold: DEFAULT_OVEREXTENDED_THRESHOLD,
            deep_value_drawdown: DEFAULT_DEEP_VALUE_DRAWDOWN,
            multipliers: Multipliers::default(),
        }
    }
}

impl ValuationPolicy {
    pub fn classify(&self, metrics: &AssetMetrics) -> ValuationState {
        let price = metrics.current_price;
        let trend = metrics.trend_average;

        if price > trend && metrics.trend_deviation > self.overextended_threshold {
            ValuationState::Overextended
        } else if price < trend && metrics.drawdown < self.deep_value_drawdown {
            ValuationState::DeepValue
        } else if price < trend {
            ValuationState::SmartBuy
        } else {
            ValuationState::Standard
        }
    }

    pub fn multiplier(&self, state: ValuationState) -> f64 {
        match state {
            ValuationState::Overextended => self.multipliers.overextended,
            ValuationState::DeepValue => self.multipliers.deep_value,
            ValuationState::SmartBuy => self.multipliers.smart_buy,
            ValuationState::Standard => self.multipliers.standard,
        }
    }

    /// One-line legend describing the active rules.
    pub fn legend(&self) -> String {
        format!(
            "< trend ({}x) | Deep Value < trend & >{:.0}% DD ({}x) | Standard ({}x) | Overextended >{:.0}% over trend ({}x)",
            self.multipliers.smart_buy,
            -self.deep_value_drawdown * 100.0,
            self.multipliers.deep_value,
            self.multipliers.standard,
            self.overextended_threshold * 100.0,
            self.multipliers.overextended,
        )
    }
}
