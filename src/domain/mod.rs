//! Core domain types and logic.

pub mod price_series;
pub mod indicator;
pub mod valuation;
pub mod allocation;
pub mod engine;
pub mod universe;
pub mod config_validation;
pub mod error;
