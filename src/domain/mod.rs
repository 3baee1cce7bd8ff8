//! Core domain types and simulation logic.

pub mod price_series;
pub mod strategy;
pub mod ladder;
pub mod simulator;
pub mod signal;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
