//! Strategy parameters for the leveraged averaging ladder.

use std::fmt;

use super::error::LadderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable strategy configuration passed into every planner and simulator call.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub leverage: u32,
    /// Net return on margin targeted per position (0.05 = 5%).
    pub net_target_return: f64,
    pub maker_fee: f64,
    pub initial_margin: f64,
    /// Margin committed at each averaging step.
    pub add_margin: f64,
    /// Decline from the running average that triggers each add, in order.
    pub drop_fractions: Vec<f64>,
    pub maintenance_margin_ratio: f64,
    /// Take-profit must also cover round-trip maker fees.
    pub fee_inclusive: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            leverage: 20,
            net_target_return: 0.05,
            maker_fee: 0.0002,
            initial_margin: 2000.0,
            add_margin: 800.0,
            drop_fractions: vec![0.01, 0.02, 0.03, 0.04],
            maintenance_margin_ratio: 0.005,
            fee_inclusive: true,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), LadderError> {
        if self.leverage == 0 {
            return Err(LadderError::invalid(
                "strategy",
                "leverage",
                "leverage must be at least 1",
            ));
        }
        if !(self.net_target_return.is_finite() && self.net_target_return > 0.0) {
            return Err(LadderError::invalid(
                "strategy",
                "net_target_return",
                "net_target_return must be positive",
            ));
        }
        if !(self.maker_fee.is_finite() && self.maker_fee >= 0.0) {
            return Err(LadderError::invalid(
                "strategy",
                "maker_fee",
                "maker_fee must be non-negative",
            ));
        }
        if !(self.initial_margin.is_finite() && self.initial_margin > 0.0) {
            return Err(LadderError::invalid(
                "strategy",
                "initial_margin",
                "initial_margin must be positive",
            ));
        }
        if !self.drop_fractions.is_empty()
            && !(self.add_margin.is_finite() && self.add_margin > 0.0)
        {
            return Err(LadderError::invalid(
                "strategy",
                "add_margin",
                "add_margin must be positive when drop_fractions are configured",
            ));
        }
        if let Some(d) = self
            .drop_fractions
            .iter()
            .find(|d| !(d.is_finite() && **d > 0.0 && **d < 1.0))
        {
            return Err(LadderError::invalid(
                "strategy",
                "drop_fractions",
                format!("drop fraction {d} must be between 0 and 1"),
            ));
        }
        let mmr = self.maintenance_margin_ratio;
        if !(mmr.is_finite() && (0.0..1.0).contains(&mmr)) {
            return Err(LadderError::invalid(
                "strategy",
                "maintenance_margin_ratio",
                "maintenance_margin_ratio must be in [0, 1)",
            ));
        }
        Ok(())
    }

    /// Fractional price move from the average entry to the take-profit.
    pub fn take_profit_move(&self) -> f64 {
        let base = self.net_target_return / self.leverage as f64;
        if self.fee_inclusive {
            base + 2.0 * self.maker_fee
        } else {
            base
        }
    }

    /// Same parameters with averaging disabled.
    pub fn no_scale(&self) -> Self {
        StrategyParams {
            drop_fractions: Vec::new(),
            ..self.clone()
        }
    }
}
