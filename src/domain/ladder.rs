//! Ladder planner: averaging steps from an entry price.
//!
//! Step 0 is the initial entry. Each later step adds `add_margin` at a price
//! `drop` below (long) or above (short) the running average, which moves the
//! volume-weighted average toward the trigger.

use super::error::LadderError;
use super::strategy::{Direction, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct LadderStep {
    pub step_index: usize,
    pub trigger_price: f64,
    pub avg_price: f64,
    pub take_profit_price: f64,
    pub cumulative_margin: f64,
    pub cumulative_quantity: f64,
    pub liquidation_price: f64,
}

impl LadderStep {
    /// Price at which equity falls to the maintenance requirement.
    ///
    /// Long:  margin + qty*(p - avg) = mmr*qty*p
    /// Short: margin + qty*(avg - p) = mmr*qty*p
    pub fn liquidation_price(&self, direction: Direction, mmr: f64) -> f64 {
        let (avg, qty, margin) = (
            self.avg_price,
            self.cumulative_quantity,
            self.cumulative_margin,
        );
        match direction {
            Direction::Long => (avg * qty - margin) / (qty * (1.0 - mmr)),
            Direction::Short => (margin + qty * avg) / (qty * (1.0 + mmr)),
        }
    }

    pub fn is_take_profit(&self, direction: Direction, price: f64) -> bool {
        match direction {
            Direction::Long => price >= self.take_profit_price,
            Direction::Short => price <= self.take_profit_price,
        }
    }

    pub fn is_triggered(&self, direction: Direction, price: f64) -> bool {
        match direction {
            Direction::Long => price <= self.trigger_price,
            Direction::Short => price >= self.trigger_price,
        }
    }
}

/// Ordered steps for one entry; never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LadderPlan {
    pub direction: Direction,
    pub steps: Vec<LadderStep>,
}

impl LadderPlan {
    pub fn initial(&self) -> &LadderStep {
        &self.steps[0]
    }

    pub fn step(&self, k: usize) -> Option<&LadderStep> {
        self.steps.get(k)
    }

    /// Index of the last averaging step (K).
    pub fn max_step(&self) -> usize {
        self.steps.len() - 1
    }
}

pub fn plan(
    entry_price: f64,
    direction: Direction,
    params: &StrategyParams,
) -> Result<LadderPlan, LadderError> {
    if !(entry_price.is_finite() && entry_price > 0.0) {
        return Err(LadderError::InvalidPrice { price: entry_price });
    }

    let leverage = params.leverage as f64;
    let tp_move = params.take_profit_move();
    let mmr = params.maintenance_margin_ratio;
    let take_profit = |avg: f64| match direction {
        Direction::Long => avg * (1.0 + tp_move),
        Direction::Short => avg * (1.0 - tp_move),
    };

    let mut margin = params.initial_margin;
    let mut notional = params.initial_margin * leverage;
    let mut qty = notional / entry_price;
    let mut avg = entry_price;

    let mut steps = Vec::with_capacity(params.drop_fractions.len() + 1);
    steps.push(LadderStep {
        step_index: 0,
        trigger_price: entry_price,
        avg_price: avg,
        take_profit_price: take_profit(avg),
        cumulative_margin: margin,
        cumulative_quantity: qty,
        liquidation_price: 0.0,
    });

    for &drop in &params.drop_fractions {
        let trigger = match direction {
            Direction::Long => avg * (1.0 - drop),
            Direction::Short => avg * (1.0 + drop),
        };
        margin += params.add_margin;
        notional += params.add_margin * leverage;
        qty += params.add_margin * leverage / trigger;
        avg = notional / qty;
        steps.push(LadderStep {
            step_index: steps.len(),
            trigger_price: trigger,
            avg_price: avg,
            take_profit_price: take_profit(avg),
            cumulative_margin: margin,
            cumulative_quantity: qty,
            liquidation_price: 0.0,
        });
    }

    for step in &mut steps {
        let denom = match direction {
            Direction::Long => step.cumulative_quantity * (1.0 - mmr),
            Direction::Short => step.cumulative_quantity * (1.0 + mmr),
        };
        if denom == 0.0 || !denom.is_finite() {
            return Err(LadderError::DegenerateLiquidation {
                step: step.step_index,
                reason: format!(
                    "quantity {} with maintenance margin ratio {mmr}",
                    step.cumulative_quantity
                ),
            });
        }
        let liq = step.liquidation_price(direction, mmr);
        if !liq.is_finite() {
            return Err(LadderError::DegenerateLiquidation {
                step: step.step_index,
                reason: format!("non-finite liquidation price {liq}"),
            });
        }
        step.liquidation_price = liq;
    }

    Ok(LadderPlan { direction, steps })
}
