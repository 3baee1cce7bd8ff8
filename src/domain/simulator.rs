//! Forward price scan resolving one position to TP, LIQ or OPEN.

use chrono::{DateTime, Utc};
use std::fmt;

use super::ladder::LadderPlan;
use super::price_series::PriceSeries;
use super::strategy::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Tp,
    Liq,
    Open,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Tp => "TP",
            Outcome::Liq => "LIQ",
            Outcome::Open => "OPEN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "TP" => Some(Outcome::Tp),
            "LIQ" => Some(Outcome::Liq),
            "OPEN" => Some(Outcome::Open),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub outcome: Outcome,
    pub entry_index: usize,
    /// Bars between entry and exit (or series end when OPEN).
    pub hold: usize,
    pub exit_index: Option<usize>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    /// Ladder step active when the scan stopped.
    pub final_step: usize,
    /// One timestamp per ladder advance taken.
    pub water_times: Vec<DateTime<Utc>>,
}

/// Walks bars after `start` until TP, LIQ, or the end of the series.
///
/// Per bar: take-profit at the active step first, then every ladder advance
/// the price has reached, then liquidation against the post-advance step.
/// Panics if `start` is out of range.
pub fn simulate(
    series: &PriceSeries,
    start: usize,
    plan: &LadderPlan,
    mmr: f64,
) -> SimulationResult {
    let direction = plan.direction;
    let max_step = plan.max_step();
    let mut k = 0usize;
    let mut water_times = Vec::new();

    let exit = |i: usize, outcome: Outcome, k: usize, water_times: Vec<DateTime<Utc>>| {
        SimulationResult {
            outcome,
            entry_index: start,
            hold: i - start,
            exit_index: Some(i),
            exit_time: Some(series.time(i)),
            exit_price: Some(series.price(i)),
            final_step: k,
            water_times,
        }
    };

    for (offset, point) in series.points()[start + 1..].iter().enumerate() {
        let i = start + 1 + offset;
        let price = point.price;

        if plan.steps[k].is_take_profit(direction, price) {
            return exit(i, Outcome::Tp, k, water_times);
        }

        while k < max_step && plan.steps[k + 1].is_triggered(direction, price) {
            k += 1;
            water_times.push(point.time);
        }

        let liq = plan.steps[k].liquidation_price(direction, mmr);
        let liquidated = match direction {
            Direction::Long => price <= liq,
            Direction::Short => price >= liq,
        };
        if liquidated {
            return exit(i, Outcome::Liq, k, water_times);
        }
    }

    SimulationResult {
        outcome: Outcome::Open,
        entry_index: start,
        hold: series.len() - start - 1,
        exit_index: None,
        exit_time: None,
        exit_price: None,
        final_step: k,
        water_times,
    }
}

/// Realized profit of a resolved position; `None` while OPEN.
///
/// A liquidation forfeits all committed margin.
pub fn realized_pnl(
    plan: &LadderPlan,
    result: &SimulationResult,
    maker_fee: f64,
    fee_inclusive: bool,
) -> Option<f64> {
    let step = plan.step(result.final_step)?;
    match result.outcome {
        Outcome::Open => None,
        Outcome::Liq => Some(-step.cumulative_margin),
        Outcome::Tp => {
            let exit = result.exit_price?;
            let qty = step.cumulative_quantity;
            let gross = plan.direction.sign() * qty * (exit - step.avg_price);
            let fees = if fee_inclusive {
                maker_fee * qty * (step.avg_price + exit)
            } else {
                0.0
            };
            Some(gross - fees)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::plan;
    use crate::domain::price_series::PricePoint;
    use crate::domain::strategy::StrategyParams;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn series(prices: &[f64]) -> PriceSeries {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| PricePoint::new(t0 + Duration::minutes(i as i64), p))
                .collect(),
        )
        .unwrap()
    }

    fn no_scale() -> StrategyParams {
        StrategyParams {
            maker_fee: 0.0,
            fee_inclusive: false,
            ..StrategyParams::default()
        }
        .no_scale()
    }

    #[test]
    fn take_profit_before_liquidation() {
        let p = plan(100.0, Direction::Long, &no_scale()).unwrap();
        assert_relative_eq!(p.initial().take_profit_price, 100.25, epsilon = 1e-9);
        let s = series(&[100.0, 99.0, 100.26, 90.0]);
        let r = simulate(&s, 0, &p, 0.005);
        assert_eq!(r.outcome, Outcome::Tp);
        assert_eq!(r.hold, 2);
        assert_eq!(r.exit_time, Some(s.time(2)));
        assert_eq!(r.exit_price, Some(100.26));
        assert!(r.water_times.is_empty());
    }

    #[test]
    fn liquidation_when_touched_first() {
        let s = series(&[100.0, 97.0, 95.47, 101.0]);
        let p = plan(100.0, Direction::Long, &no_scale()).unwrap();
        let r = simulate(&s, 0, &p, 0.005);
        assert_eq!(r.outcome, Outcome::Liq);
        assert_eq!(r.hold, 2);
        assert_eq!(r.exit_index, Some(2));
    }

    #[test]
    fn single_bar_is_open_with_zero_hold() {
        let s = series(&[100.0]);
        let p = plan(100.0, Direction::Long, &StrategyParams::default()).unwrap();
        let r = simulate(&s, 0, &p, 0.005);
        assert_eq!(r.outcome, Outcome::Open);
        assert_eq!(r.hold, 0);
        assert!(r.exit_time.is_none() && r.exit_price.is_none());
    }

    #[test]
    fn open_hold_counts_to_series_end() {
        let s = series(&[100.0, 99.9, 100.1, 99.95, 100.0]);
        let p = plan(100.0, Direction::Long, &no_scale()).unwrap();
        let r = simulate(&s, 1, &p, 0.005);
        assert_eq!(r.outcome, Outcome::Open);
        assert_eq!(r.hold, 3);
    }

    #[test]
    fn liquidation_evaluated_after_ladder_advance() {
        // 95.3 is below the step-0 liquidation price (~95.48) but gaps through
        // three triggers, leaving step 3 with liquidation ~94.24.
        let params = StrategyParams::default();
        let p = plan(100.0, Direction::Long, &params).unwrap();
        assert!(95.3 <= p.step(0).unwrap().liquidation_price);
        let s = series(&[100.0, 95.3, 99.0]);
        let r = simulate(&s, 0, &p, params.maintenance_margin_ratio);
        assert_eq!(r.outcome, Outcome::Tp);
        assert_eq!(r.final_step, 3);
        assert_eq!(r.water_times, vec![s.time(1); 3]);
        assert_eq!(r.hold, 2);
    }

    #[test]
    fn ladder_caps_at_last_step() {
        let params = StrategyParams::default();
        let p = plan(100.0, Direction::Long, &params).unwrap();
        let s = series(&[100.0, 93.0]);
        let r = simulate(&s, 0, &p, params.maintenance_margin_ratio);
        assert_eq!(r.water_times.len(), 4);
        assert_eq!(r.final_step, 4);
        assert_eq!(r.outcome, Outcome::Liq);
    }

    #[test]
    fn short_take_profit_and_liquidation() {
        let p = plan(100.0, Direction::Short, &no_scale()).unwrap();
        let tp = simulate(&series(&[100.0, 100.5, 99.7]), 0, &p, 0.005);
        assert_eq!(tp.outcome, Outcome::Tp);
        let liq = simulate(&series(&[100.0, 104.5, 99.0]), 0, &p, 0.005);
        assert_eq!(liq.outcome, Outcome::Liq);
    }

    #[test]
    fn realized_pnl_by_outcome() {
        let params = no_scale();
        let p = plan(100.0, Direction::Long, &params).unwrap();
        let tp_price = p.initial().take_profit_price;
        let tp = simulate(&series(&[100.0, tp_price]), 0, &p, 0.005);
        let pnl = realized_pnl(&p, &tp, 0.0, false).unwrap();
        // 400 units * 0.25 = 100, i.e. 5% of 2000 margin
        assert_relative_eq!(pnl, 100.0, epsilon = 1e-6);

        let liq = simulate(&series(&[100.0, 95.0]), 0, &p, 0.005);
        assert_eq!(realized_pnl(&p, &liq, 0.0, false), Some(-2000.0));

        let open = simulate(&series(&[100.0]), 0, &p, 0.005);
        assert_eq!(realized_pnl(&p, &open, 0.0, false), None);
    }

    #[test]
    fn fee_inclusive_pnl_nets_target() {
        let params = StrategyParams::default().no_scale();
        let p = plan(100.0, Direction::Long, &params).unwrap();
        let tp_price = p.initial().take_profit_price;
        let r = simulate(&series(&[100.0, tp_price]), 0, &p, 0.005);
        let pnl = realized_pnl(&p, &r, params.maker_fee, true).unwrap();
        assert!(pnl >= 100.0 - 1.0 && pnl > 0.0);
    }

    proptest! {
        #[test]
        fn simulation_is_total(
            prices in proptest::collection::vec(50.0f64..150.0, 1..200),
            start_frac in 0.0f64..1.0,
        ) {
            let s = series(&prices);
            let start = ((s.len() - 1) as f64 * start_frac) as usize;
            let params = StrategyParams::default();
            let p = plan(s.price(start), Direction::Long, &params).unwrap();
            let r = simulate(&s, start, &p, params.maintenance_margin_ratio);
            match r.outcome {
                Outcome::Open => {
                    prop_assert!(r.exit_time.is_none());
                    prop_assert_eq!(r.hold, s.len() - start - 1);
                }
                Outcome::Tp | Outcome::Liq => {
                    prop_assert!(r.exit_time.is_some());
                    prop_assert!(r.hold >= 1);
                }
            }
            prop_assert!(r.water_times.len() <= p.max_step());
        }
    }
}
