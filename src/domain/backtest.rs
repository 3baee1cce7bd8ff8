//! Backtest drivers.
//!
//! Independent mode treats every candidate bar as a separate entry, so results
//! may overlap in time. Reversal mode holds one position at a time, flipping
//! direction after every exit and waiting for the next signal.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::error::LadderError;
use super::ladder::{self, LadderPlan};
use super::price_series::{PriceSeries, YearMonth};
use super::signal::{next_signal_at_or_after, signal_indices};
use super::simulator::{self, SimulationResult};
use super::strategy::{Direction, StrategyParams};

const PROGRESS_EVERY: usize = 3000;

/// Run selection shared by every driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub month: YearMonth,
    /// Reversal mode only. `None` starts at the first bar of the month.
    pub start_time: Option<DateTime<Utc>>,
    /// Zone whose calendar month selects the bars.
    pub timezone: Tz,
    pub parallel: bool,
    /// Zone for date and hour buckets in report analysis.
    pub report_timezone: Tz,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            month: YearMonth {
                year: 2025,
                month: 3,
            },
            start_time: None,
            timezone: Tz::UTC,
            parallel: true,
            report_timezone: chrono_tz::Asia::Seoul,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub result: SimulationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub result: SimulationResult,
    pub pnl: Option<f64>,
}

fn simulate_entry(
    series: &PriceSeries,
    index: usize,
    direction: Direction,
    params: &StrategyParams,
) -> Result<(LadderPlan, SimulationResult), LadderError> {
    let plan = ladder::plan(series.price(index), direction, params)?;
    let result = simulator::simulate(series, index, &plan, params.maintenance_margin_ratio);
    Ok((plan, result))
}

/// Simulates a long entry at each of `indices`, independently.
pub fn run_independent(
    series: &PriceSeries,
    indices: &[usize],
    params: &StrategyParams,
    parallel: bool,
) -> Result<Vec<EntryRecord>, LadderError> {
    params.validate()?;
    let started = Instant::now();
    let done = AtomicUsize::new(0);
    let total = indices.len();

    let run_one = |&index: &usize| -> Result<EntryRecord, LadderError> {
        let (_, result) = simulate_entry(series, index, Direction::Long, params)?;
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        if n % PROGRESS_EVERY == 0 {
            tracing::info!("...{n}/{total} entries simulated");
        }
        Ok(EntryRecord {
            entry_time: series.time(index),
            entry_price: series.price(index),
            result,
        })
    };

    let records: Vec<EntryRecord> = if parallel {
        indices.par_iter().map(run_one).collect::<Result<Vec<_>, LadderError>>()?
    } else {
        indices.iter().map(run_one).collect::<Result<Vec<_>, LadderError>>()?
    };

    tracing::info!(
        entries = records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "independent backtest complete"
    );
    Ok(records)
}

/// Every bar of the series as an entry.
pub fn run_exhaustive(
    series: &PriceSeries,
    params: &StrategyParams,
    parallel: bool,
) -> Result<Vec<EntryRecord>, LadderError> {
    let indices: Vec<usize> = (0..series.len()).collect();
    run_independent(series, &indices, params, parallel)
}

/// Only signalled bars as entries.
pub fn run_on_signals(
    series: &PriceSeries,
    signals: &[bool],
    params: &StrategyParams,
    parallel: bool,
) -> Result<Vec<EntryRecord>, LadderError> {
    let indices = signal_indices(signals);
    tracing::info!(signals = indices.len(), bars = series.len(), "entry signals found");
    run_independent(series, &indices, params, parallel)
}

/// Chained long/short positions starting at the first signal at or after
/// `start_time`. Stops when a position is still open at the series end or no
/// signal follows an exit.
pub fn run_reversal(
    series: &PriceSeries,
    signals: &[bool],
    params: &StrategyParams,
    start_time: DateTime<Utc>,
) -> Result<Vec<TradeRecord>, LadderError> {
    params.validate()?;
    let mut trades = Vec::new();
    let mut direction = Direction::Long;

    let mut next = series
        .at_or_after(start_time)
        .and_then(|i| next_signal_at_or_after(signals, i));

    while let Some(index) = next {
        let (plan, result) = simulate_entry(series, index, direction, params)?;
        let pnl = simulator::realized_pnl(&plan, &result, params.maker_fee, params.fee_inclusive);
        tracing::debug!(
            %direction,
            entry = %series.time(index),
            outcome = %result.outcome,
            hold = result.hold,
            "trade resolved"
        );
        let exit_index = result.exit_index;
        trades.push(TradeRecord {
            direction,
            entry_time: series.time(index),
            entry_price: series.price(index),
            result,
            pnl,
        });
        direction = direction.flip();
        next = exit_index.and_then(|exit| next_signal_at_or_after(signals, exit));
    }

    tracing::info!(trades = trades.len(), "reversal backtest complete");
    Ok(trades)
}
