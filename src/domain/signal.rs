//! Multi-lookback drop signals.
//!
//! A bar signals when, for any configured lookback `L`, the price fell by at
//! least that lookback's threshold relative to the sample `L` positions
//! earlier. Lag is positional, so gaps in the series stretch the window.

use std::collections::BTreeMap;
use std::fmt;

use super::error::LadderError;
use super::price_series::PriceSeries;

/// Lookback (in bars) → minimum drop fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalThresholds(BTreeMap<usize, f64>);

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds(BTreeMap::from([
            (5, 0.01),
            (10, 0.015),
            (30, 0.02),
            (60, 0.025),
            (360, 0.03),
        ]))
    }
}

impl SignalThresholds {
    pub fn new(map: BTreeMap<usize, f64>) -> Result<Self, LadderError> {
        if map.is_empty() {
            return Err(LadderError::invalid(
                "signals",
                "thresholds",
                "at least one lookback is required",
            ));
        }
        for (&lookback, &drop) in &map {
            if lookback == 0 {
                return Err(LadderError::invalid(
                    "signals",
                    "thresholds",
                    "lookback must be at least 1 bar",
                ));
            }
            if !(drop.is_finite() && drop > 0.0 && drop < 1.0) {
                return Err(LadderError::invalid(
                    "signals",
                    "thresholds",
                    format!("drop {drop} for lookback {lookback} must be between 0 and 1"),
                ));
            }
        }
        Ok(SignalThresholds(map))
    }

    /// Parses `"5:0.01,10:0.015"`.
    pub fn parse(s: &str) -> Result<Self, LadderError> {
        let mut map = BTreeMap::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let invalid = || {
                LadderError::invalid(
                    "signals",
                    "thresholds",
                    format!("'{part}' is not lookback:drop"),
                )
            };
            let (lb, drop) = part.split_once(':').ok_or_else(invalid)?;
            let lb: usize = lb.trim().parse().map_err(|_| invalid())?;
            let drop: f64 = drop.trim().parse().map_err(|_| invalid())?;
            map.insert(lb, drop);
        }
        Self::new(map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().map(|(&l, &d)| (l, d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SignalThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(l, d)| format!("{l}:{d}")).collect();
        f.write_str(&parts.join(","))
    }
}

/// One flag per bar, aligned with the series index.
pub fn compute_signals(series: &PriceSeries, thresholds: &SignalThresholds) -> Vec<bool> {
    let prices: Vec<f64> = series.points().iter().map(|p| p.price).collect();
    let mut signals = vec![false; prices.len()];
    for (lookback, threshold) in thresholds.iter() {
        for t in lookback..prices.len() {
            let past = prices[t - lookback];
            let drop = (past - prices[t]) / past;
            if drop >= threshold {
                signals[t] = true;
            }
        }
    }
    signals
}

pub fn signal_indices(signals: &[bool]) -> Vec<usize> {
    signals
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect()
}

pub fn next_signal_at_or_after(signals: &[bool], index: usize) -> Option<usize> {
    signals
        .get(index..)?
        .iter()
        .position(|&s| s)
        .map(|offset| index + offset)
}
