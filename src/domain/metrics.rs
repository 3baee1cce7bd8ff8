//! Outcome rates and report analysis.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::backtest::{EntryRecord, TradeRecord};
use super::price_series::{PriceSeries, YearMonth};
use super::simulator::Outcome;

pub const LOOKBACK_MINUTES: [i64; 5] = [5, 10, 30, 60, 360];
pub const RETURN_BINS: [&str; 5] = ["<-1%", "-1~-0.5", "-0.5~0", "0~0.5", ">0.5%"];

const EXCLUDED_LIQ_DATES: usize = 3;
const EXCLUDED_LIQ_HOURS: usize = 2;
const FILTER_LOOKBACK_MINUTES: i64 = 30;

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub total: usize,
    pub tp: usize,
    pub liq: usize,
    pub open: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes<I: IntoIterator<Item = Outcome>>(outcomes: I) -> Self {
        let mut s = OutcomeSummary::default();
        for outcome in outcomes {
            s.total += 1;
            match outcome {
                Outcome::Tp => s.tp += 1,
                Outcome::Liq => s.liq += 1,
                Outcome::Open => s.open += 1,
            }
        }
        s
    }

    pub fn tp_rate(&self) -> f64 {
        pct(self.tp, self.total)
    }

    pub fn liq_rate(&self) -> f64 {
        pct(self.liq, self.total)
    }

    pub fn open_rate(&self) -> f64 {
        pct(self.open, self.total)
    }
}

/// Mean hold (bars) keyed by the number of ladder advances taken.
pub fn hold_by_water_count(records: &[EntryRecord]) -> BTreeMap<usize, f64> {
    let mut acc: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for r in records {
        let e = acc.entry(r.result.water_times.len()).or_default();
        e.0 += r.result.hold;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, n))| (k, sum as f64 / n as f64))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSummary {
    pub outcomes: OutcomeSummary,
    pub total_pnl: f64,
    pub avg_pnl: f64,
}

impl TradeSummary {
    pub fn compute(trades: &[TradeRecord]) -> Self {
        let outcomes = OutcomeSummary::from_outcomes(trades.iter().map(|t| t.result.outcome));
        let realized: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();
        let total_pnl: f64 = realized.iter().sum();
        let avg_pnl = if realized.is_empty() {
            0.0
        } else {
            total_pnl / realized.len() as f64
        };
        TradeSummary {
            outcomes,
            total_pnl,
            avg_pnl,
        }
    }
}

/// One resolved entry as seen by report analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisEntry {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub outcome: Outcome,
}

impl From<&EntryRecord> for AnalysisEntry {
    fn from(r: &EntryRecord) -> Self {
        AnalysisEntry {
            entry_time: r.entry_time,
            entry_price: r.entry_price,
            outcome: r.result.outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateStat {
    pub date: NaiveDate,
    pub total: usize,
    pub liq: usize,
    pub liq_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourStat {
    pub hour: u32,
    pub total: usize,
    pub liq: usize,
    pub liq_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookbackStat {
    pub lookback_minutes: i64,
    pub bin: &'static str,
    pub count: usize,
    pub tp_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedTp {
    /// `None` when every entry was filtered out.
    pub tp_rate: Option<f64>,
    pub total_entries: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportAnalysis {
    pub dates: Vec<DateStat>,
    pub hours: Vec<HourStat>,
    pub lookbacks: Vec<LookbackStat>,
    pub optimized: OptimizedTp,
}

impl ReportAnalysis {
    /// OPEN entries and entries outside `month` (local to `tz`) are ignored.
    pub fn compute(
        entries: &[AnalysisEntry],
        prices: &PriceSeries,
        month: YearMonth,
        tz: Tz,
    ) -> Self {
        let resolved: Vec<AnalysisEntry> = entries
            .iter()
            .filter(|e| e.outcome != Outcome::Open && month.contains(e.entry_time, tz))
            .copied()
            .collect();
        ReportAnalysis {
            dates: date_stats(&resolved, tz),
            hours: hour_stats(&resolved, tz),
            lookbacks: lookback_stats(&resolved, prices),
            optimized: optimized_tp(&resolved, prices, tz),
        }
    }
}

fn local_date(e: &AnalysisEntry, tz: Tz) -> NaiveDate {
    e.entry_time.with_timezone(&tz).date_naive()
}

fn local_hour(e: &AnalysisEntry, tz: Tz) -> u32 {
    e.entry_time.with_timezone(&tz).hour()
}

fn liq_counts<K: Ord + Copy>(
    entries: &[AnalysisEntry],
    key: impl Fn(&AnalysisEntry) -> K,
) -> BTreeMap<K, (usize, usize)> {
    let mut acc: BTreeMap<K, (usize, usize)> = BTreeMap::new();
    for e in entries {
        let c = acc.entry(key(e)).or_default();
        c.0 += 1;
        if e.outcome == Outcome::Liq {
            c.1 += 1;
        }
    }
    acc
}

/// Per local date, ascending.
pub fn date_stats(entries: &[AnalysisEntry], tz: Tz) -> Vec<DateStat> {
    liq_counts(entries, |e| local_date(e, tz))
        .into_iter()
        .map(|(date, (total, liq))| DateStat {
            date,
            total,
            liq,
            liq_pct: round2(pct(liq, total)),
        })
        .collect()
}

/// Per local hour, highest liquidation rate first.
pub fn hour_stats(entries: &[AnalysisEntry], tz: Tz) -> Vec<HourStat> {
    let mut stats: Vec<HourStat> = liq_counts(entries, |e| local_hour(e, tz))
        .into_iter()
        .map(|(hour, (total, liq))| HourStat {
            hour,
            total,
            liq,
            liq_pct: round2(pct(liq, total)),
        })
        .collect();
    stats.sort_by(|a, b| b.liq_pct.total_cmp(&a.liq_pct));
    stats
}

/// Percentage return from the as-of price `minutes` before entry.
pub fn trailing_return_pct(e: &AnalysisEntry, prices: &PriceSeries, minutes: i64) -> Option<f64> {
    let past = prices.price_as_of(e.entry_time - Duration::minutes(minutes))?;
    Some((e.entry_price - past) / past * 100.0)
}

/// Right-inclusive bins over percentage returns.
pub fn return_bin(ret_pct: f64) -> &'static str {
    if ret_pct <= -1.0 {
        RETURN_BINS[0]
    } else if ret_pct <= -0.5 {
        RETURN_BINS[1]
    } else if ret_pct <= 0.0 {
        RETURN_BINS[2]
    } else if ret_pct <= 0.5 {
        RETURN_BINS[3]
    } else {
        RETURN_BINS[4]
    }
}

/// TP rate per return bin for each lookback. Empty bins are omitted.
pub fn lookback_stats(entries: &[AnalysisEntry], prices: &PriceSeries) -> Vec<LookbackStat> {
    let mut out = Vec::new();
    for &lb in &LOOKBACK_MINUTES {
        let mut bins: HashMap<&'static str, (usize, usize)> = HashMap::new();
        for e in entries {
            let Some(ret) = trailing_return_pct(e, prices, lb) else {
                continue;
            };
            let c = bins.entry(return_bin(ret)).or_default();
            c.0 += 1;
            if e.outcome == Outcome::Tp {
                c.1 += 1;
            }
        }
        for bin in RETURN_BINS {
            if let Some(&(count, tp)) = bins.get(bin) {
                out.push(LookbackStat {
                    lookback_minutes: lb,
                    bin,
                    count,
                    tp_rate: pct(tp, count),
                });
            }
        }
    }
    out
}

fn top_liq_keys<K: Ord + Copy + std::hash::Hash>(
    entries: &[AnalysisEntry],
    n: usize,
    key: impl Fn(&AnalysisEntry) -> K,
) -> HashSet<K> {
    let mut ranked: Vec<(K, usize)> = liq_counts(entries, key)
        .into_iter()
        .filter(|(_, (_, liq))| *liq > 0)
        .map(|(k, (_, liq))| (k, liq))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(k, _)| k).collect()
}

/// TP rate after removing the worst liquidation dates and hours and keeping
/// only entries that came after a 30-minute decline.
pub fn optimized_tp(entries: &[AnalysisEntry], prices: &PriceSeries, tz: Tz) -> OptimizedTp {
    let bad_dates = top_liq_keys(entries, EXCLUDED_LIQ_DATES, |e| local_date(e, tz));
    let after_dates: Vec<AnalysisEntry> = entries
        .iter()
        .filter(|e| !bad_dates.contains(&local_date(e, tz)))
        .copied()
        .collect();
    let bad_hours = top_liq_keys(&after_dates, EXCLUDED_LIQ_HOURS, |e| local_hour(e, tz));

    let kept: Vec<&AnalysisEntry> = after_dates
        .iter()
        .filter(|e| !bad_hours.contains(&local_hour(e, tz)))
        .filter(|e| {
            trailing_return_pct(e, prices, FILTER_LOOKBACK_MINUTES).is_some_and(|r| r < 0.0)
        })
        .collect();

    let tp = kept.iter().filter(|e| e.outcome == Outcome::Tp).count();
    OptimizedTp {
        tp_rate: (!kept.is_empty()).then(|| round2(pct(tp, kept.len()))),
        total_entries: kept.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PricePoint;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap()
    }

    fn entry(time: DateTime<Utc>, price: f64, outcome: Outcome) -> AnalysisEntry {
        AnalysisEntry {
            entry_time: time,
            entry_price: price,
            outcome,
        }
    }

    #[test]
    fn outcome_summary_rates() {
        let s = OutcomeSummary::from_outcomes([
            Outcome::Tp,
            Outcome::Tp,
            Outcome::Liq,
            Outcome::Open,
        ]);
        assert_eq!((s.total, s.tp, s.liq, s.open), (4, 2, 1, 1));
        assert_relative_eq!(s.tp_rate(), 50.0);
        assert_relative_eq!(s.liq_rate(), 25.0);
        assert_relative_eq!(s.open_rate(), 25.0);
        assert_eq!(OutcomeSummary::default().tp_rate(), 0.0);
    }

    #[test]
    fn date_and_hour_stats() {
        let entries = vec![
            entry(at(1, 1, 0), 100.0, Outcome::Tp),
            entry(at(1, 1, 1), 100.0, Outcome::Liq),
            entry(at(1, 2, 0), 100.0, Outcome::Tp),
            entry(at(2, 2, 0), 100.0, Outcome::Tp),
        ];
        let dates = date_stats(&entries, Tz::UTC);
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].total, 3);
        assert_eq!(dates[0].liq, 1);
        assert_relative_eq!(dates[0].liq_pct, 33.33);
        let hours = hour_stats(&entries, Tz::UTC);
        assert_eq!(hours[0].hour, 1);
        assert_relative_eq!(hours[0].liq_pct, 50.0);
        assert_eq!(hours[1].hour, 2);
    }

    #[test]
    fn hour_stats_use_local_timezone() {
        let entries = vec![entry(at(1, 0, 0), 100.0, Outcome::Liq)];
        let hours = hour_stats(&entries, Tz::Asia__Seoul);
        assert_eq!(hours[0].hour, 9);
    }

    #[test]
    fn return_bins_are_right_inclusive() {
        assert_eq!(return_bin(-1.0), "<-1%");
        assert_eq!(return_bin(-0.7), "-1~-0.5");
        assert_eq!(return_bin(0.0), "-0.5~0");
        assert_eq!(return_bin(0.5), "0~0.5");
        assert_eq!(return_bin(0.51), ">0.5%");
    }

    fn prices() -> PriceSeries {
        PriceSeries::new(vec![
            PricePoint::new(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap(), 100.0),
            PricePoint::new(at(1, 0, 0), 100.0),
        ])
        .unwrap()
    }

    #[test]
    fn trailing_return_uses_as_of_price() {
        let e = entry(at(1, 0, 30), 98.0, Outcome::Tp);
        assert_relative_eq!(trailing_return_pct(&e, &prices(), 5).unwrap(), -2.0, epsilon = 1e-9);
        let early = entry(Utc.with_ymd_and_hms(2025, 2, 27, 0, 0, 0).unwrap(), 99.0, Outcome::Tp);
        assert!(trailing_return_pct(&early, &prices(), 5).is_none());
    }

    #[test]
    fn lookback_stats_bin_counts() {
        let entries = vec![
            entry(at(1, 0, 30), 98.0, Outcome::Tp),
            entry(at(1, 0, 31), 100.2, Outcome::Liq),
        ];
        let stats = lookback_stats(&entries, &prices());
        let five: Vec<_> = stats.iter().filter(|s| s.lookback_minutes == 5).collect();
        assert_eq!(five.len(), 2);
        assert_eq!(five[0].bin, "<-1%");
        assert_relative_eq!(five[0].tp_rate, 100.0);
        assert_eq!(five[1].bin, "0~0.5");
        assert_relative_eq!(five[1].tp_rate, 0.0);
    }

    #[test]
    fn optimized_tp_filters_bad_hours_and_rising_entries() {
        let entries = vec![
            entry(at(1, 0, 40), 99.0, Outcome::Tp),
            entry(at(1, 0, 41), 99.0, Outcome::Tp),
            entry(at(1, 0, 42), 101.0, Outcome::Tp),
        ];
        let r = optimized_tp(&entries, &prices(), Tz::UTC);
        assert_eq!(r.total_entries, 2);
        assert_eq!(r.tp_rate, Some(100.0));
    }

    #[test]
    fn optimized_tp_empty_when_all_filtered() {
        let entries = vec![entry(at(1, 0, 40), 99.0, Outcome::Liq)];
        let r = optimized_tp(&entries, &prices(), Tz::UTC);
        assert_eq!(r.total_entries, 0);
        assert_eq!(r.tp_rate, None);
    }

    #[test]
    fn analysis_ignores_open_and_other_months() {
        let entries = vec![
            entry(at(1, 0, 40), 99.0, Outcome::Open),
            entry(Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap(), 99.0, Outcome::Tp),
            entry(at(1, 0, 41), 99.0, Outcome::Tp),
        ];
        let month = YearMonth::parse("2025-03").unwrap();
        let a = ReportAnalysis::compute(&entries, &prices(), month, Tz::UTC);
        assert_eq!(a.dates.len(), 1);
        assert_eq!(a.dates[0].total, 1);
    }
}
