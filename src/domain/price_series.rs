//! Minute price series with positional and as-of lookups.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

use super::error::LadderError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]+HH:MM`, or naive UTC
/// `YYYY-MM-DD HH:MM[:SS]`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    parse_local_timestamp(s, Tz::UTC)
}

/// As [`parse_timestamp`], but naive values are read as wall-clock time in
/// `tz`. A wall-clock time skipped by a DST jump yields `None`.
pub fn parse_local_timestamp(s: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(time: DateTime<Utc>, price: f64) -> Self {
        Self { time, price }
    }
}

/// Calendar month selector parsed from `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn parse(s: &str) -> Result<Self, LadderError> {
        let invalid = || LadderError::invalid("backtest", "month", format!("'{s}' is not YYYY-MM"));
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, time: DateTime<Utc>, tz: Tz) -> bool {
        let local = time.with_timezone(&tz);
        local.year() == self.year && local.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Time-ordered, deduplicated price samples. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by time and keeps the first sample of any duplicated timestamp.
    pub fn new(mut points: Vec<PricePoint>) -> Result<Self, LadderError> {
        if let Some(bad) = points.iter().find(|p| !(p.price.is_finite() && p.price > 0.0)) {
            return Err(LadderError::Data {
                reason: format!("non-positive price {} at {}", bad.price, bad.time),
            });
        }
        points.sort_by_key(|p| p.time);
        points.dedup_by_key(|p| p.time);
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    /// Panics if `index` is out of range.
    pub fn price(&self, index: usize) -> f64 {
        self.points[index].price
    }

    /// Panics if `index` is out of range.
    pub fn time(&self, index: usize) -> DateTime<Utc> {
        self.points[index].time
    }

    /// Index of the latest sample at or before `at`.
    pub fn as_of(&self, at: DateTime<Utc>) -> Option<usize> {
        let idx = self.points.partition_point(|p| p.time <= at);
        idx.checked_sub(1)
    }

    /// Index of the earliest sample at or after `at`.
    pub fn at_or_after(&self, at: DateTime<Utc>) -> Option<usize> {
        let idx = self.points.partition_point(|p| p.time < at);
        (idx < self.points.len()).then_some(idx)
    }

    pub fn price_as_of(&self, at: DateTime<Utc>) -> Option<f64> {
        self.as_of(at).map(|i| self.points[i].price)
    }

    pub fn filter_month(&self, month: YearMonth, tz: Tz) -> PriceSeries {
        PriceSeries {
            points: self
                .points
                .iter()
                .filter(|p| month.contains(p.time, tz))
                .copied()
                .collect(),
        }
    }
}
