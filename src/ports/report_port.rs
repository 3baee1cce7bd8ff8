//! Report output port trait.

use crate::domain::backtest::{EntryRecord, TradeRecord};
use crate::domain::error::LadderError;
use crate::domain::metrics::ReportAnalysis;
use crate::domain::price_series::YearMonth;

/// Port for persisting backtest results.
pub trait ReportPort {
    /// Independent-entry results, partitioned by outcome under `base`.
    fn write_entries(&self, base: &str, records: &[EntryRecord]) -> Result<Vec<String>, LadderError>;

    /// Chained trade sequence under `base`.
    fn write_trades(&self, base: &str, trades: &[TradeRecord]) -> Result<Vec<String>, LadderError>;

    /// Aggregate tables for one month.
    fn write_analysis(
        &self,
        dir: &str,
        month: YearMonth,
        analysis: &ReportAnalysis,
    ) -> Result<Vec<String>, LadderError>;
}
