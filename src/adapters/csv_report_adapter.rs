//! CSV report writer and reader.
//!
//! Entry reports are split by outcome: `<base>.csv` holds the resolved (TP and
//! LIQ) entries and `<base>_open_raw.csv` re-emits open entries as `date,close`
//! rows so they can seed the next month's run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::backtest::{EntryRecord, TradeRecord};
use crate::domain::error::LadderError;
use crate::domain::metrics::{AnalysisEntry, ReportAnalysis};
use crate::domain::price_series::{YearMonth, format_timestamp, parse_timestamp};
use crate::domain::simulator::{Outcome, SimulationResult};
use crate::ports::report_port::ReportPort;

const ENTRY_TIME: &str = "Entry_Time";
const ENTRY_PRICE: &str = "Entry_Price";
const RESULT: &str = "Result";

pub struct CsvReportAdapter {
    water_columns: usize,
}

impl CsvReportAdapter {
    /// `water_columns` is the number of ladder advances a plan can take.
    pub fn new(water_columns: usize) -> Self {
        Self { water_columns }
    }

    fn water_header(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.water_columns).map(|i| format!("Water{i}"))
    }

    fn water_cells(&self, result: &SimulationResult) -> impl Iterator<Item = String> + '_ {
        let times: Vec<String> = result.water_times.iter().map(|t| format_timestamp(*t)).collect();
        (0..self.water_columns).map(move |i| times.get(i).cloned().unwrap_or_default())
    }

    fn entry_header(&self) -> Vec<String> {
        [ENTRY_TIME, ENTRY_PRICE, RESULT, "Hold_Min", "Exit_Time", "Exit_Price"]
            .into_iter()
            .map(String::from)
            .chain(self.water_header())
            .collect()
    }

    fn entry_row(&self, r: &EntryRecord) -> Vec<String> {
        let (exit_time, exit_price) = exit_cells(&r.result);
        vec![
            format_timestamp(r.entry_time),
            r.entry_price.to_string(),
            r.result.outcome.to_string(),
            r.result.hold.to_string(),
            exit_time,
            exit_price,
        ]
        .into_iter()
        .chain(self.water_cells(&r.result))
        .collect()
    }

    fn trade_header(&self) -> Vec<String> {
        [
            ENTRY_TIME,
            ENTRY_PRICE,
            "Direction",
            RESULT,
            "Hold_Min",
            "Exit_Time",
            "Exit_Price",
            "Pnl",
        ]
        .into_iter()
        .map(String::from)
        .chain(self.water_header())
        .collect()
    }

    fn trade_row(&self, t: &TradeRecord) -> Vec<String> {
        let (exit_time, exit_price) = exit_cells(&t.result);
        vec![
            format_timestamp(t.entry_time),
            t.entry_price.to_string(),
            t.direction.to_string(),
            t.result.outcome.to_string(),
            t.result.hold.to_string(),
            exit_time,
            exit_price,
            t.pnl.map(|p| format!("{p:.4}")).unwrap_or_default(),
        ]
        .into_iter()
        .chain(self.water_cells(&t.result))
        .collect()
    }
}

fn exit_cells(result: &SimulationResult) -> (String, String) {
    (
        result.exit_time.map(format_timestamp).unwrap_or_default(),
        result.exit_price.map(|p| p.to_string()).unwrap_or_default(),
    )
}

fn with_suffix(base: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{base}{suffix}.csv"))
}

fn write_csv<I>(path: &Path, header: &[String], rows: I) -> Result<String, LadderError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(header)?;
    let mut n = 0usize;
    for row in rows {
        wtr.write_record(&row)?;
        n += 1;
    }
    wtr.flush()?;
    tracing::info!(path = %path.display(), rows = n, "wrote report");
    Ok(path.display().to_string())
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

impl ReportPort for CsvReportAdapter {
    fn write_entries(&self, base: &str, records: &[EntryRecord]) -> Result<Vec<String>, LadderError> {
        let by = |wanted: &[Outcome]| {
            records
                .iter()
                .filter(|r| wanted.contains(&r.result.outcome))
                .map(|r| self.entry_row(r))
                .collect::<Vec<_>>()
        };
        let entry_header = self.entry_header();
        let mut written = vec![
            write_csv(&with_suffix(base, ""), &entry_header, by(&[Outcome::Tp, Outcome::Liq]))?,
            write_csv(&with_suffix(base, "_liq"), &entry_header, by(&[Outcome::Liq]))?,
            write_csv(&with_suffix(base, "_tp"), &entry_header, by(&[Outcome::Tp]))?,
            write_csv(&with_suffix(base, "_open"), &entry_header, by(&[Outcome::Open]))?,
        ];

        let raw = records
            .iter()
            .filter(|r| r.result.outcome == Outcome::Open)
            .map(|r| vec![format_timestamp(r.entry_time), r.entry_price.to_string()]);
        written.push(write_csv(
            &with_suffix(base, "_open_raw"),
            &header(&["date", "close"]),
            raw,
        )?);
        Ok(written)
    }

    fn write_trades(&self, base: &str, trades: &[TradeRecord]) -> Result<Vec<String>, LadderError> {
        let path = write_csv(
            &with_suffix(base, "_trades"),
            &self.trade_header(),
            trades.iter().map(|t| self.trade_row(t)),
        )?;
        Ok(vec![path])
    }

    fn write_analysis(
        &self,
        dir: &str,
        month: YearMonth,
        analysis: &ReportAnalysis,
    ) -> Result<Vec<String>, LadderError> {
        let dir = Path::new(dir);
        let file = |stem: &str| dir.join(format!("{stem}_{month}.csv"));

        let dates = analysis.dates.iter().map(|d| {
            vec![
                d.date.format("%Y-%m-%d").to_string(),
                d.total.to_string(),
                d.liq.to_string(),
                format!("{:.2}", d.liq_pct),
            ]
        });
        let hours = analysis.hours.iter().map(|h| {
            vec![
                h.hour.to_string(),
                h.total.to_string(),
                h.liq.to_string(),
                format!("{:.2}", h.liq_pct),
            ]
        });
        let lookbacks = analysis.lookbacks.iter().map(|l| {
            vec![
                l.lookback_minutes.to_string(),
                l.bin.to_string(),
                l.count.to_string(),
                format!("{:.2}", l.tp_rate),
            ]
        });
        let optimized = std::iter::once(vec![
            analysis
                .optimized
                .tp_rate
                .map(|r| format!("{r:.2}"))
                .unwrap_or_default(),
            analysis.optimized.total_entries.to_string(),
        ]);

        Ok(vec![
            write_csv(&file("date_stats"), &header(&["Date", "Total", "LIQ", "LIQ_Pct"]), dates)?,
            write_csv(&file("hour_stats"), &header(&["Hour", "Total", "LIQ", "LIQ_Pct"]), hours)?,
            write_csv(
                &file("lookback_stats"),
                &header(&["Lookback_Min", "Return_Bin", "Count", "TP_Rate"]),
                lookbacks,
            )?,
            write_csv(
                &file("optimized_tp"),
                &header(&["TP_Rate", "Total_Entries"]),
                optimized,
            )?,
        ])
    }
}

/// Loads the entry columns of a report written by [`CsvReportAdapter`].
/// Rows that fail to parse are dropped.
pub fn read_entry_report(path: &Path) -> Result<Vec<AnalysisEntry>, LadderError> {
    let file = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| LadderError::MissingColumn {
                file: file.clone(),
                column: name.to_string(),
            })
    };
    let time_col = column(ENTRY_TIME)?;
    let price_col = column(ENTRY_PRICE)?;
    let result_col = column(RESULT)?;

    let mut entries = Vec::new();
    let mut dropped = 0usize;
    for record in rdr.records() {
        let Ok(record) = record else {
            dropped += 1;
            continue;
        };
        let time = record.get(time_col).and_then(parse_timestamp);
        let price = record.get(price_col).and_then(|s| s.trim().parse::<f64>().ok());
        let outcome = record.get(result_col).and_then(Outcome::parse);
        match (time, price, outcome) {
            (Some(entry_time), Some(entry_price), Some(outcome)) => entries.push(AnalysisEntry {
                entry_time,
                entry_price,
                outcome,
            }),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::warn!(file = %file, dropped, "dropped unparseable report rows");
    }
    tracing::info!(file = %file, entries = entries.len(), "loaded entry report");
    Ok(entries)
}
