//! Raw exchange kline CSV to converted minute CSV.
//!
//! Raw files carry no header. The first column is an integer open time in
//! seconds, milliseconds or microseconds; the unit is detected from the first
//! row and applied to every row.

use chrono::{DateTime, Utc};
use chrono_tz::Asia::Seoul;
use std::path::{Path, PathBuf};

use crate::domain::error::LadderError;

pub const KLINE_COLUMNS: [&str; 12] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_timestamp",
    "quote_asset_volume",
    "number_of_trades",
    "taker_buy_base_asset_volume",
    "taker_buy_quote_asset_volume",
    "ignore",
];

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output: Option<PathBuf>,
    /// Write `date` in Asia/Seoul instead of UTC.
    pub to_kst: bool,
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            output: None,
            to_kst: false,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub rows: usize,
    pub dropped: usize,
    pub divisor: i64,
}

/// Divisor bringing a raw timestamp to seconds.
pub fn detect_timestamp_divisor(ts: i64) -> i64 {
    if ts > 1_000_000_000_000_000 {
        1_000_000
    } else if ts > 1_000_000_000_000 {
        1_000
    } else {
        1
    }
}

/// `<stem>_converted.<ext>` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}_converted.{}", ext.to_string_lossy()),
        None => format!("{stem}_converted"),
    };
    input.with_file_name(name)
}

fn format_date(t: DateTime<Utc>, to_kst: bool) -> String {
    if to_kst {
        t.with_timezone(&Seoul).format("%Y-%m-%d %H:%M:%S%:z").to_string()
    } else {
        t.format("%Y-%m-%d %H:%M:%S%:z").to_string()
    }
}

pub fn convert_klines(input: &Path, opts: &ConvertOptions) -> Result<ConvertSummary, LadderError> {
    let file = input.display().to_string();
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    if !opts.overwrite && output.exists() {
        return Err(LadderError::FileExists {
            path: output.display().to_string(),
        });
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)?;
    let records: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;

    let width = records.iter().map(|r| r.len()).max().unwrap_or(0);
    if width < KLINE_COLUMNS.len() {
        return Err(LadderError::ColumnCount {
            file,
            found: width,
            expected: KLINE_COLUMNS.len(),
        });
    }

    let first_ts = records
        .first()
        .and_then(|r| r.get(0))
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| LadderError::Data {
            reason: format!("first row of {file} has no integer timestamp"),
        })?;
    let divisor = detect_timestamp_divisor(first_ts);

    let mut header: Vec<String> = KLINE_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend((0..width - KLINE_COLUMNS.len()).map(|i| format!("extra_{i}")));
    header.push("date".to_string());

    let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(&output)?;
    wtr.write_record(&header)?;

    let mut rows = 0usize;
    let mut dropped = 0usize;
    for record in &records {
        let time = record
            .get(0)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(|ts| DateTime::from_timestamp(ts.div_euclid(divisor), 0));
        let Some(time) = time else {
            dropped += 1;
            continue;
        };
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        row.push(format_date(time, opts.to_kst));
        wtr.write_record(&row)?;
        rows += 1;
    }
    wtr.flush()?;

    if dropped > 0 {
        tracing::warn!(file = %file, dropped, "dropped rows with unparseable timestamps");
    }
    tracing::info!(output = %output.display(), rows, divisor, "converted kline file");
    Ok(ConvertSummary {
        output,
        rows,
        dropped,
        divisor,
    })
}
