//! CSV price data adapter.
//!
//! Reads a converted minute file by header name (`date`, `close`). Rows with an
//! unparseable timestamp or price are dropped and counted.

use std::path::PathBuf;

use crate::domain::error::LadderError;
use crate::domain::price_series::{PricePoint, PriceSeries, parse_timestamp};
use crate::ports::data_port::PriceDataPort;

pub const TIME_COLUMN: &str = "date";
pub const PRICE_COLUMN: &str = "close";

fn parse_price(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
}

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PriceDataPort for CsvPriceAdapter {
    fn load_prices(&self) -> Result<PriceSeries, LadderError> {
        let file = self.path.display().to_string();
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

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
        let time_col = column(TIME_COLUMN)?;
        let price_col = column(PRICE_COLUMN)?;

        let mut points = Vec::new();
        let mut dropped = 0usize;
        for result in rdr.records() {
            let Ok(record) = result else {
                dropped += 1;
                continue;
            };
            let time = record.get(time_col).and_then(parse_timestamp);
            let price = record.get(price_col).and_then(parse_price);
            match (time, price) {
                (Some(time), Some(price)) => points.push(PricePoint::new(time, price)),
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::warn!(file = %file, dropped, "dropped unparseable price rows");
        }
        let series = PriceSeries::new(points)?;
        tracing::info!(file = %file, samples = series.len(), "loaded price series");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_prices_by_header_name() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "p.csv",
            "timestamp,open,close,date\n\
             1,0,101.0,2025-03-01 00:01:00+00:00\n\
             0,0,100.0,2025-03-01 00:00:00+00:00\n",
        );
        let series = CsvPriceAdapter::new(path).load_prices().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.price(0), 100.0);
        assert_eq!(series.price(1), 101.0);
    }

    #[test]
    fn load_prices_drops_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "p.csv",
            "date,close\n\
             2025-03-01 00:00:00+00:00,100.0\n\
             2025-03-01 00:01:00+00:00,abc\n\
             not-a-date,101.0\n\
             2025-03-01 00:02:00+00:00,-5\n\
             2025-03-01 00:03:00+00:00,102.0\n\
             2025-03-01 00:03:00+00:00,103.0\n",
        );
        let series = CsvPriceAdapter::new(path).load_prices().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.price(1), 102.0);
    }

    #[test]
    fn load_prices_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "p.csv", "date,price\n2025-03-01 00:00:00+00:00,1\n");
        let err = CsvPriceAdapter::new(path).load_prices().unwrap_err();
        assert!(matches!(err, LadderError::MissingColumn { column, .. } if column == "close"));
    }

    #[test]
    fn load_prices_missing_file() {
        let result = CsvPriceAdapter::new(PathBuf::from("/nonexistent/prices.csv")).load_prices();
        assert!(result.is_err());
    }
}
