#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use laddersim::domain::error::LadderError;
use laddersim::domain::price_series::{PricePoint, PriceSeries, format_timestamp};
use laddersim::domain::strategy::StrategyParams;
use laddersim::ports::data_port::PriceDataPort;
use std::path::{Path, PathBuf};

pub struct MockPriceData {
    pub points: Vec<PricePoint>,
    pub error: Option<String>,
}

impl MockPriceData {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            error: None,
        }
    }

    pub fn with_error(reason: &str) -> Self {
        Self {
            points: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl PriceDataPort for MockPriceData {
    fn load_prices(&self) -> Result<PriceSeries, LadderError> {
        if let Some(reason) = &self.error {
            return Err(LadderError::Data {
                reason: reason.clone(),
            });
        }
        PriceSeries::new(self.points.clone())
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

pub fn minute(i: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(i)
}

/// One point per minute from 2025-03-01 00:00 UTC.
pub fn minute_points(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(minute(i as i64), p))
        .collect()
}

pub fn minute_series(prices: &[f64]) -> PriceSeries {
    PriceSeries::new(minute_points(prices)).unwrap()
}

/// Default params without fees, so take-profit is exactly `1 + 0.05/20`.
pub fn fee_free_params() -> StrategyParams {
    StrategyParams {
        maker_fee: 0.0,
        fee_inclusive: false,
        ..StrategyParams::default()
    }
}

pub fn wave_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + ((i as f64) * 0.05).sin() * 4.0 + ((i as f64) * 0.31).cos() * 0.8)
        .collect()
}

/// Writes a converted minute CSV (`date`,`close`) into `dir`.
pub fn write_price_csv(dir: &Path, name: &str, points: &[PricePoint]) -> PathBuf {
    let mut content = String::from("timestamp,close,date\n");
    for (i, p) in points.iter().enumerate() {
        content.push_str(&format!("{i},{},{}\n", p.price, format_timestamp(p.time)));
    }
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
