//! Price data access port trait.

use crate::domain::error::LadderError;
use crate::domain::price_series::PriceSeries;

pub trait PriceDataPort {
    /// Cleaned, ordered series. Rows that fail to parse are dropped by the
    /// implementation rather than reported.
    fn load_prices(&self) -> Result<PriceSeries, LadderError>;
}
