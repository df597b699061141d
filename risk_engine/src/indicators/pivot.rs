use market_data_ingestor::models::bar::Bar;

use super::IndicatorUnavailable;

/// Classic floor-trader pivot with the first support and resistance levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub support1: f64,
    pub resistance1: f64,
}

impl PivotLevels {
    pub fn from_bar(bar: &Bar) -> Self {
        let pivot = (bar.high + bar.low + bar.close) / 3.0;
        Self {
            pivot,
            support1: 2.0 * pivot - bar.high,
            resistance1: 2.0 * pivot - bar.low,
        }
    }
}

/// Pivot levels for the latest bar, computed from the completed bar before it.
pub fn pivot_levels(bars: &[Bar]) -> Result<PivotLevels, IndicatorUnavailable> {
    match bars.len() {
        n if n >= 2 => Ok(PivotLevels::from_bar(&bars[n - 2])),
        n => Err(IndicatorUnavailable {
            indicator: "PIVOT",
            need: 2,
            got: n,
        }),
    }
}
