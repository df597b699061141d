//! Validated price history for one asset and the returns derived from it.

use market_data_ingestor::models::bar::{Bar, BarSeries};

use crate::errors::AcquisitionError;

/// Chronological OHLC history for one asset.
///
/// Immutable once built: every price is finite and strictly positive and
/// timestamps never go backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, AcquisitionError> {
        if bars.is_empty() {
            return Err(AcquisitionError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                return Err(AcquisitionError::Malformed(format!(
                    "bar {i} ({}) has a non-positive or non-finite price",
                    bar.timestamp
                )));
            }
        }
        if let Some(i) = bars.windows(2).position(|w| w[1].timestamp < w[0].timestamp) {
            return Err(AcquisitionError::Malformed(format!(
                "timestamps go backwards at bar {}",
                i + 1
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    /// Validates `series` and additionally requires `min_len` bars.
    pub fn from_bar_series(series: BarSeries, min_len: usize) -> Result<Self, AcquisitionError> {
        let got = series.bars.len();
        if got == 0 {
            return Err(AcquisitionError::Empty);
        }
        if got < min_len {
            return Err(AcquisitionError::InsufficientHistory { got, need: min_len });
        }
        Self::new(series.symbol, series.bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Most recent bar; a `PriceSeries` is never empty.
    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Percent change of the last close against the one before it.
    pub fn daily_change_pct(&self) -> f64 {
        match self.bars.len() {
            0 | 1 => 0.0,
            n => (self.bars[n - 1].close / self.bars[n - 2].close - 1.0) * 100.0,
        }
    }

    pub fn returns(&self) -> ReturnSeries {
        ReturnSeries::from_closes(&self.closes())
    }
}

/// Percentage log-returns, `100 * ln(c[t] / c[t-1])`; one shorter than its price series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries(Vec<f64>);

impl ReturnSeries {
    pub fn from_closes(closes: &[f64]) -> Self {
        Self(
            closes
                .windows(2)
                .map(|w| 100.0 * (w[1] / w[0]).ln())
                .collect(),
        )
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use market_data_ingestor::models::timeframe::TimeFrame;

    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::ohlc(t0 + Duration::days(i as i64), c, c, c, c))
            .collect()
    }

    #[test]
    fn returns_are_percent_log_returns() {
        let s = PriceSeries::new("BTC", bars(&[100.0, 110.0, 99.0])).unwrap();
        let r = s.returns();
        assert_eq!(r.len(), 2);
        assert!((r.values()[0] - 100.0 * (1.1f64).ln()).abs() < 1e-12);
        assert!((r.values()[1] - 100.0 * (0.9f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn daily_change_uses_last_two_closes() {
        let s = PriceSeries::new("ETH", bars(&[100.0, 200.0, 210.0])).unwrap();
        assert!((s.daily_change_pct() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_prices() {
        let err = PriceSeries::new("SOL", bars(&[10.0, 0.0, 11.0])).unwrap_err();
        assert!(matches!(err, AcquisitionError::Malformed(_)));
    }

    #[test]
    fn rejects_backwards_timestamps() {
        let mut b = bars(&[10.0, 11.0, 12.0]);
        b.swap(1, 2);
        let err = PriceSeries::new("SOL", b).unwrap_err();
        assert!(err.to_string().contains("backwards"));
    }

    #[test]
    fn short_series_is_insufficient() {
        let series = BarSeries {
            symbol: "ADA".into(),
            timeframe: TimeFrame::day(),
            bars: bars(&[1.0; 5]),
        };
        let err = PriceSeries::from_bar_series(series, 30).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::InsufficientHistory { got: 5, need: 30 }
        ));
    }
}
