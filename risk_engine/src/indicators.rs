//! Deterministic technical indicators over a [`PriceSeries`].
//!
//! Every indicator needs a minimum number of observations. When the series is
//! too short the indicator reports [`IndicatorUnavailable`] and [`compute`]
//! leaves the matching [`IndicatorSet`] field empty instead of failing the asset.

pub mod momentum;
pub mod pivot;
pub mod range;
pub mod trend;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use momentum::{NEUTRAL_RSI, rsi};
pub use pivot::{PivotLevels, pivot_levels};
pub use range::{atr, true_ranges};
pub use trend::{Trend, TrendWindows, classify_trend, sma};

use crate::series::PriceSeries;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{indicator} needs {need} observations, have {got}")]
pub struct IndicatorUnavailable {
    pub indicator: &'static str,
    pub need: usize,
    pub got: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorSettings {
    pub trend_fast: usize,
    pub trend_slow: usize,
    /// Used instead of the primary windows when the series is shorter than `trend_slow`.
    pub substitute_fast: usize,
    pub substitute_slow: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            trend_fast: 50,
            trend_slow: 200,
            substitute_fast: 10,
            substitute_slow: 30,
            rsi_period: 14,
            atr_period: 14,
        }
    }
}

impl IndicatorSettings {
    /// The SMA pair that fits a series of `len` closes.
    pub fn trend_windows(&self, len: usize) -> TrendWindows {
        if len >= self.trend_slow {
            TrendWindows {
                fast: self.trend_fast,
                slow: self.trend_slow,
            }
        } else {
            TrendWindows {
                fast: self.substitute_fast,
                slow: self.substitute_slow,
            }
        }
    }
}

/// Indicator values computed for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub windows: TrendWindows,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub trend: Trend,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub pivot: Option<PivotLevels>,
}

impl IndicatorSet {
    /// RSI, or the neutral 50 when it could not be computed.
    pub fn rsi_or_neutral(&self) -> f64 {
        self.rsi.unwrap_or(NEUTRAL_RSI)
    }

    pub fn support(&self) -> Option<f64> {
        self.pivot.map(|p| p.support1)
    }

    pub fn resistance(&self) -> Option<f64> {
        self.pivot.map(|p| p.resistance1)
    }
}

/// Computes every indicator it can; the rest are returned as unavailable.
pub fn compute(
    series: &PriceSeries,
    settings: &IndicatorSettings,
) -> (IndicatorSet, Vec<IndicatorUnavailable>) {
    let closes = series.closes();
    let bars = series.bars();
    let price = series.last().close;
    let windows = settings.trend_windows(closes.len());
    let mut missing = Vec::new();

    let mut keep = |r: Result<f64, IndicatorUnavailable>| match r {
        Ok(v) => Some(v),
        Err(e) => {
            missing.push(e);
            None
        }
    };
    let sma_fast = keep(sma(&closes, windows.fast));
    let sma_slow = keep(sma(&closes, windows.slow));
    let rsi = keep(rsi(&closes, settings.rsi_period));
    let atr = keep(atr(bars, settings.atr_period));
    let pivot = match pivot_levels(bars) {
        Ok(p) => Some(p),
        Err(e) => {
            missing.push(e);
            None
        }
    };

    for e in &missing {
        debug!(symbol = series.symbol(), "{e}");
    }

    let set = IndicatorSet {
        windows,
        sma_fast,
        sma_slow,
        trend: classify_trend(price, sma_fast, sma_slow),
        rsi,
        atr,
        pivot,
    };
    (set, missing)
}
