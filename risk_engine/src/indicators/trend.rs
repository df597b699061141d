use std::fmt;

use serde::{Deserialize, Serialize};

use super::IndicatorUnavailable;

/// Direction of the market relative to its moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
    Unknown,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bullish => "BULLISH",
            Trend::Bearish => "BEARISH",
            Trend::Sideways => "SIDEWAYS",
            Trend::Unknown => "UNKNOWN",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendWindows {
    pub fast: usize,
    pub slow: usize,
}

/// Arithmetic mean of the last `window` closes.
pub fn sma(closes: &[f64], window: usize) -> Result<f64, IndicatorUnavailable> {
    if window == 0 || closes.len() < window {
        return Err(IndicatorUnavailable {
            indicator: "SMA",
            need: window.max(1),
            got: closes.len(),
        });
    }
    let tail = &closes[closes.len() - window..];
    Ok(tail.iter().sum::<f64>() / window as f64)
}

/// BULLISH when `price > fast > slow`, BEARISH when `price < fast < slow`, SIDEWAYS otherwise.
pub fn classify_trend(price: f64, fast: Option<f64>, slow: Option<f64>) -> Trend {
    match (fast, slow) {
        (Some(fast), Some(slow)) if price > fast && fast > slow => Trend::Bullish,
        (Some(fast), Some(slow)) if price < fast && fast < slow => Trend::Bearish,
        (Some(_), Some(_)) => Trend::Sideways,
        _ => Trend::Unknown,
    }
}
