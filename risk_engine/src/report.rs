//! The per-asset report and the snapshot that collects them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{indicators::Trend, signal::Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    /// Computed from market data fetched during this run.
    Live,
    /// Synthesized because the live path failed; see the report's `note`.
    DegradedFallback,
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataQuality::Live => "LIVE",
            DataQuality::DegradedFallback => "DEGRADED_FALLBACK",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    pub price: f64,
    pub daily_change_pct: f64,
    pub risk_score: f64,
    pub trend: Trend,
    pub signal: Signal,
    pub signal_color: String,
    pub rsi: Option<f64>,
    /// Forecast daily volatility, percent.
    pub volatility_pct: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size_tier: String,
    pub position_size_pct: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub forecast_low: Option<f64>,
    pub forecast_high: Option<f64>,
    pub history_prices: Vec<f64>,
    pub history_labels: Vec<String>,
    pub data_quality: DataQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AssetReport {
    pub fn is_live(&self) -> bool {
        self.data_quality == DataQuality::Live
    }
}

impl fmt::Display for AssetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:+.2}%) risk {:.0} {} {} SL {} TP {} size {} [{}]",
            format_usd(self.price),
            self.daily_change_pct,
            self.risk_score,
            self.trend,
            self.signal,
            format_usd(self.stop_loss),
            format_usd(self.take_profit),
            self.position_size_tier,
            self.data_quality,
        )
    }
}

/// Symbol to report, in configured asset order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(IndexMap<String, AssetReport>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the report for `symbol`, keeping its original position.
    pub fn insert(&mut self, symbol: impl Into<String>, report: AssetReport) {
        self.0.insert(symbol.into(), report);
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetReport> {
        self.0.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AssetReport)> {
        self.0.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.0.values().filter(|r| r.is_live()).count()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.0.keys().map(String::len).max().unwrap_or(0);
        for (symbol, report) in &self.0 {
            writeln!(f, "{symbol:<width$}  {report}")?;
        }
        write!(f, "{} assets, {} live", self.len(), self.live_count())
    }
}

/// `$1,234.56`; sub-dollar prices keep up to six decimals (`$0.000123`).
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let decimals = if value.abs() >= 1.0 || value == 0.0 { 2 } else { 6 };
    let text = format!("{:.*}", decimals, value.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(price: f64, quality: DataQuality) -> AssetReport {
        AssetReport {
            price,
            daily_change_pct: 1.25,
            risk_score: 42.4,
            trend: Trend::Bullish,
            signal: Signal::StrongBuy,
            signal_color: Signal::StrongBuy.color().to_string(),
            rsi: Some(61.0),
            volatility_pct: Some(2.2),
            stop_loss: price * 0.95,
            take_profit: price * 1.05,
            position_size_tier: "10%".into(),
            position_size_pct: 10.0,
            support: None,
            resistance: None,
            forecast_low: None,
            forecast_high: None,
            history_prices: vec![price],
            history_labels: vec!["2025-01-01".into()],
            data_quality: quality,
            note: None,
        }
    }

    #[test]
    fn usd_formatting() {
        assert_eq!(format_usd(64210.5), "$64,210.50");
        assert_eq!(format_usd(1234567.891), "$1,234,567.89");
        assert_eq!(format_usd(999.0), "$999.00");
        assert_eq!(format_usd(0.000123), "$0.000123");
        assert_eq!(format_usd(-1500.0), "-$1,500.00");
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(f64::NAN), "n/a");
    }

    #[test]
    fn snapshot_keeps_insertion_order_and_serializes_flat() {
        let mut snap = Snapshot::new();
        snap.insert("SOL", report(150.0, DataQuality::Live));
        snap.insert("BTC", report(60000.0, DataQuality::DegradedFallback));
        assert_eq!(snap.symbols().collect::<Vec<_>>(), ["SOL", "BTC"]);
        assert_eq!(snap.live_count(), 1);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["BTC"]["data_quality"], "DEGRADED_FALLBACK");
        assert_eq!(json["SOL"]["signal"], "STRONG_BUY");
        assert_eq!(json["SOL"]["trend"], "BULLISH");
        assert!(json["SOL"].get("note").is_none());

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn summary_rendering() {
        let mut snap = Snapshot::new();
        snap.insert("BTC", report(64000.0, DataQuality::Live));
        snap.insert("DOGE", report(0.125, DataQuality::DegradedFallback));
        insta::assert_snapshot!(snap.to_string(), @r"
        BTC   $64,000.00 (+1.25%) risk 42 BULLISH STRONG_BUY SL $60,800.00 TP $67,200.00 size 10% [LIVE]
        DOGE  $0.125000 (+1.25%) risk 42 BULLISH STRONG_BUY SL $0.118750 TP $0.131250 size 10% [DEGRADED_FALLBACK]
        2 assets, 1 live
        ");
    }
}
