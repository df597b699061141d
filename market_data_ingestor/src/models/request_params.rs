use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::timeframe::TimeFrame,
    providers::cryptocompare::params::CryptoCompareParams,
};

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// This struct is vendor-agnostic. It is the standard input for all
/// [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["BTC"]`, `["ETH", "SOL"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// Daily crypto bars for one symbol covering the `lookback_days` before `end`.
    pub fn daily_lookback(symbol: impl Into<String>, lookback_days: u32, end: DateTime<Utc>) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe: TimeFrame::day(),
            start: end - Duration::days(i64::from(lookback_days)),
            end,
            provider_specific: ProviderParams::None,
        }
    }
}

/// An enum to hold provider-specific request parameters.
///
/// This allows callers to specify detailed, per-request options for a
/// particular provider without cluttering the universal `BarsRequestParams`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    CryptoCompare(CryptoCompareParams),
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn daily_lookback_spans_requested_days() {
        let end = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        let p = BarsRequestParams::daily_lookback("BTC", 30, end);
        assert_eq!(p.symbols, vec!["BTC".to_string()]);
        assert_eq!(p.timeframe, TimeFrame::day());
        assert_eq!((p.end - p.start).num_days(), 30);
    }
}
