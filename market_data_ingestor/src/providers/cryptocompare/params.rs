use serde::{Deserialize, Serialize};

use crate::{
    models::{
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Largest `limit` the histo endpoints accept in one call.
pub const MAX_LIMIT: i64 = 2000;

/// Quote currency used when the request does not name one.
pub const DEFAULT_QUOTE: &str = "USD";

/// CryptoCompare-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CryptoCompareParams {
    /// Quote currency (`tsym`), e.g. "USD" or "USDT".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    /// Restrict to one exchange (`e`); the CCCAGG aggregate index otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
}

/// Maps a timeframe onto the histo endpoint path.
///
/// CryptoCompare only serves minute, hour and day candles; larger amounts are
/// built server-side through the `aggregate` parameter.
pub fn endpoint_path(timeframe: &TimeFrame) -> &'static str {
    match timeframe.unit {
        TimeFrameUnit::Minute => "/data/v2/histominute",
        TimeFrameUnit::Hour => "/data/v2/histohour",
        _ => "/data/v2/histoday",
    }
}

pub fn validate_timeframe(timeframe: &TimeFrame) -> Result<(), ProviderError> {
    match timeframe.unit {
        TimeFrameUnit::Minute | TimeFrameUnit::Hour | TimeFrameUnit::Day if timeframe.amount >= 1 => {
            Ok(())
        }
        TimeFrameUnit::Week | TimeFrameUnit::Month => ValidationSnafu {
            message: format!("CryptoCompare has no {timeframe} candles"),
        }
        .fail(),
        _ => ValidationSnafu {
            message: "timeframe amount must be at least 1",
        }
        .fail(),
    }
}

pub fn validate_request(params: &BarsRequestParams) -> Result<(), ProviderError> {
    validate_timeframe(&params.timeframe)?;
    if params.end <= params.start {
        return ValidationSnafu {
            message: "request end must be after start",
        }
        .fail();
    }
    Ok(())
}

/// Number of candles covering `[start, end)` for the requested timeframe, capped at [`MAX_LIMIT`].
fn candle_limit(params: &BarsRequestParams) -> i64 {
    let span = params.end - params.start;
    let units = match params.timeframe.unit {
        TimeFrameUnit::Minute => span.num_minutes(),
        TimeFrameUnit::Hour => span.num_hours(),
        _ => span.num_days(),
    };
    let per_candle = i64::from(params.timeframe.amount.max(1));
    (units / per_candle).clamp(1, MAX_LIMIT)
}

/// Builds the query string for one symbol.
pub fn construct_params(symbol: &str, params: &BarsRequestParams) -> Vec<(String, String)> {
    let specific = match &params.provider_specific {
        ProviderParams::CryptoCompare(p) => Some(p),
        ProviderParams::None => None,
    };
    let quote = specific
        .and_then(|p| p.quote.clone())
        .unwrap_or_else(|| DEFAULT_QUOTE.to_string());

    let mut query = vec![
        ("fsym".to_string(), symbol.to_string()),
        ("tsym".to_string(), quote),
        ("limit".to_string(), candle_limit(params).to_string()),
        ("toTs".to_string(), params.end.timestamp().to_string()),
    ];
    if params.timeframe.amount > 1 {
        query.push(("aggregate".to_string(), params.timeframe.amount.to_string()));
    }
    if let Some(exchange) = specific.and_then(|p| p.exchange.as_ref()) {
        query.push(("e".to_string(), exchange.clone()));
    }
    query
}
