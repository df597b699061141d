use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{get_env_var, optional_env_var};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    models::{
        bar::{Bar, BarSeries},
        request_params::BarsRequestParams,
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, InvalidApiKeySnafu, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, RateLimitedSnafu, ReqwestSnafu,
        cryptocompare::{
            params::{construct_params, endpoint_path, validate_request},
            response::{HistoCandle, HistoResponse},
        },
    },
};

const BASE_URL: &str = "https://min-api.cryptocompare.com";

/// Environment variable holding the (optional) API key.
pub const API_KEY_ENV: &str = "CRYPTOCOMPARE_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CryptoCompareProvider {
    client: Client,
    base_url: String,
}

impl CryptoCompareProvider {
    /// Creates a provider, sending `api_key` (if any) as `Authorization: Apikey ...`.
    ///
    /// The free tier works without a key, at a lower rate limit.
    pub fn new(api_key: Option<SecretString>) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = format!("Apikey {}", key.expose_secret());
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&value).context(InvalidApiKeySnafu)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Reads the API key from [`API_KEY_ENV`]; a missing key means anonymous access.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        Self::new(optional_env_var(API_KEY_ENV).map(|key| SecretString::new(key.into())))
    }

    /// Like [`from_env`](Self::from_env), but refuses to start without a key.
    pub fn from_env_required() -> Result<Self, ProviderInitError> {
        let key = get_env_var(API_KEY_ENV).context(MissingEnvVarSnafu)?;
        Self::new(Some(SecretString::new(key.into())))
    }

    /// Points the provider at another host (a mirror or a local stub server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        params: &BarsRequestParams,
    ) -> Result<BarSeries, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint_path(&params.timeframe));
        let query = construct_params(symbol, params);
        debug!(%symbol, %url, "requesting candles");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RateLimitedSnafu {
                message: format!("HTTP {status}"),
            }
            .fail();
        }
        if !status.is_success() {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                message: format!("HTTP {status}: {error_msg}"),
            }
            .fail();
        }

        let body = response.json::<HistoResponse>().await.context(ReqwestSnafu)?;
        into_bar_series(symbol, params, body)
    }
}

/// Converts one histo response into a [`BarSeries`].
///
/// Candles outside `[start, end)` are dropped, as are the all-zero candles
/// CryptoCompare pads in for days before a coin was listed.
pub fn into_bar_series(
    symbol: &str,
    params: &BarsRequestParams,
    body: HistoResponse,
) -> Result<BarSeries, ProviderError> {
    if !body.is_success() {
        if body.is_rate_limited() {
            return RateLimitedSnafu {
                message: body.message,
            }
            .fail();
        }
        return ApiSnafu {
            message: body.message,
        }
        .fail();
    }

    let mut bars = Vec::with_capacity(body.data.candles.len());
    for candle in body.data.candles {
        if is_padding(&candle) {
            continue;
        }
        let Some(timestamp) = DateTime::from_timestamp(candle.time, 0) else {
            warn!(%symbol, time = candle.time, "dropping candle with out-of-range timestamp");
            continue;
        };
        if timestamp < params.start || timestamp >= params.end {
            continue;
        }
        bars.push(Bar {
            timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume_from,
            trade_count: None,
            vwap: None,
        });
    }

    Ok(BarSeries {
        symbol: symbol.to_string(),
        timeframe: params.timeframe,
        bars,
    })
}

fn is_padding(candle: &HistoCandle) -> bool {
    candle.open == 0.0 && candle.high == 0.0 && candle.low == 0.0 && candle.close == 0.0
}

#[async_trait]
impl DataProvider for CryptoCompareProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        validate_request(&params)?;

        let mut result = Vec::with_capacity(params.symbols.len());
        for symbol in &params.symbols {
            result.push(self.fetch_symbol(symbol, &params).await?);
        }
        Ok(result)
    }
}
