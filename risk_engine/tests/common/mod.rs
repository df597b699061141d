#![allow(dead_code)]

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_data_ingestor::{
    models::{bar::Bar, bar::BarSeries, request_params::BarsRequestParams, timeframe::TimeFrame},
    providers::{ApiSnafu, DataProvider, ProviderError},
};
use risk_engine::{config::RiskEngineConfig, series::PriceSeries};

/// Fixed run date so labels and fallback histories are stable.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
}

/// One bar per day with `high == low == close`, the last one the day before `end`.
pub fn daily_bars(closes: &[f64], end: DateTime<Utc>) -> Vec<Bar> {
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::ohlc(end - Duration::days(n - i as i64), c, c, c, c))
        .collect()
}

pub fn price_series(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, daily_bars(closes, as_of())).unwrap()
}

pub fn flat(days: usize, price: f64) -> Vec<f64> {
    vec![price; days]
}

/// `days` closes rising by one dollar a day from 100.
pub fn rising(days: usize) -> Vec<f64> {
    (0..days).map(|i| 100.0 + i as f64).collect()
}

/// Sixty choppy days between 100 and 101, then `up_days` of steady gains.
pub fn breakout(up_days: usize) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
    let mut last = 101.0;
    for _ in 0..up_days {
        last += 1.0;
        closes.push(last);
    }
    closes
}

/// Config with a fixed fallback seed.
pub fn test_config(symbols: &[&str]) -> RiskEngineConfig {
    let mut cfg = RiskEngineConfig::default();
    cfg.assets = symbols
        .iter()
        .map(|s| risk_engine::config::AssetCfg::new(*s))
        .collect();
    cfg.fallback.seed = Some(7);
    cfg
}

enum Script {
    Closes(Vec<f64>),
    Empty,
    Fail(String),
}

/// Provider answering from canned data; unknown symbols fail like an API error.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_closes(mut self, symbol: &str, closes: Vec<f64>) -> Self {
        self.scripts.insert(symbol.to_string(), Script::Closes(closes));
        self
    }

    pub fn with_empty(mut self, symbol: &str) -> Self {
        self.scripts.insert(symbol.to_string(), Script::Empty);
        self
    }

    pub fn with_failure(mut self, symbol: &str, message: &str) -> Self {
        self.scripts
            .insert(symbol.to_string(), Script::Fail(message.to_string()));
        self
    }

    /// Symbols requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        let mut out = Vec::new();
        for symbol in params.symbols {
            self.calls.lock().unwrap().push(symbol.clone());
            match self.scripts.get(&symbol) {
                Some(Script::Closes(closes)) => out.push(BarSeries {
                    bars: daily_bars(closes, params.end),
                    symbol,
                    timeframe: TimeFrame::day(),
                }),
                Some(Script::Empty) => {}
                Some(Script::Fail(message)) => {
                    return ApiSnafu {
                        message: message.clone(),
                    }
                    .fail();
                }
                None => {
                    return ApiSnafu {
                        message: format!("unknown symbol {symbol}"),
                    }
                    .fail();
                }
            }
        }
        Ok(out)
    }
}
