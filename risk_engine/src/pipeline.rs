//! The per-asset analysis pipeline and the market-wide run built on it.
//!
//! Each asset goes FETCH → INDICATORS + FORECAST → SYNTHESIZE. A failure at any
//! step is logged and replaced by a fallback report, so every requested asset
//! ends up in the snapshot and a run never fails because of market data.
//! Assets are processed one at a time, in request order.

use chrono::{DateTime, Utc};
use market_data_ingestor::{
    models::request_params::{BarsRequestParams, ProviderParams},
    providers::{DataProvider, cryptocompare::CryptoCompareParams},
};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{info, instrument, warn};

use crate::{
    config::{AssetCfg, RiskEngineConfig},
    errors::{AcquisitionError, AnalysisError},
    fallback::{fallback_report, resolve_reference_price},
    indicators,
    report::{AssetReport, DataQuality, Snapshot},
    series::PriceSeries,
    signal::{SignalInputs, synthesize, tier_label},
    snapshot::{SnapshotError, SnapshotSink},
    volatility::{self, ModelFitError, VolatilityForecast},
};

/// Optional overrides for one run.
#[derive(Debug, Clone)]
pub struct MarketRequest {
    /// Symbols to analyse instead of the configured list.
    pub assets: Option<Vec<String>>,
    pub lookback_days: Option<u32>,
    /// End of the history window and the date fallback labels end on.
    pub as_of: DateTime<Utc>,
}

impl MarketRequest {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            assets: None,
            lookback_days: None,
            as_of,
        }
    }
}

impl Default for MarketRequest {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// How one asset came out of the pipeline.
#[derive(Debug)]
pub enum AssetOutcome {
    Live(AssetReport),
    Degraded {
        report: AssetReport,
        cause: AnalysisError,
    },
}

impl AssetOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, AssetOutcome::Live(_))
    }

    pub fn report(&self) -> &AssetReport {
        match self {
            AssetOutcome::Live(report) | AssetOutcome::Degraded { report, .. } => report,
        }
    }

    pub fn into_report(self) -> AssetReport {
        match self {
            AssetOutcome::Live(report) | AssetOutcome::Degraded { report, .. } => report,
        }
    }
}

/// Result of [`run`].
#[derive(Debug)]
pub struct RunSummary<O> {
    pub snapshot: Snapshot,
    pub live: usize,
    pub degraded: usize,
    /// What the sink reported back.
    pub written: O,
}

/// Fetches and validates the history for one asset.
pub async fn acquire(
    provider: &dyn DataProvider,
    asset: &AssetCfg,
    config: &RiskEngineConfig,
    lookback_days: u32,
    as_of: DateTime<Utc>,
) -> Result<PriceSeries, AcquisitionError> {
    let mut params = BarsRequestParams::daily_lookback(asset.remote_symbol(), lookback_days, as_of);
    params.provider_specific = ProviderParams::CryptoCompare(CryptoCompareParams {
        quote: Some(config.provider.quote.clone()),
        exchange: config.provider.exchange.clone(),
    });

    let mut series = provider
        .fetch_bars(params)
        .await?
        .into_iter()
        .next()
        .ok_or(AcquisitionError::Empty)?;
    series.symbol = asset.symbol.clone();
    PriceSeries::from_bar_series(series, config.min_history)
}

/// Fits the volatility model, recovering a flat series as zero volatility.
pub fn forecast_volatility(
    series: &PriceSeries,
    config: &RiskEngineConfig,
) -> Result<VolatilityForecast, ModelFitError> {
    match volatility::forecast(series.returns().values(), &config.garch) {
        Err(ModelFitError::DegenerateSeries { mean_square }) => {
            info!(
                symbol = series.symbol(),
                mean_square, "price did not move; using zero volatility"
            );
            Ok(VolatilityForecast::zero())
        }
        other => other,
    }
}

/// Turns a validated price history into a LIVE report.
pub fn analyze_series(
    series: &PriceSeries,
    config: &RiskEngineConfig,
) -> Result<AssetReport, AnalysisError> {
    let (indicator_set, _missing) = indicators::compute(series, &config.indicators);
    let forecast = forecast_volatility(series, config)?;

    let price = series.last().close;
    let a = synthesize(
        SignalInputs {
            price,
            forecast: &forecast,
            indicators: &indicator_set,
        },
        &config.policy,
    );

    let tail = &series.bars()[series.len().saturating_sub(config.history_window)..];
    Ok(AssetReport {
        price,
        daily_change_pct: series.daily_change_pct(),
        risk_score: a.risk_score,
        trend: a.trend,
        signal: a.signal,
        signal_color: a.signal.color().to_string(),
        rsi: Some(a.rsi),
        volatility_pct: Some(a.volatility_pct),
        stop_loss: a.stop_loss,
        take_profit: a.take_profit,
        position_size_tier: tier_label(a.position_size_pct),
        position_size_pct: a.position_size_pct,
        support: a.support,
        resistance: a.resistance,
        forecast_low: Some(a.forecast_low),
        forecast_high: Some(a.forecast_high),
        history_prices: tail.iter().map(|b| b.close).collect(),
        history_labels: tail
            .iter()
            .map(|b| b.timestamp.format("%Y-%m-%d").to_string())
            .collect(),
        data_quality: DataQuality::Live,
        note: None,
    })
}

async fn analyze_asset(
    provider: &dyn DataProvider,
    asset: &AssetCfg,
    config: &RiskEngineConfig,
    request: &MarketRequest,
) -> Result<AssetReport, AnalysisError> {
    let lookback = request.lookback_days.unwrap_or(config.lookback_days);
    let series = acquire(provider, asset, config, lookback, request.as_of).await?;
    analyze_series(&series, config)
}

/// Runs one asset through the pipeline, producing a fallback report on failure.
#[instrument(skip_all, fields(symbol = %asset.symbol))]
pub async fn process_asset(
    provider: &dyn DataProvider,
    asset: &AssetCfg,
    config: &RiskEngineConfig,
    request: &MarketRequest,
    previous: Option<&Snapshot>,
    rng: &mut StdRng,
) -> AssetOutcome {
    match analyze_asset(provider, asset, config, request).await {
        Ok(report) => AssetOutcome::Live(report),
        Err(cause) => {
            warn!(stage = ?cause.stage(), error = %cause, "analysis failed; using fallback");
            let last_known = previous
                .and_then(|s| s.get(&asset.symbol))
                .map(|r| r.price);
            let reference = resolve_reference_price([last_known, asset.reference_price]);
            let report = fallback_report(
                reference,
                request.as_of.date_naive(),
                &cause.to_string(),
                &config.fallback,
                &config.policy,
                rng,
            );
            AssetOutcome::Degraded { report, cause }
        }
    }
}

fn requested_assets(config: &RiskEngineConfig, request: &MarketRequest) -> Vec<AssetCfg> {
    match &request.assets {
        None => config.assets.clone(),
        Some(symbols) => {
            let mut out: Vec<AssetCfg> = Vec::with_capacity(symbols.len());
            for s in symbols.iter().filter(|s| !s.trim().is_empty()) {
                let asset = config.asset(s);
                if !out.iter().any(|a| a.symbol == asset.symbol) {
                    out.push(asset);
                }
            }
            out
        }
    }
}

/// Builds the fallback RNG: seeded when configured, from the OS otherwise.
pub fn fallback_rng(config: &RiskEngineConfig) -> StdRng {
    match config.fallback.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Analyses every requested asset, one after another.
///
/// `previous` is the last snapshot written, used for fallback reference prices.
/// Always returns one report per requested asset, keyed in request order.
pub async fn analyze_market(
    provider: &dyn DataProvider,
    config: &RiskEngineConfig,
    request: &MarketRequest,
    previous: Option<&Snapshot>,
) -> Snapshot {
    let assets = requested_assets(config, request);
    let mut rng = fallback_rng(config);
    let mut snapshot = Snapshot::new();

    for asset in &assets {
        let outcome = process_asset(provider, asset, config, request, previous, &mut rng).await;
        snapshot.insert(asset.symbol.clone(), outcome.into_report());
    }

    info!(
        assets = snapshot.len(),
        live = snapshot.live_count(),
        degraded = snapshot.len() - snapshot.live_count(),
        "market analysis finished"
    );
    snapshot
}

/// Analyses the market and hands the complete snapshot to `sink`.
///
/// Only a failed write is an error.
pub async fn run<S: SnapshotSink + Sync>(
    provider: &dyn DataProvider,
    config: &RiskEngineConfig,
    request: &MarketRequest,
    previous: Option<&Snapshot>,
    sink: &S,
) -> Result<RunSummary<S::Output>, SnapshotError> {
    let snapshot = analyze_market(provider, config, request, previous).await;
    let written = sink.write(&snapshot).await?;
    let live = snapshot.live_count();
    Ok(RunSummary {
        live,
        degraded: snapshot.len() - live,
        snapshot,
        written,
    })
}
