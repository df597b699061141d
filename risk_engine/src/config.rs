//! Engine configuration: parsing, normalization, and loading.
//!
//! The TOML file describes:
//! - Which assets to analyse (canonical symbol, provider-side symbol, optional
//!   static reference price used when no live data can be had)
//! - Where the snapshot is written and how much history is requested
//! - The provider quote currency/exchange and request pacing
//! - Every tunable constant of the analysis (`[garch]`, `[indicators]`,
//!   `[policy]`, `[fallback]`)
//!
//! Every key is optional; omitted keys take the defaults of
//! [`RiskEngineConfig::default`]. Unknown keys are rejected.
//!
//! Key behaviors:
//! - Normalization trims and upper-cases symbols, trims remote symbols,
//!   and de-duplicates assets while preserving the first occurrence.
//! - Settings that would make the analysis meaningless (zero windows, inverted
//!   RSI thresholds, stops above the price, tiers rewarding risk) are rejected.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]

use std::{collections::HashSet, mem, path::PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use toml::from_str;
use tracing::debug;

use crate::{
    fallback::FallbackSettings, indicators::IndicatorSettings, signal::RiskPolicy,
    volatility::GarchSettings,
};

/// Assets analysed when the configuration names none.
pub const DEFAULT_ASSETS: [&str; 12] = [
    "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "AVAX", "DOGE", "DOT", "LINK", "MATIC", "LTC",
];

pub const DEFAULT_SNAPSHOT_PATH: &str = "risk_data.json";

/// Upper bound for `history_window` and `fallback.history_len`.
pub const MAX_HISTORY_POINTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskEngineConfig {
    /// Where the snapshot JSON is written.
    pub snapshot_path: PathBuf,
    /// Days of daily bars requested per asset.
    pub lookback_days: u32,
    /// Fewer bars than this sends the asset to the fallback path.
    pub min_history: usize,
    /// Number of closes kept in each report's `history_prices`.
    pub history_window: usize,
    pub assets: Vec<AssetCfg>,
    pub provider: ProviderCfg,
    pub pacing: PacingCfg,
    pub garch: GarchSettings,
    pub indicators: IndicatorSettings,
    pub policy: RiskPolicy,
    pub fallback: FallbackSettings,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            lookback_days: 365,
            min_history: 30,
            history_window: 30,
            assets: DEFAULT_ASSETS.iter().map(|s| AssetCfg::new(*s)).collect(),
            provider: ProviderCfg::default(),
            pacing: PacingCfg::default(),
            garch: GarchSettings::default(),
            indicators: IndicatorSettings::default(),
            policy: RiskPolicy::default(),
            fallback: FallbackSettings::default(),
        }
    }
}

impl RiskEngineConfig {
    /// The configured asset, or an ad-hoc one for a symbol the file does not list.
    pub fn asset(&self, symbol: &str) -> AssetCfg {
        let symbol = symbol.trim().to_uppercase();
        self.assets
            .iter()
            .find(|a| a.symbol == symbol)
            .cloned()
            .unwrap_or_else(|| AssetCfg::new(symbol))
    }
}

/// One analysed asset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssetCfg {
    /// Canonical symbol, used as the snapshot key (e.g. "BTC").
    pub symbol: String,
    /// Symbol sent to the provider; defaults to `symbol`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Static price the fallback report starts from when no newer price is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<f64>,
}

impl AssetCfg {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            remote: None,
            reference_price: None,
        }
    }

    pub fn remote_symbol(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderCfg {
    /// Quote currency prices are expressed in.
    pub quote: String,
    /// Single exchange to price against; the aggregate index when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Refuse to start without `CRYPTOCOMPARE_API_KEY`.
    pub require_api_key: bool,
}

impl Default for ProviderCfg {
    fn default() -> Self {
        Self {
            quote: "USD".to_string(),
            exchange: None,
            require_api_key: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingCfg {
    /// Provider requests allowed per minute, evenly spaced.
    pub requests_per_minute: u32,
}

impl Default for PacingCfg {
    fn default() -> Self {
        Self {
            requests_per_minute: 15,
        }
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Symbols that changed when trimming/upper-casing.
    pub symbols_renamed: usize,
    /// Assets dropped because their symbol was already listed.
    pub assets_deduped: usize,
}

/// Normalize a configuration in place.
///
/// Errors:
/// - Empty symbol or remote symbol after trimming
/// - Zero `min_history`, `history_window`, indicator window or pacing rate
/// - `history_window` or `fallback.history_len` above [`MAX_HISTORY_POINTS`]
/// - RSI thresholds not ordered `oversold < overbought <= overextended`
/// - Non-positive level multiples, band or annualization; scores outside `[0, 100]`
/// - Position tiers whose percentage grows with risk
pub fn normalize_config(cfg: &mut RiskEngineConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    let before_len = cfg.assets.len();
    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(before_len);
    for mut asset in mem::take(&mut cfg.assets) {
        let symbol = asset.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            bail!("asset symbol cannot be empty after trimming");
        }
        if symbol != asset.symbol {
            report.symbols_renamed += 1;
        }
        asset.symbol = symbol;

        if let Some(remote) = asset.remote.take() {
            let remote = remote.trim().to_string();
            if remote.is_empty() {
                bail!("remote symbol for {} cannot be empty after trimming", asset.symbol);
            }
            asset.remote = Some(remote);
        }

        if seen.insert(asset.symbol.clone()) {
            assets.push(asset);
        }
    }
    report.assets_deduped = before_len.saturating_sub(assets.len());
    cfg.assets = assets;

    cfg.provider.quote = cfg.provider.quote.trim().to_uppercase();
    if cfg.provider.quote.is_empty() {
        bail!("provider.quote cannot be empty");
    }
    cfg.provider.exchange = cfg
        .provider
        .exchange
        .take()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    if cfg.min_history == 0 {
        bail!("min_history must be at least 1");
    }
    if cfg.history_window == 0 {
        bail!("history_window must be at least 1");
    }
    if cfg.pacing.requests_per_minute == 0 {
        bail!("pacing.requests_per_minute must be at least 1");
    }
    if cfg.history_window > MAX_HISTORY_POINTS {
        bail!("history_window must be at most {MAX_HISTORY_POINTS}");
    }
    if cfg.fallback.history_len == 0 {
        bail!("fallback.history_len must be at least 1");
    }
    if cfg.fallback.history_len > MAX_HISTORY_POINTS {
        bail!("fallback.history_len must be at most {MAX_HISTORY_POINTS}");
    }

    let ind = &cfg.indicators;
    let windows = [
        ind.trend_fast,
        ind.trend_slow,
        ind.substitute_fast,
        ind.substitute_slow,
        ind.rsi_period,
        ind.atr_period,
    ];
    if windows.contains(&0) {
        bail!("indicator windows must be at least 1");
    }

    let p = &cfg.policy;
    if !(p.rsi_oversold < p.rsi_overbought && p.rsi_overbought <= p.rsi_overextended) {
        bail!(
            "RSI thresholds must satisfy oversold < overbought <= overextended (got {} / {} / {})",
            p.rsi_oversold,
            p.rsi_overbought,
            p.rsi_overextended
        );
    }
    check_policy(p)?;

    Ok(report)
}

fn require_positive(name: &str, value: f64) -> anyhow::Result<()> {
    if !(value.is_finite() && value > 0.0) {
        bail!("policy.{name} must be a positive number (got {value})");
    }
    Ok(())
}

fn require_score(name: &str, value: f64) -> anyhow::Result<()> {
    if !(0.0..=100.0).contains(&value) {
        bail!("policy.{name} must lie in [0, 100] (got {value})");
    }
    Ok(())
}

/// Scaling factors must keep scores in range, put the stop below the price
/// and the target above it, and never give riskier assets a bigger allocation.
fn check_policy(p: &RiskPolicy) -> anyhow::Result<()> {
    require_positive("annualization_periods", p.annualization_periods)?;
    if !(p.risk_scale.is_finite() && p.risk_scale >= 0.0) {
        bail!("policy.risk_scale must be non-negative (got {})", p.risk_scale);
    }
    require_score("risk_floor", p.risk_floor)?;
    require_score("neutral_risk_score", p.neutral_risk_score)?;

    require_positive("atr_stop_multiple", p.atr_stop_multiple)?;
    require_positive("atr_target_multiple", p.atr_target_multiple)?;
    require_positive("volatility_stop_multiple", p.volatility_stop_multiple)?;
    require_positive("volatility_reward_ratio", p.volatility_reward_ratio)?;
    require_positive("fixed_band_pct", p.fixed_band_pct)?;
    if p.fixed_band_pct > 100.0 {
        bail!("policy.fixed_band_pct must be at most 100 (got {})", p.fixed_band_pct);
    }

    let mut tiers = p.position_tiers.clone();
    tiers.sort_by(|a, b| b.above.total_cmp(&a.above));
    let steps = tiers
        .iter()
        .map(|t| (t.above, t.pct))
        .chain([(f64::NEG_INFINITY, p.base_position_pct)]);
    let mut ceiling = 0.0;
    for (above, pct) in steps {
        if above.is_nan() || !(pct.is_finite() && pct >= 0.0) {
            bail!("position tier above {above} has an invalid percentage {pct}");
        }
        if pct < ceiling {
            bail!("position tiers must not grow with risk: {pct}% at or below {above} is less than {ceiling}%");
        }
        ceiling = pct;
    }
    Ok(())
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<RiskEngineConfig> {
    let mut cfg: RiskEngineConfig = from_str(toml_str).context("failed to parse config TOML")?;
    let report = normalize_config(&mut cfg).context("normalize_config failed")?;
    debug!(?report, assets = cfg.assets.len(), "configuration loaded");
    Ok(cfg)
}

/// Read a configuration TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<RiskEngineConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::LevelMethod;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg, RiskEngineConfig::default());
        assert_eq!(cfg.assets.len(), 12);
        assert_eq!(cfg.snapshot_path, PathBuf::from("risk_data.json"));
        assert_eq!(cfg.pacing.requests_per_minute, 15);
    }

    #[test]
    fn normalizes_and_dedupes_assets() {
        let cfg = load_config_str(
            r#"
            [[assets]]
            symbol = " btc "
            reference_price = 60000.0

            [[assets]]
            symbol = "BTC"

            [[assets]]
            symbol = "matic"
            remote = " POL "
            "#,
        )
        .unwrap();

        let symbols: Vec<_> = cfg.assets.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTC", "MATIC"]);
        assert_eq!(cfg.assets[0].reference_price, Some(60000.0));
        assert_eq!(cfg.assets[1].remote_symbol(), "POL");
        assert_eq!(cfg.assets[0].remote_symbol(), "BTC");
    }

    #[test]
    fn report_counts_changes() {
        let mut cfg = RiskEngineConfig {
            assets: vec![AssetCfg::new("eth"), AssetCfg::new("ETH"), AssetCfg::new("SOL")],
            ..RiskEngineConfig::default()
        };
        let report = normalize_config(&mut cfg).unwrap();
        assert_eq!(
            report,
            NormalizationReport {
                symbols_renamed: 1,
                assets_deduped: 1
            }
        );
    }

    #[test]
    fn nested_tables_override_defaults() {
        let cfg = load_config_str(
            r#"
            lookback_days = 200

            [policy]
            level_method = "volatility"
            risk_floor = 15.0

            [garch]
            max_iterations = 50

            [fallback]
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(cfg.lookback_days, 200);
        assert_eq!(cfg.policy.level_method, LevelMethod::Volatility);
        assert_eq!(cfg.policy.risk_floor, 15.0);
        assert_eq!(cfg.policy.rsi_overbought, 70.0);
        assert_eq!(cfg.garch.max_iterations, 50);
        assert_eq!(cfg.garch.min_observations, 10);
        assert_eq!(cfg.fallback.seed, Some(42));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_config_str("lookback = 10").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn inverted_rsi_thresholds_are_rejected() {
        let err = load_config_str("[policy]\nrsi_oversold = 80.0").unwrap_err();
        assert!(format!("{err:#}").contains("RSI thresholds"));
    }

    #[test]
    fn stops_and_bands_must_be_positive() {
        for line in [
            "atr_stop_multiple = -2.0",
            "atr_target_multiple = 0.0",
            "volatility_stop_multiple = -1.0",
            "volatility_reward_ratio = -1.5",
            "fixed_band_pct = -5.0",
            "fixed_band_pct = 150.0",
            "annualization_periods = 0.0",
        ] {
            let err = load_config_str(&format!("[policy]\n{line}")).unwrap_err();
            let field = line.split(' ').next().unwrap();
            assert!(format!("{err:#}").contains(field), "{line}: {err:#}");
        }
    }

    #[test]
    fn scores_outside_range_are_rejected() {
        for line in [
            "risk_scale = -1.0",
            "risk_floor = 120.0",
            "neutral_risk_score = -5.0",
        ] {
            let err = load_config_str(&format!("[policy]\n{line}")).unwrap_err();
            let field = line.split(' ').next().unwrap();
            assert!(format!("{err:#}").contains(field), "{line}: {err:#}");
        }
    }

    #[test]
    fn tiers_that_reward_risk_are_rejected() {
        let err = load_config_str(
            "[policy]\nposition_tiers = [{ above = 80.0, pct = 50.0 }, { above = 10.0, pct = 1.0 }]",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must not grow with risk"));

        // the base allocation counts as the lowest tier
        let err = load_config_str(
            "[policy]\nbase_position_pct = 1.0\nposition_tiers = [{ above = 50.0, pct = 5.0 }]",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must not grow with risk"));

        let err = load_config_str("[policy]\nposition_tiers = [{ above = 50.0, pct = -1.0 }]")
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid percentage"));
    }

    #[test]
    fn tiers_in_any_order_are_accepted() {
        let cfg = load_config_str(
            "[policy]\nposition_tiers = [{ above = 40.0, pct = 10.0 }, { above = 80.0, pct = 2.0 }]",
        )
        .unwrap();
        assert_eq!(cfg.policy.position_tiers.len(), 2);
    }

    #[test]
    fn oversized_histories_are_rejected() {
        let err = load_config_str("[fallback]\nhistory_len = 100000000").unwrap_err();
        assert!(format!("{err:#}").contains("fallback.history_len must be at most"));

        let err = load_config_str("history_window = 100000000").unwrap_err();
        assert!(format!("{err:#}").contains("history_window must be at most"));

        let cfg = load_config_str(&format!("[fallback]\nhistory_len = {MAX_HISTORY_POINTS}")).unwrap();
        assert_eq!(cfg.fallback.history_len, MAX_HISTORY_POINTS);
    }

    #[test]
    fn blank_symbol_is_rejected() {
        let err = load_config_str("[[assets]]\nsymbol = \"  \"").unwrap_err();
        assert!(format!("{err:#}").contains("cannot be empty"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = RiskEngineConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(load_config_str(&text).unwrap(), cfg);
    }

    #[test]
    fn sample_config_parses() {
        let cfg = load_config_str(include_str!("../../configs/risk_engine.toml")).unwrap();
        assert_eq!(cfg.assets.len(), 12);
        assert_eq!(cfg.assets[10].remote_symbol(), "POL");
        assert_eq!(cfg.policy, RiskPolicy::default());
        assert_eq!(cfg.garch, GarchSettings::default());
    }

    #[test]
    fn unlisted_symbol_gets_ad_hoc_asset() {
        let cfg = RiskEngineConfig::default();
        assert_eq!(cfg.asset("xyz"), AssetCfg::new("XYZ"));
        assert_eq!(cfg.asset("btc").symbol, "BTC");
    }
}
