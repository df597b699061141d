//! Risk scoring and signal fusion.
//!
//! Everything here is a pure function of the forecast, the indicator set and
//! the [`RiskPolicy`]; the same inputs always produce the same [`Assessment`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    indicators::{IndicatorSet, Trend},
    levels::{LevelInputs, LevelMethod, resolve_levels},
    volatility::VolatilityForecast,
};

/// Trading signal for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBuy,
    Watch,
    SellPressure,
    DipOpportunity,
    Neutral,
    Overextended,
    /// No usable market data; the report is a fallback.
    NoData,
}

impl Signal {
    /// Hex colour hint for dashboards.
    pub fn color(self) -> &'static str {
        match self {
            Signal::StrongBuy => "#27ae60",
            Signal::Watch => "#f39c12",
            Signal::SellPressure => "#e74c3c",
            Signal::DipOpportunity => "#2980b9",
            Signal::Neutral => "#95a5a6",
            Signal::Overextended => "#e67e22",
            Signal::NoData => "#7f8c8d",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::StrongBuy => "STRONG_BUY",
            Signal::Watch => "WATCH",
            Signal::SellPressure => "SELL_PRESSURE",
            Signal::DipOpportunity => "DIP_OPPORTUNITY",
            Signal::Neutral => "NEUTRAL",
            Signal::Overextended => "OVEREXTENDED",
            Signal::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allocation step: risk scores strictly above `above` get `pct` percent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PositionTierRule {
    pub above: f64,
    pub pct: f64,
}

/// Scoring and signal thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskPolicy {
    /// Trading periods per year used to annualize daily volatility.
    pub annualization_periods: f64,
    /// Risk score per point of annualized volatility percent.
    pub risk_scale: f64,
    pub risk_floor: f64,
    /// Risk score given to fallback reports.
    pub neutral_risk_score: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_overextended: f64,
    /// Checked highest `above` first; see [`position_size_pct`].
    pub position_tiers: Vec<PositionTierRule>,
    pub base_position_pct: f64,
    pub level_method: LevelMethod,
    pub atr_stop_multiple: f64,
    pub atr_target_multiple: f64,
    pub volatility_stop_multiple: f64,
    pub volatility_reward_ratio: f64,
    pub fixed_band_pct: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            annualization_periods: 365.0,
            risk_scale: 1.0,
            risk_floor: 0.0,
            neutral_risk_score: 50.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_overextended: 75.0,
            position_tiers: vec![
                PositionTierRule { above: 80.0, pct: 2.0 },
                PositionTierRule { above: 60.0, pct: 5.0 },
                PositionTierRule { above: 40.0, pct: 10.0 },
            ],
            base_position_pct: 15.0,
            level_method: LevelMethod::Atr,
            atr_stop_multiple: 2.0,
            atr_target_multiple: 3.0,
            volatility_stop_multiple: 2.0,
            volatility_reward_ratio: 1.5,
            fixed_band_pct: 5.0,
        }
    }
}

/// Annualized volatility percent times `risk_scale`, clipped to `[risk_floor, 100]`.
pub fn risk_score(forecast: &VolatilityForecast, policy: &RiskPolicy) -> f64 {
    let raw = forecast.annualized_volatility_pct(policy.annualization_periods) * policy.risk_scale;
    clamp_score(raw, policy.risk_floor)
}

/// Clips into `[floor, 100]`; NaN lands on the floor.
pub fn clamp_score(raw: f64, floor: f64) -> f64 {
    let floor = floor.clamp(0.0, 100.0);
    if raw.is_nan() {
        return floor;
    }
    raw.clamp(floor, 100.0)
}

/// First match wins, in this order: STRONG_BUY, SELL_PRESSURE,
/// DIP_OPPORTUNITY, OVEREXTENDED, then WATCH for a bullish trend and NEUTRAL
/// for anything else.
pub fn classify_signal(trend: Trend, rsi: f64, policy: &RiskPolicy) -> Signal {
    if trend == Trend::Bullish && rsi < policy.rsi_overbought {
        Signal::StrongBuy
    } else if trend == Trend::Bearish && rsi > policy.rsi_oversold {
        Signal::SellPressure
    } else if rsi < policy.rsi_oversold {
        Signal::DipOpportunity
    } else if rsi > policy.rsi_overextended {
        Signal::Overextended
    } else if trend == Trend::Bullish {
        Signal::Watch
    } else {
        Signal::Neutral
    }
}

/// Allocation percent for a risk score. Non-increasing in `risk` as long as
/// higher thresholds carry smaller percentages.
pub fn position_size_pct(risk: f64, policy: &RiskPolicy) -> f64 {
    let mut tiers = policy.position_tiers.clone();
    tiers.sort_by(|a, b| b.above.total_cmp(&a.above));
    tiers
        .iter()
        .find(|t| risk > t.above)
        .map_or(policy.base_position_pct, |t| t.pct)
}

/// Display label for an allocation percent, e.g. `"2%"` or `"2.5%"`.
pub fn tier_label(pct: f64) -> String {
    format!("{pct}%")
}

/// Inputs for one live assessment.
#[derive(Debug, Clone, Copy)]
pub struct SignalInputs<'a> {
    pub price: f64,
    pub forecast: &'a VolatilityForecast,
    pub indicators: &'a IndicatorSet,
}

/// Everything the synthesizer decides for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub risk_score: f64,
    pub trend: Trend,
    pub signal: Signal,
    pub rsi: f64,
    pub volatility_pct: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size_pct: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub forecast_low: f64,
    pub forecast_high: f64,
}

pub fn synthesize(inputs: SignalInputs<'_>, policy: &RiskPolicy) -> Assessment {
    let SignalInputs {
        price,
        forecast,
        indicators,
    } = inputs;
    let daily_vol = forecast.daily_volatility_pct();
    let risk = risk_score(forecast, policy);
    let rsi = indicators.rsi_or_neutral();
    let levels = resolve_levels(
        &LevelInputs {
            price,
            atr: indicators.atr,
            daily_volatility_pct: daily_vol,
        },
        policy,
    );

    Assessment {
        risk_score: risk,
        trend: indicators.trend,
        signal: classify_signal(indicators.trend, rsi, policy),
        rsi,
        volatility_pct: daily_vol,
        stop_loss: levels.stop_loss,
        take_profit: levels.take_profit,
        position_size_pct: position_size_pct(risk, policy),
        support: indicators.support(),
        resistance: indicators.resistance(),
        forecast_low: (price * (1.0 - daily_vol / 100.0)).max(0.0),
        forecast_high: price * (1.0 + daily_vol / 100.0),
    }
}
