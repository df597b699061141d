//! Stop-loss and take-profit placement.

use serde::{Deserialize, Serialize};

use crate::signal::RiskPolicy;

/// Which [`LevelStrategy`] places live stop-loss/take-profit levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelMethod {
    /// Multiples of the average true range.
    #[default]
    Atr,
    /// A margin proportional to the forecast daily volatility.
    Volatility,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// What a strategy may size its levels from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInputs {
    pub price: f64,
    pub atr: Option<f64>,
    pub daily_volatility_pct: f64,
}

pub trait LevelStrategy {
    /// `None` when the strategy's input is missing or zero.
    fn levels(&self, inputs: &LevelInputs) -> Option<Levels>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtrLevels {
    pub stop_multiple: f64,
    pub target_multiple: f64,
}

impl LevelStrategy for AtrLevels {
    fn levels(&self, inputs: &LevelInputs) -> Option<Levels> {
        let atr = inputs.atr.filter(|a| a.is_finite() && *a > 0.0)?;
        Some(Levels {
            stop_loss: inputs.price - self.stop_multiple * atr,
            take_profit: inputs.price + self.target_multiple * atr,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityLevels {
    pub stop_multiple: f64,
    /// Take-profit distance as a multiple of the stop distance.
    pub reward_ratio: f64,
}

impl LevelStrategy for VolatilityLevels {
    fn levels(&self, inputs: &LevelInputs) -> Option<Levels> {
        let margin = inputs.price * inputs.daily_volatility_pct / 100.0 * self.stop_multiple;
        if !margin.is_finite() || margin <= 0.0 {
            return None;
        }
        Some(Levels {
            stop_loss: inputs.price - margin,
            take_profit: inputs.price + margin * self.reward_ratio,
        })
    }
}

/// Symmetric percentage band around the price. Never declines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBand {
    pub pct: f64,
}

impl FixedBand {
    pub fn band(&self, price: f64) -> Levels {
        let width = self.pct / 100.0;
        Levels {
            stop_loss: price * (1.0 - width),
            take_profit: price * (1.0 + width),
        }
    }
}

impl LevelStrategy for FixedBand {
    fn levels(&self, inputs: &LevelInputs) -> Option<Levels> {
        Some(self.band(inputs.price))
    }
}

pub fn strategy_for(policy: &RiskPolicy) -> Box<dyn LevelStrategy> {
    match policy.level_method {
        LevelMethod::Atr => Box::new(AtrLevels {
            stop_multiple: policy.atr_stop_multiple,
            target_multiple: policy.atr_target_multiple,
        }),
        LevelMethod::Volatility => Box::new(VolatilityLevels {
            stop_multiple: policy.volatility_stop_multiple,
            reward_ratio: policy.volatility_reward_ratio,
        }),
    }
}

/// Levels from the configured strategy, or the fixed band when it declines.
/// The stop never goes below zero.
pub fn resolve_levels(inputs: &LevelInputs, policy: &RiskPolicy) -> Levels {
    let band = FixedBand {
        pct: policy.fixed_band_pct,
    };
    let levels = strategy_for(policy)
        .levels(inputs)
        .unwrap_or_else(|| band.band(inputs.price));
    Levels {
        stop_loss: levels.stop_loss.max(0.0),
        ..levels
    }
}
