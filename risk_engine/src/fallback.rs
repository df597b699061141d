//! Schema-complete placeholder reports for assets the live path could not analyse.
//!
//! Nothing in here fails: bad settings are sanitised and the reference price
//! always resolves to something positive.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_HISTORY_POINTS,
    indicators::Trend,
    levels::FixedBand,
    report::{AssetReport, DataQuality},
    signal::{RiskPolicy, Signal, clamp_score, position_size_pct, tier_label},
};

const LAST_RESORT_PRICE: f64 = 1.0;
const DEFAULT_STEP_PCT: f64 = 3.0;
const MAX_STEP_PCT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackSettings {
    /// Points in the synthetic price history.
    pub history_len: usize,
    /// Largest multiplicative move between consecutive points, percent.
    pub max_step_pct: f64,
    /// Fixes the generator for reproducible output.
    pub seed: Option<u64>,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            history_len: 30,
            max_step_pct: DEFAULT_STEP_PCT,
            seed: None,
        }
    }
}

/// First usable candidate, or `1.0`. Candidates must be finite and positive.
pub fn resolve_reference_price(candidates: impl IntoIterator<Item = Option<f64>>) -> f64 {
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(LAST_RESORT_PRICE)
}

/// Bounded random walk of `len` points that ends exactly at `reference`.
///
/// Walks backwards from the reference, so every point stays strictly positive.
pub fn synthetic_history<R: Rng>(
    reference: f64,
    len: usize,
    max_step_pct: f64,
    rng: &mut R,
) -> Vec<f64> {
    let step = if max_step_pct.is_finite() {
        max_step_pct.clamp(0.0, MAX_STEP_PCT) / 100.0
    } else {
        DEFAULT_STEP_PCT / 100.0
    };
    let mut prices = Vec::with_capacity(len);
    let mut price = reference;
    for _ in 0..len {
        prices.push(price);
        price /= 1.0 + rng.random_range(-step..=step);
    }
    prices.reverse();
    prices
}

/// `len` ISO dates, one per day, ending at `end`.
///
/// Days before the first representable date all read as that date.
pub fn date_labels(end: NaiveDate, len: usize) -> Vec<String> {
    (0..len)
        .rev()
        .map(|back| {
            i64::try_from(back)
                .ok()
                .and_then(Duration::try_days)
                .and_then(|d| end.checked_sub_signed(d))
                .unwrap_or(NaiveDate::MIN)
                .format("%Y-%m-%d")
                .to_string()
        })
        .collect()
}

/// Builds a DEGRADED_FALLBACK report around `reference`.
pub fn fallback_report<R: Rng>(
    reference: f64,
    as_of: NaiveDate,
    cause: &str,
    settings: &FallbackSettings,
    policy: &RiskPolicy,
    rng: &mut R,
) -> AssetReport {
    let price = resolve_reference_price([Some(reference)]);
    let len = settings.history_len.clamp(1, MAX_HISTORY_POINTS);
    let risk = clamp_score(policy.neutral_risk_score, policy.risk_floor);
    let pct = position_size_pct(risk, policy);
    let band = FixedBand {
        pct: policy.fixed_band_pct,
    }
    .band(price);

    AssetReport {
        price,
        daily_change_pct: 0.0,
        risk_score: risk,
        trend: Trend::Unknown,
        signal: Signal::NoData,
        signal_color: Signal::NoData.color().to_string(),
        rsi: None,
        volatility_pct: None,
        stop_loss: band.stop_loss.max(0.0),
        take_profit: band.take_profit,
        position_size_tier: tier_label(pct),
        position_size_pct: pct,
        support: None,
        resistance: None,
        forecast_low: None,
        forecast_high: None,
        history_prices: synthetic_history(price, len, settings.max_step_pct, rng),
        history_labels: date_labels(as_of, len),
        data_quality: DataQuality::DegradedFallback,
        note: Some(cause.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn reference_price_order() {
        assert_eq!(resolve_reference_price([Some(64000.0), Some(1.0)]), 64000.0);
        assert_eq!(resolve_reference_price([None, Some(2.5)]), 2.5);
        assert_eq!(resolve_reference_price([Some(f64::NAN), Some(-3.0), Some(7.0)]), 7.0);
        assert_eq!(resolve_reference_price([None, None]), 1.0);
    }

    #[test]
    fn fallback_report_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = fallback_report(
            200.0,
            day(),
            "provider request failed",
            &FallbackSettings::default(),
            &RiskPolicy::default(),
            &mut rng,
        );
        assert_eq!(r.data_quality, DataQuality::DegradedFallback);
        assert_eq!(r.signal, Signal::NoData);
        assert_eq!(r.trend, Trend::Unknown);
        assert_eq!(r.risk_score, 50.0);
        assert_eq!(r.position_size_tier, "10%");
        assert!((r.stop_loss - 190.0).abs() < 1e-9);
        assert!((r.take_profit - 210.0).abs() < 1e-9);
        assert_eq!(r.history_prices.len(), 30);
        assert_eq!(*r.history_prices.last().unwrap(), 200.0);
        assert_eq!(r.history_labels.first().unwrap(), "2025-06-01");
        assert_eq!(r.history_labels.last().unwrap(), "2025-06-30");
        assert_eq!(r.note.as_deref(), Some("provider request failed"));
    }

    #[test]
    fn same_seed_same_history() {
        let a = synthetic_history(10.0, 30, 3.0, &mut StdRng::seed_from_u64(1));
        let b = synthetic_history(10.0, 30, 3.0, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn broken_settings_are_sanitised() {
        let mut rng = StdRng::seed_from_u64(3);
        let settings = FallbackSettings {
            history_len: 0,
            max_step_pct: f64::NAN,
            seed: None,
        };
        let r = fallback_report(f64::INFINITY, day(), "x", &settings, &RiskPolicy::default(), &mut rng);
        assert_eq!(r.price, 1.0);
        assert_eq!(r.history_prices, vec![1.0]);
    }

    #[test]
    fn labels_stop_at_the_earliest_date() {
        let end = NaiveDate::MIN + Duration::days(2);
        let labels = date_labels(end, 5);
        let first = NaiveDate::MIN.format("%Y-%m-%d").to_string();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[..3], [first.clone(), first.clone(), first]);
        assert_eq!(labels[4], end.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn huge_history_len_is_capped() {
        let mut rng = StdRng::seed_from_u64(5);
        let settings = FallbackSettings {
            history_len: usize::MAX,
            ..FallbackSettings::default()
        };
        let r = fallback_report(3.0, day(), "x", &settings, &RiskPolicy::default(), &mut rng);
        assert_eq!(r.history_prices.len(), MAX_HISTORY_POINTS);
        assert_eq!(r.history_labels.len(), MAX_HISTORY_POINTS);
        assert_eq!(r.history_labels.last().unwrap(), "2025-06-30");
    }

    proptest! {
        #[test]
        fn history_is_positive_and_bounded(reference in 1e-6f64..1e6, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let h = synthetic_history(reference, 30, 3.0, &mut rng);
            prop_assert_eq!(h.len(), 30);
            prop_assert!(h.iter().all(|p| *p > 0.0 && p.is_finite()));
            for w in h.windows(2) {
                let step = w[1] / w[0] - 1.0;
                prop_assert!(step.abs() <= 0.0310);
            }
        }
    }
}
