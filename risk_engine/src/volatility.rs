//! GARCH(1,1) conditional volatility.
//!
//! The model is `σ²[t] = ω + α·r²[t-1] + β·σ²[t-1]` on zero-mean percent
//! returns. Parameters are estimated by Gaussian quasi-maximum likelihood with
//! variance targeting: `ω = s²·(1 − α − β)` where `s²` is the sample mean square,
//! so the optimiser only searches `(α, β)`. The search runs in an unconstrained
//! space mapped onto `α ≥ 0, β ≥ 0, α + β < MAX_PERSISTENCE`, which keeps every
//! candidate stationary.
//!
//! The optimiser is a plain Nelder–Mead simplex started from a fixed point, so
//! identical returns always produce an identical forecast.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on `α + β`.
pub const MAX_PERSISTENCE: f64 = 0.999;

const START_ALPHA: f64 = 0.1;
const START_BETA: f64 = 0.85;
const SIMPLEX_STEP: f64 = 0.5;
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GarchSettings {
    /// Fewer returns than this is a fit failure.
    pub min_observations: usize,
    /// Only the most recent returns are used for the fit.
    pub max_observations: usize,
    pub max_iterations: usize,
    /// Relative spread of simplex objective values that counts as converged.
    pub tolerance: f64,
    /// Mean square returns below this are treated as a flat series.
    pub degenerate_variance: f64,
}

impl Default for GarchSettings {
    fn default() -> Self {
        Self {
            min_observations: 10,
            max_observations: 365,
            max_iterations: 1000,
            tolerance: 1e-9,
            degenerate_variance: 1e-12,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelFitError {
    #[error("need at least {need} returns to fit GARCH(1,1), got {got}")]
    InsufficientObservations { got: usize, need: usize },

    #[error("return series contains non-finite values")]
    NonFiniteInput,

    /// Prices did not move; there is no variance to model.
    #[error("return series is degenerate (mean square {mean_square:e})")]
    DegenerateSeries { mean_square: f64 },

    #[error("GARCH(1,1) fit did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("GARCH(1,1) likelihood is not finite")]
    NonFiniteLikelihood,
}

/// Fitted GARCH(1,1) parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarchFit {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub observations: usize,
}

impl GarchFit {
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }
}

/// One-step-ahead conditional variance, in squared percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityForecast {
    pub conditional_variance: f64,
    /// Steps ahead, always 1.
    pub horizon: u32,
    /// `None` when the forecast did not come from a fit (flat series).
    pub fit: Option<GarchFit>,
}

impl VolatilityForecast {
    /// Forecast for a series whose price never moved.
    pub fn zero() -> Self {
        Self {
            conditional_variance: 0.0,
            horizon: 1,
            fit: None,
        }
    }

    pub fn daily_volatility_pct(&self) -> f64 {
        self.conditional_variance.max(0.0).sqrt()
    }

    pub fn annualized_volatility_pct(&self, periods_per_year: f64) -> f64 {
        self.daily_volatility_pct() * periods_per_year.max(0.0).sqrt()
    }
}

/// Fits GARCH(1,1) to the most recent `max_observations` returns and
/// forecasts the next period's variance.
pub fn forecast(
    returns: &[f64],
    settings: &GarchSettings,
) -> Result<VolatilityForecast, ModelFitError> {
    let start = returns.len().saturating_sub(settings.max_observations.max(1));
    let window = &returns[start..];

    let fit = fit_garch(window, settings)?;
    let target = mean_square(window);
    let (_, next) = filter(window, fit.alpha, fit.beta, target);
    if !next.is_finite() {
        return Err(ModelFitError::NonFiniteLikelihood);
    }

    Ok(VolatilityForecast {
        conditional_variance: next.max(0.0),
        horizon: 1,
        fit: Some(fit),
    })
}

/// Estimates `(ω, α, β)` on the whole of `returns`.
pub fn fit_garch(returns: &[f64], settings: &GarchSettings) -> Result<GarchFit, ModelFitError> {
    let need = settings.min_observations.max(2);
    if returns.len() < need {
        return Err(ModelFitError::InsufficientObservations {
            got: returns.len(),
            need,
        });
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(ModelFitError::NonFiniteInput);
    }

    let target = mean_square(returns);
    if target < settings.degenerate_variance {
        return Err(ModelFitError::DegenerateSeries {
            mean_square: target,
        });
    }

    let objective = |x: [f64; 2]| {
        let (alpha, beta) = to_params(x);
        let (nll, _) = filter(returns, alpha, beta, target);
        if nll.is_finite() { nll } else { f64::INFINITY }
    };

    let optimum = nelder_mead(
        objective,
        from_params(START_ALPHA, START_BETA),
        settings.max_iterations,
        settings.tolerance,
    )?;
    let (alpha, beta) = to_params(optimum.point);
    let n = returns.len() as f64;

    Ok(GarchFit {
        omega: target * (1.0 - alpha - beta),
        alpha,
        beta,
        log_likelihood: -(optimum.value + 0.5 * n * (2.0 * std::f64::consts::PI).ln()),
        iterations: optimum.iterations,
        observations: returns.len(),
    })
}

fn mean_square(returns: &[f64]) -> f64 {
    returns.iter().map(|r| r * r).sum::<f64>() / returns.len() as f64
}

/// Runs the variance recursion from `σ²[0] = target`.
///
/// Returns the Gaussian negative log-likelihood (without the `ln 2π` constant)
/// and the variance for the period after the last return.
fn filter(returns: &[f64], alpha: f64, beta: f64, target: f64) -> (f64, f64) {
    let omega = target * (1.0 - alpha - beta);
    let mut variance = target;
    let mut nll = 0.0;
    for &r in returns {
        nll += 0.5 * (variance.ln() + r * r / variance);
        variance = (omega + alpha * r * r + beta * variance).max(VARIANCE_FLOOR);
    }
    (nll, variance)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// `x[0]` drives persistence, `x[1]` splits it between `α` and `β`.
fn to_params(x: [f64; 2]) -> (f64, f64) {
    let persistence = MAX_PERSISTENCE * sigmoid(x[0]);
    let share = sigmoid(x[1]);
    (persistence * share, persistence * (1.0 - share))
}

fn from_params(alpha: f64, beta: f64) -> [f64; 2] {
    let persistence = alpha + beta;
    [logit(persistence / MAX_PERSISTENCE), logit(alpha / persistence)]
}

#[derive(Debug, Clone, Copy)]
struct Optimum {
    point: [f64; 2],
    value: f64,
    iterations: usize,
}

fn nelder_mead<F>(
    f: F,
    start: [f64; 2],
    max_iterations: usize,
    tolerance: f64,
) -> Result<Optimum, ModelFitError>
where
    F: Fn([f64; 2]) -> f64,
{
    let first = f(start);
    if !first.is_finite() {
        return Err(ModelFitError::NonFiniteLikelihood);
    }

    let mut simplex: Vec<([f64; 2], f64)> = vec![(start, first)];
    for axis in 0..2 {
        let mut p = start;
        p[axis] += SIMPLEX_STEP;
        simplex.push((p, f(p)));
    }

    let lerp = |a: [f64; 2], b: [f64; 2], t: f64| [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])];

    for iteration in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, best_value) = simplex[0];
        let second_value = simplex[1].1;
        let (worst, worst_value) = simplex[2];

        if worst_value - best_value <= tolerance * (best_value.abs() + tolerance) {
            return Ok(Optimum {
                point: best,
                value: best_value,
                iterations: iteration,
            });
        }

        let centroid = lerp(best, simplex[1].0, 0.5);
        let reflected = lerp(centroid, worst, -1.0);
        let reflected_value = f(reflected);

        if reflected_value < best_value {
            let expanded = lerp(centroid, worst, -2.0);
            let expanded_value = f(expanded);
            simplex[2] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }
        if reflected_value < second_value {
            simplex[2] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value, accept) = if reflected_value < worst_value {
            let c = lerp(centroid, reflected, 0.5);
            let v = f(c);
            (c, v, v <= reflected_value)
        } else {
            let c = lerp(centroid, worst, 0.5);
            let v = f(c);
            (c, v, v < worst_value)
        };
        if accept {
            simplex[2] = (contracted, contracted_value);
            continue;
        }

        for vertex in simplex.iter_mut().skip(1) {
            let p = lerp(best, vertex.0, 0.5);
            *vertex = (p, f(p));
        }
    }

    Err(ModelFitError::NonConvergence {
        iterations: max_iterations,
    })
}
