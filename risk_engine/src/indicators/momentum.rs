use super::IndicatorUnavailable;

/// RSI when nothing moved, or when it cannot be computed.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Wilder's relative strength index over `period` price changes.
///
/// Seeds the average gain and loss with a simple mean of the first `period`
/// changes, then applies Wilder smoothing to the rest. Always in `[0, 100]`.
pub fn rsi(closes: &[f64], period: usize) -> Result<f64, IndicatorUnavailable> {
    if period == 0 || closes.len() < period + 1 {
        return Err(IndicatorUnavailable {
            indicator: "RSI",
            need: period + 1,
            got: closes.len(),
        });
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;
    let (seed, rest) = changes.split_at(period);
    let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for c in rest {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
    }

    Ok(match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => NEUTRAL_RSI,
        (_, false) => 100.0,
        _ => {
            let rs = avg_gain / avg_loss;
            (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
        }
    })
}
