use market_data_ingestor::models::bar::Bar;

use super::IndicatorUnavailable;

/// True range of every bar after the first.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect()
}

/// Average true range: simple mean of the last `period` true ranges.
pub fn atr(bars: &[Bar], period: usize) -> Result<f64, IndicatorUnavailable> {
    if period == 0 || bars.len() < period + 1 {
        return Err(IndicatorUnavailable {
            indicator: "ATR",
            need: period + 1,
            got: bars.len(),
        });
    }
    let ranges = true_ranges(bars);
    let tail = &ranges[ranges.len() - period..];
    Ok(tail.iter().sum::<f64>() / period as f64)
}
