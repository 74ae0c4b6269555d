use crate::domain::market::{Metrics, Period, PriceSeries};
use statrs::statistics::Statistics;

pub const METRICS_PERIOD: Period = Period::days(60);

const VOLATILITY_WINDOW: usize = 30;
const VOLUME_WINDOW: usize = 60;

/// Simple day-over-day returns. The undefined first value is not emitted and
/// non-finite results (a zero previous close) are skipped.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

pub fn metrics_from_series(symbol: &str, series: &PriceSeries) -> Metrics {
    let closes: Vec<f64> = series
        .closes()
        .into_iter()
        .filter(|c| c.is_finite())
        .collect();
    if closes.len() < 2 {
        return Metrics::missing(symbol);
    }

    let returns = daily_returns(&closes);
    let volumes = series.volumes();

    // Sample std-dev is NaN for a single return; that normalizes to missing.
    let volatility = if returns.is_empty() {
        None
    } else {
        finite(tail(&returns, VOLATILITY_WINDOW).std_dev())
    };
    let mean_return = if returns.is_empty() {
        None
    } else {
        finite(returns.as_slice().mean())
    };
    let volume_avg = if volumes.is_empty() {
        None
    } else {
        finite(tail(&volumes, VOLUME_WINDOW).mean())
    };

    Metrics {
        symbol: symbol.to_string(),
        returns: mean_return,
        volatility,
        volume_avg,
    }
}
