use crate::domain::market::{Metrics, TickerInfo};
use crate::domain::recommendation::{Action, Direction, Recommendation};

pub const ATTRACTIVE_VALUATION: &str = "Attractive valuation on low multiples";
pub const DEMANDING_VALUATION: &str = "Demanding valuation, needs catalysts";
pub const HIGH_BETA_RISK: &str = "Elevated risk from high beta";
pub const DEFENSIVE_PROFILE: &str = "Defensive profile from low beta";
pub const MIXED_PROFILE: &str = "Mixed profile on internal metrics";

#[derive(Debug, Clone)]
pub struct Signals {
    pub symbol: String,
    pub info: TickerInfo,
    pub last_close: Option<f64>,
    pub forecast: Option<f64>,
    pub metrics: Metrics,
    pub sentiment: Option<f64>,
    pub external_reason: String,
}

pub fn direction(change: Option<f64>) -> Direction {
    match change {
        Some(c) if c > 0.0 => Direction::Sube,
        Some(c) if c < 0.0 => Direction::Baja,
        _ => Direction::Neutral,
    }
}

/// Valuation rules first, then beta; first applicable wins.
pub fn internal_reason(trailing_pe: Option<f64>, beta: Option<f64>) -> &'static str {
    match (trailing_pe, beta) {
        (Some(pe), _) if pe <= 15.0 => ATTRACTIVE_VALUATION,
        (Some(pe), _) if pe >= 30.0 => DEMANDING_VALUATION,
        (_, Some(b)) if b >= 1.2 => HIGH_BETA_RISK,
        (_, Some(b)) if b <= 0.8 => DEFENSIVE_PROFILE,
        _ => MIXED_PROFILE,
    }
}

pub fn confidence(change: Option<f64>, last_close: Option<f64>, sentiment: Option<f64>) -> Option<f64> {
    let (change, last) = (change?, last_close?);
    let base = change.abs() / last.max(1e-6);
    let s = sentiment.map(f64::abs).unwrap_or(0.0);
    Some((base * 2.0 + s * 0.5).min(1.0)).filter(|c| c.is_finite())
}

pub fn action(direction: Direction, sentiment: Option<f64>) -> Action {
    match (direction, sentiment) {
        (Direction::Sube, Some(s)) if s > 0.0 => Action::Comprar,
        (Direction::Baja, Some(s)) if s < 0.0 => Action::Vender,
        _ => Action::Mantener,
    }
}

pub fn synthesize(signals: Signals) -> Recommendation {
    let change = match (signals.forecast, signals.last_close) {
        (Some(f), Some(l)) => Some(f - l),
        _ => None,
    };
    let direction = direction(change);

    Recommendation {
        internal_reason: internal_reason(signals.info.trailing_pe, signals.info.beta).to_string(),
        confidence: confidence(change, signals.last_close, signals.sentiment),
        action: action(direction, signals.sentiment),
        direction,
        symbol: signals.symbol,
        forecast: signals.forecast,
        last_close: signals.last_close,
        external_reason: signals.external_reason,
        metrics: signals.metrics,
        info: signals.info,
        sentiment: signals.sentiment,
    }
}
