use crate::domain::market::{Metrics, TickerInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sube,
    Baja,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Comprar,
    Vender,
    Mantener,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub direction: Direction,
    pub forecast: Option<f64>,
    #[serde(rename = "lastClose")]
    pub last_close: Option<f64>,
    pub confidence: Option<f64>,
    pub action: Action,
    pub external_reason: String,
    pub internal_reason: String,
    pub metrics: Metrics,
    pub info: TickerInfo,
    pub sentiment: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterGroup {
    #[serde(rename = "Safe Haven")]
    SafeHaven,
    #[serde(rename = "Aggressive Growth")]
    AggressiveGrowth,
    #[serde(rename = "Speculative")]
    Speculative,
    #[serde(rename = "Mixed")]
    Mixed,
}

impl fmt::Display for ClusterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterGroup::SafeHaven => "Safe Haven",
            ClusterGroup::AggressiveGrowth => "Aggressive Growth",
            ClusterGroup::Speculative => "Speculative",
            ClusterGroup::Mixed => "Mixed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub symbol: String,
    pub cluster: usize,
    pub group: ClusterGroup,
    pub returns: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub symbol: String,
    pub features: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub target: String,
    pub symbol: String,
    pub distance: f64,
    /// Raw (un-normalized) features of the neighbor.
    pub features: BTreeMap<String, f64>,
    pub data: Recommendation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_labels_and_calls() {
        assert_eq!(serde_json::to_value(Direction::Sube).unwrap(), json!("Sube"));
        assert_eq!(serde_json::to_value(Action::Mantener).unwrap(), json!("Mantener"));
        assert_eq!(
            serde_json::to_value(ClusterGroup::AggressiveGrowth).unwrap(),
            json!("Aggressive Growth")
        );
        assert_eq!(ClusterGroup::SafeHaven.to_string(), "Safe Haven");
    }
}
