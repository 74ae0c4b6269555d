use crate::domain::recommendation::{FeatureVector, Recommendation, SimilarityResult};
use crate::error::AnalyticsError;
use std::collections::BTreeMap;

pub const DEFAULT_NEIGHBORS: usize = 5;

const DEGENERATE_FILL: f64 = 0.5;

const FEATURES: [(&str, f64); 5] = [
    ("pe", 20.0),
    ("beta", 1.0),
    ("volatility", 0.02),
    ("recent_return", 0.0),
    ("sentiment", 0.0),
];

pub fn extract_features(reco: &Recommendation) -> FeatureVector {
    let sources = [
        reco.info.trailing_pe,
        reco.info.beta,
        reco.metrics.volatility,
        reco.metrics.returns,
        reco.sentiment,
    ];
    let features = FEATURES
        .iter()
        .zip(sources)
        .map(|((name, default), value)| {
            let v = value.filter(|v| v.is_finite()).unwrap_or(*default);
            (name.to_string(), v)
        })
        .collect();
    FeatureVector {
        symbol: reco.symbol.clone(),
        features,
    }
}

fn min_max_scale(value: f64, min: f64, max: f64) -> Result<f64, AnalyticsError> {
    let span = max - min;
    if span == 0.0 {
        return Err(AnalyticsError::DegenerateInput(format!(
            "no spread (all values = {min})"
        )));
    }
    Ok((value - min) / span)
}

/// Rescales each feature to `[0, 1]` across the batch. A feature where every
/// member has the same value maps to 0.5 for all of them.
pub fn normalize_vectors(vectors: &[FeatureVector]) -> Vec<FeatureVector> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let mut bounds: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for name in first.features.keys() {
        let (min, max) = vectors
            .iter()
            .filter_map(|v| v.features.get(name))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        bounds.insert(name.as_str(), (min, max));
    }

    vectors
        .iter()
        .map(|v| {
            let features = bounds
                .iter()
                .map(|(&name, &(min, max))| {
                    let raw = v.features.get(name).copied().unwrap_or(min);
                    let scaled = min_max_scale(raw, min, max).unwrap_or(DEGENERATE_FILL);
                    (name.to_string(), scaled)
                })
                .collect();
            FeatureVector {
                symbol: v.symbol.clone(),
                features,
            }
        })
        .collect()
}

pub fn manhattan_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.features
        .iter()
        .map(|(name, x)| (x - b.features.get(name).copied().unwrap_or(0.0)).abs())
        .sum()
}

pub fn find_similar(target: &str, pool: &[Recommendation], k: usize) -> Vec<SimilarityResult> {
    let Some(target_idx) = pool.iter().position(|r| r.symbol == target) else {
        tracing::debug!(
            symbol = target,
            error = %AnalyticsError::NotFound(target.to_string()),
            "similarity target missing from pool"
        );
        return Vec::new();
    };

    let raw: Vec<FeatureVector> = pool.iter().map(extract_features).collect();
    let normalized = normalize_vectors(&raw);
    let anchor = &normalized[target_idx];

    let mut neighbors: Vec<SimilarityResult> = pool
        .iter()
        .zip(raw)
        .zip(&normalized)
        .filter(|((reco, _), _)| reco.symbol != target)
        .map(|((reco, raw), norm)| SimilarityResult {
            target: target.to_string(),
            symbol: reco.symbol.clone(),
            distance: manhattan_distance(anchor, norm),
            features: raw.features,
            data: reco.clone(),
        })
        .collect();

    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    neighbors.truncate(k);
    neighbors
}
