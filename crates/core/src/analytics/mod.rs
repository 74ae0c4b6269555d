pub mod clustering;
pub mod forecast;
pub mod metrics;
pub mod recommend;
pub mod sentiment;
pub mod similarity;

use crate::config::EngineKind;
use clustering::{Clusterer, LloydKMeans, NalgebraKMeans};
use forecast::{ClosedFormOls, NalgebraOls, TrendRegressor};
use sentiment::{LexiconScorer, SentimentScorer, VaderScorer};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Engines {
    pub clusterer: Arc<dyn Clusterer>,
    pub regressor: Arc<dyn TrendRegressor>,
    pub sentiment: Arc<dyn SentimentScorer>,
}

impl Engines {
    pub fn for_kind(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Library => Self::library(),
            EngineKind::Fallback => Self::fallback(),
        }
    }

    pub fn library() -> Self {
        Self {
            clusterer: Arc::new(NalgebraKMeans),
            regressor: Arc::new(NalgebraOls),
            sentiment: Arc::new(VaderScorer::new()),
        }
    }

    pub fn fallback() -> Self {
        Self {
            clusterer: Arc::new(LloydKMeans),
            regressor: Arc::new(ClosedFormOls),
            sentiment: Arc::new(LexiconScorer),
        }
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("clusterer", &self.clusterer.name())
            .field("regressor", &self.regressor.name())
            .field("sentiment", &self.sentiment.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_select_matching_implementations() {
        let lib = Engines::for_kind(EngineKind::Library);
        assert_eq!(lib.clusterer.name(), NalgebraKMeans.name());
        assert_eq!(lib.regressor.name(), "nalgebra_ols");
        assert_eq!(lib.sentiment.name(), "vader");

        let fb = Engines::for_kind(EngineKind::Fallback);
        assert_eq!(fb.clusterer.name(), LloydKMeans.name());
        assert_eq!(fb.regressor.name(), "closed_form_ols");
        assert_eq!(fb.sentiment.name(), "lexicon");
    }
}
