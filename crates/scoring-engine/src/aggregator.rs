use analysis_core::{AggregationWeights, AnalysisError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateScore {
    pub overall: f64,
    /// Only one of the two sub-scores was available.
    pub partial_coverage: bool,
}

/// Blends the technical and fundamental sub-scores.
pub struct ScoreAggregator {
    weights: AggregationWeights,
}

impl ScoreAggregator {
    pub fn new(weights: AggregationWeights) -> Self {
        Self { weights }
    }

    /// A lone sub-score is passed through unchanged; it is never blended
    /// with an assumed neutral counterpart.
    pub fn combine(&self, technical: Option<f64>, fundamental: Option<f64>) -> Result<AggregateScore, AnalysisError> {
        match (technical, fundamental) {
            (Some(t), Some(f)) => Ok(AggregateScore {
                overall: (self.weights.technical * t + self.weights.fundamental * f).clamp(0.0, 100.0),
                partial_coverage: false,
            }),
            (Some(score), None) | (None, Some(score)) => Ok(AggregateScore {
                overall: score,
                partial_coverage: true,
            }),
            (None, None) => Err(AnalysisError::AggregationError(
                "neither a technical nor a fundamental score is available".to_string(),
            )),
        }
    }
}
