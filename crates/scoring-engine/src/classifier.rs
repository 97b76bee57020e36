use analysis_core::{AnalysisError, RecommendationTier, TierThresholds};

/// Maps an overall score to a tier. Lower bounds are inclusive.
pub struct RecommendationClassifier {
    thresholds: TierThresholds,
}

impl RecommendationClassifier {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, score: f64) -> Result<RecommendationTier, AnalysisError> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            tracing::error!("overall score {} escaped [0, 100]", score);
            return Err(AnalysisError::ClassificationInconsistency(score));
        }

        let t = &self.thresholds;
        let tier = if score >= t.strong_buy {
            RecommendationTier::StrongBuy
        } else if score >= t.buy {
            RecommendationTier::Buy
        } else if score >= t.hold {
            RecommendationTier::Hold
        } else if score >= t.sell {
            RecommendationTier::Sell
        } else {
            RecommendationTier::StrongSell
        };
        Ok(tier)
    }
}
