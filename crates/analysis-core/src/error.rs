use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy shared by every stage of the pipeline.
///
/// `InsufficientHistory`, `MissingFundamentalData` and `InvalidPriceData` are
/// non-fatal: engines record them as caveats and keep going. The rest abort
/// the evaluation of a single symbol, never the batch.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum AnalysisError {
    #[error("Insufficient history for {indicator}: need {required} bars, have {available}")]
    InsufficientHistory {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("Missing fundamental data: {0}")]
    MissingFundamentalData(String),

    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Classification inconsistency: overall score {0} outside [0, 100]")]
    ClassificationInconsistency(f64),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Whether the condition only degrades an analysis instead of failing it.
    pub fn is_caveat(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientHistory { .. }
                | AnalysisError::MissingFundamentalData(_)
                | AnalysisError::InvalidPriceData(_)
        )
    }
}
