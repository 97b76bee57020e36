pub mod aggregator;
pub mod classifier;
pub mod reasoning;
pub mod screener;

#[cfg(test)]
mod tests;

pub use aggregator::*;
pub use classifier::*;
pub use reasoning::*;
pub use screener::*;

use std::collections::BTreeSet;
use std::sync::Arc;

use analysis_core::{
    AnalysisError, FundamentalSnapshot, IndicatorSet, MarketDataSource, PriceSeries, Recommendation, ScoringConfig,
};
use chrono::{Duration, NaiveDate};
use fundamental_analysis::{FundamentalAnalysis, MetricEvaluator};
use rayon::prelude::*;
use serde::Serialize;
use technical_analysis::{IndicatorEngine, TechnicalAnalysis};
use tokio::task::JoinSet;

/// Symbols to evaluate and the date the recommendations are issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub symbols: BTreeSet<String>,
    pub as_of: NaiveDate,
}

impl BatchRequest {
    pub fn new<I, S>(symbols: I, as_of: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            as_of,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
    pub error: AnalysisError,
}

impl SymbolFailure {
    fn new(symbol: impl Into<String>, error: AnalysisError) -> Self {
        Self {
            symbol: symbol.into(),
            reason: error.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolIndicators {
    pub symbol: String,
    pub sets: Vec<IndicatorSet>,
}

/// Everything a batch produced. Each list is ordered by symbol.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub recommendations: Vec<Recommendation>,
    pub indicator_sets: Vec<SymbolIndicators>,
    pub failures: Vec<SymbolFailure>,
}

/// Per-symbol result with the intermediate analyses kept for inspection.
#[derive(Debug, Clone)]
pub struct SymbolEvaluation {
    pub recommendation: Recommendation,
    pub technical: TechnicalAnalysis,
    pub fundamental: FundamentalAnalysis,
}

/// Runs the whole pipeline (indicators, metrics, aggregation,
/// classification, reasoning) under one fixed configuration.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores one symbol. Pure: no I/O and no shared state.
    pub fn score_symbol(
        &self,
        symbol: &str,
        series: &PriceSeries,
        snapshot: &FundamentalSnapshot,
        as_of: NaiveDate,
    ) -> Result<SymbolEvaluation, AnalysisError> {
        let technical = IndicatorEngine::new(&self.config).analyze(series);
        let fundamental = MetricEvaluator::new(&self.config).evaluate(snapshot);

        let technical_score = technical.score.as_ref().map(|s| s.score);
        let fundamental_score = fundamental.score.as_ref().map(|s| s.score);

        let aggregate = ScoreAggregator::new(self.config.aggregation).combine(technical_score, fundamental_score)?;
        if aggregate.partial_coverage {
            tracing::info!(
                "{}: partial coverage, technical={:?} fundamental={:?}",
                symbol,
                technical_score,
                fundamental_score
            );
        }

        let tier = RecommendationClassifier::new(self.config.thresholds).classify(aggregate.overall)?;
        let reasoning = ReasoningGenerator::new(self.config.coverage_floor).generate(
            tier,
            aggregate.overall,
            technical.score.as_ref(),
            fundamental.score.as_ref(),
        );

        let recommendation = Recommendation::new(
            symbol,
            as_of,
            tier,
            aggregate.overall,
            technical_score,
            fundamental_score,
            aggregate.partial_coverage,
            reasoning,
            series.last().map(|bar| bar.close),
        )?;

        let caveats = technical
            .caveats
            .iter()
            .chain(&fundamental.caveats)
            .filter(|c| c.is_caveat())
            .count();
        tracing::debug!("{}: {} at {:.1} ({} caveats)", symbol, tier, aggregate.overall, caveats);

        Ok(SymbolEvaluation {
            recommendation,
            technical,
            fundamental,
        })
    }

    /// Fetches every symbol concurrently, then scores them in parallel.
    ///
    /// A failure (collaborator error, invalid series, nothing to aggregate)
    /// is recorded against its symbol and never aborts the batch.
    pub async fn evaluate(&self, source: Arc<dyn MarketDataSource>, request: &BatchRequest) -> BatchOutcome {
        let end = request.as_of;
        // Windows reaching past the calendar start are clamped to it.
        let start = Duration::try_days(self.config.history_days)
            .and_then(|window| end.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN);

        tracing::info!(
            "Evaluating {} symbols as of {} (history from {})",
            request.symbols.len(),
            end,
            start
        );

        let mut tasks = JoinSet::new();
        for symbol in &request.symbols {
            let source = Arc::clone(&source);
            let symbol = symbol.clone();
            tasks.spawn(async move {
                let fetched = async {
                    let series = source.get_price_series(&symbol, start, end).await?;
                    let snapshot = source.get_fundamental_snapshot(&symbol).await?;
                    Ok::<_, AnalysisError>((series, snapshot))
                }
                .await;
                (symbol, fetched)
            });
        }

        let mut outcome = BatchOutcome::default();
        let mut pending = request.symbols.clone();
        let mut inputs = Vec::with_capacity(request.symbols.len());

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((symbol, Ok((series, snapshot)))) => {
                    pending.remove(&symbol);
                    inputs.push((symbol, series, snapshot));
                }
                Ok((symbol, Err(e))) => {
                    tracing::warn!("Failed to fetch {}: {}", symbol, e);
                    pending.remove(&symbol);
                    outcome.failures.push(SymbolFailure::new(symbol, e));
                }
                Err(e) => {
                    tracing::error!("Fetch task error: {}", e);
                }
            }
        }

        // Symbols whose task panicked or was cancelled never reported back.
        for symbol in pending {
            outcome.failures.push(SymbolFailure::new(
                symbol,
                AnalysisError::Source("fetch task did not complete".to_string()),
            ));
        }

        let engine = self.clone();
        let as_of = request.as_of;
        let scoring: Vec<String> = inputs.iter().map(|(symbol, _, _)| symbol.clone()).collect();
        let scored: Vec<(String, Result<SymbolEvaluation, AnalysisError>)> = match tokio::task::spawn_blocking(
            move || {
                inputs
                    .par_iter()
                    .map(|(symbol, series, snapshot)| {
                        (symbol.clone(), engine.score_symbol(symbol, series, snapshot, as_of))
                    })
                    .collect::<Vec<_>>()
            },
        )
        .await
        {
            Ok(scored) => scored,
            Err(e) => {
                tracing::error!("Scoring task error: {}", e);
                scoring
                    .into_iter()
                    .map(|symbol| {
                        let error = AnalysisError::AggregationError(format!("scoring task did not complete: {e}"));
                        (symbol, Err(error))
                    })
                    .collect()
            }
        };

        for (symbol, result) in scored {
            match result {
                Ok(evaluation) => {
                    outcome.indicator_sets.push(SymbolIndicators {
                        symbol,
                        sets: evaluation.technical.indicators,
                    });
                    outcome.recommendations.push(evaluation.recommendation);
                }
                Err(e) => {
                    tracing::warn!("Failed to score {}: {}", symbol, e);
                    outcome.failures.push(SymbolFailure::new(symbol, e));
                }
            }
        }

        outcome
            .recommendations
            .sort_by(|a, b| a.symbol().cmp(b.symbol()));
        outcome.indicator_sets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        outcome.failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        tracing::info!(
            "Batch complete: {} recommendations, {} failures",
            outcome.recommendations.len(),
            outcome.failures.len()
        );

        outcome
    }
}
