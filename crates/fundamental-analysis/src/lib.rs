use analysis_core::{
    AnalysisError, ComponentScore, Coverage, FundamentalSnapshot, MetricCategory, MetricKind, Polarity,
    ScoringConfig, Signal, SignalKind,
};
use serde::Serialize;


/// Revenue growth below this keeps a cheap stock in the value bucket.
const VALUE_GROWTH_CEILING: f64 = 0.05;

/// Five-step rating ladder shared by every metric rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Strong,
    Favorable,
    Neutral,
    Weak,
    Severe,
}

impl Rating {
    pub fn points(&self) -> f64 {
        match self {
            Rating::Strong => 100.0,
            Rating::Favorable => 75.0,
            Rating::Neutral => 50.0,
            Rating::Weak => 25.0,
            Rating::Severe => 0.0,
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Rating::Strong | Rating::Favorable => Polarity::Bullish,
            Rating::Neutral => Polarity::Neutral,
            Rating::Weak | Rating::Severe => Polarity::Bearish,
        }
    }
}

/// One present metric, rated against its breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEvaluation {
    pub metric: MetricKind,
    pub value: f64,
    pub rating: Rating,
    /// Short rule-table verdict, e.g. "undervalued" or "liquidity risk".
    pub verdict: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationCategory {
    Undervalued,
    FairValue,
    Overvalued,
    Unprofitable,
}

impl ValuationCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ValuationCategory::Undervalued => "undervalued",
            ValuationCategory::FairValue => "fair value",
            ValuationCategory::Overvalued => "overvalued",
            ValuationCategory::Unprofitable => "unprofitable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStyle {
    Value,
    Growth,
    Balanced,
}

/// Output of the metric evaluator for one snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FundamentalAnalysis {
    pub symbol: String,
    /// `None` when the snapshot holds no scored metric.
    pub score: Option<ComponentScore>,
    /// Every present metric, in evaluation order, including neutral ones.
    pub evaluations: Vec<MetricEvaluation>,
    /// One `MissingFundamentalData` per absent metric.
    pub caveats: Vec<AnalysisError>,
    pub valuation: Option<ValuationCategory>,
    pub style: Option<InvestmentStyle>,
    /// Profitability quality in [0, 100].
    pub quality_score: Option<f64>,
}

impl FundamentalAnalysis {
    pub fn evaluation(&self, metric: MetricKind) -> Option<&MetricEvaluation> {
        self.evaluations.iter().find(|e| e.metric == metric)
    }
}

/// Rates the metrics of a [`FundamentalSnapshot`] and averages the present
/// ones into the fundamental sub-score.
pub struct MetricEvaluator<'a> {
    config: &'a ScoringConfig,
}

impl<'a> MetricEvaluator<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Applies the rule table for `metric`.
    pub fn rate(&self, metric: MetricKind, value: f64) -> (Rating, &'static str) {
        let b = &self.config.breakpoints;
        match metric {
            MetricKind::PeRatio => {
                if value <= 0.0 {
                    (Rating::Severe, "unprofitable")
                } else if value < b.pe_undervalued {
                    (Rating::Strong, "undervalued")
                } else if value <= b.pe_expensive {
                    (Rating::Neutral, "fair value")
                } else {
                    (Rating::Weak, "expensive")
                }
            }
            MetricKind::ProfitMargin => margin_rating(value, b.profit_margin_excellent, b.profit_margin_good),
            MetricKind::OperatingMargin => {
                margin_rating(value, b.operating_margin_excellent, b.operating_margin_good)
            }
            MetricKind::ReturnOnEquity => return_rating(value, b.roe_excellent, b.roe_good),
            MetricKind::ReturnOnAssets => return_rating(value, b.roa_excellent, b.roa_good),
            MetricKind::RevenueGrowth | MetricKind::EarningsGrowth => {
                if value > b.growth_strong {
                    (Rating::Strong, "strong growth")
                } else if value >= 0.0 {
                    (Rating::Neutral, "modest growth")
                } else {
                    (Rating::Weak, "declining")
                }
            }
            MetricKind::DebtToEquity => {
                if value < 0.0 {
                    (Rating::Severe, "negative equity")
                } else if value < b.debt_low {
                    (Rating::Strong, "low risk")
                } else if value <= b.debt_high {
                    (Rating::Neutral, "moderate risk")
                } else {
                    (Rating::Weak, "high risk")
                }
            }
            MetricKind::CurrentRatio => {
                if value > b.current_ratio_healthy {
                    (Rating::Strong, "healthy liquidity")
                } else if value >= b.current_ratio_risk {
                    (Rating::Neutral, "adequate liquidity")
                } else {
                    (Rating::Weak, "liquidity risk")
                }
            }
        }
    }

    pub fn evaluate(&self, snapshot: &FundamentalSnapshot) -> FundamentalAnalysis {
        let mut evaluations = Vec::new();
        let mut signals = Vec::new();
        let mut caveats = Vec::new();
        let mut weighted_points = 0.0;
        let mut total_weight = 0.0;
        let mut recognized = 0;

        for metric in MetricKind::ALL {
            let weight = self.config.metric_weight(metric);
            if weight <= 0.0 {
                continue;
            }
            recognized += 1;

            let Some(value) = snapshot.metric(metric) else {
                caveats.push(AnalysisError::MissingFundamentalData(metric.label().to_string()));
                continue;
            };

            let (rating, verdict) = self.rate(metric, value);
            weighted_points += weight * rating.points();
            total_weight += weight;

            if rating != Rating::Neutral {
                signals.push(Signal {
                    kind: SignalKind::Metric(metric),
                    label: verdict.to_string(),
                    polarity: rating.polarity(),
                    value,
                    contribution: weight * (rating.points() - 50.0) / 50.0,
                    explanation: explain(metric, value, verdict),
                });
            }
            evaluations.push(MetricEvaluation {
                metric,
                value,
                rating,
                verdict,
            });
        }

        let missing: Vec<String> = MetricCategory::ALL
            .iter()
            .filter(|category| {
                let in_category = |m: &&MetricKind| m.category() == **category;
                let recognized_here = MetricKind::ALL
                    .iter()
                    .filter(in_category)
                    .any(|m| self.config.metric_weight(*m) > 0.0);
                recognized_here && !evaluations.iter().any(|e| e.metric.category() == **category)
            })
            .map(|category| category.label().to_string())
            .collect();

        let coverage = Coverage {
            evaluated: evaluations.len(),
            recognized,
            missing,
        };

        if coverage.is_sparse(self.config.coverage_floor) {
            tracing::info!(
                "{}: sparse fundamentals, {} of {} metrics present (missing: {})",
                snapshot.symbol,
                coverage.evaluated,
                coverage.recognized,
                coverage.missing.join(", ")
            );
        }

        let score = if total_weight > 0.0 {
            Some(ComponentScore::new(weighted_points / total_weight, signals, coverage))
        } else {
            None
        };

        let valuation = evaluations
            .iter()
            .find(|e| e.metric == MetricKind::PeRatio)
            .map(|e| match e.rating {
                Rating::Strong | Rating::Favorable => ValuationCategory::Undervalued,
                Rating::Neutral => ValuationCategory::FairValue,
                Rating::Weak => ValuationCategory::Overvalued,
                Rating::Severe => ValuationCategory::Unprofitable,
            });

        FundamentalAnalysis {
            symbol: snapshot.symbol.clone(),
            score,
            evaluations,
            caveats,
            valuation,
            style: self.investment_style(snapshot),
            quality_score: self.quality_score(snapshot),
        }
    }

    /// Cheap and slow-growing is value, fast-growing is growth, anything
    /// else is balanced.
    pub fn investment_style(&self, snapshot: &FundamentalSnapshot) -> Option<InvestmentStyle> {
        let pe = snapshot.metric(MetricKind::PeRatio);
        let growth = snapshot.metric(MetricKind::RevenueGrowth);
        if pe.is_none() && growth.is_none() {
            return None;
        }

        let cheap = pe.is_some_and(|pe| pe > 0.0 && pe < self.config.breakpoints.pe_undervalued);
        let style = if cheap {
            if growth.is_some_and(|g| g < VALUE_GROWTH_CEILING) {
                InvestmentStyle::Value
            } else {
                InvestmentStyle::Balanced
            }
        } else if growth.is_some_and(|g| g > self.config.breakpoints.growth_strong) {
            InvestmentStyle::Growth
        } else {
            InvestmentStyle::Balanced
        };
        Some(style)
    }

    /// Mean of each positive return/margin as a share of its "excellent"
    /// breakpoint, capped at 100.
    pub fn quality_score(&self, snapshot: &FundamentalSnapshot) -> Option<f64> {
        let b = &self.config.breakpoints;
        let parts: Vec<f64> = [
            (MetricKind::ReturnOnEquity, b.roe_excellent),
            (MetricKind::ReturnOnAssets, b.roa_excellent),
            (MetricKind::ProfitMargin, b.profit_margin_excellent),
            (MetricKind::OperatingMargin, b.operating_margin_excellent),
        ]
        .iter()
        .filter_map(|(metric, excellent)| {
            snapshot
                .metric(*metric)
                .filter(|v| *v > 0.0)
                .map(|v| (v / excellent).min(1.0) * 100.0)
        })
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.iter().sum::<f64>() / parts.len() as f64)
        }
    }
}

fn margin_rating(value: f64, excellent: f64, good: f64) -> (Rating, &'static str) {
    if value > excellent {
        (Rating::Strong, "excellent")
    } else if value >= good {
        (Rating::Favorable, "good")
    } else {
        (Rating::Weak, "weak")
    }
}

fn return_rating(value: f64, excellent: f64, good: f64) -> (Rating, &'static str) {
    if value >= excellent {
        (Rating::Strong, "excellent")
    } else if value >= good {
        (Rating::Favorable, "good")
    } else if value >= 0.0 {
        (Rating::Weak, "weak")
    } else {
        (Rating::Severe, "negative")
    }
}

fn explain(metric: MetricKind, value: f64, verdict: &str) -> String {
    match metric {
        MetricKind::PeRatio if verdict == "unprofitable" => {
            format!("P/E of {:.1} indicates the company is unprofitable", value)
        }
        MetricKind::PeRatio => format!("P/E of {:.1} suggests the stock is {}", value, verdict),
        MetricKind::ProfitMargin => format!("Profit margin of {:.1}% is {}", value * 100.0, verdict),
        MetricKind::OperatingMargin => format!("Operating margin of {:.1}% is {}", value * 100.0, verdict),
        MetricKind::ReturnOnEquity => format!("Return on equity of {:.1}% is {}", value * 100.0, verdict),
        MetricKind::ReturnOnAssets => format!("Return on assets of {:.1}% is {}", value * 100.0, verdict),
        MetricKind::RevenueGrowth if verdict == "declining" => {
            format!("Revenue growth of {:.1}% shows revenue declining", value * 100.0)
        }
        MetricKind::RevenueGrowth => format!("Revenue growth of {:.1}% shows {}", value * 100.0, verdict),
        MetricKind::EarningsGrowth if verdict == "declining" => {
            format!("Earnings growth of {:.1}% shows earnings declining", value * 100.0)
        }
        MetricKind::EarningsGrowth => format!("Earnings growth of {:.1}% shows {}", value * 100.0, verdict),
        MetricKind::DebtToEquity => format!("Debt-to-equity of {:.2} signals {}", value, verdict),
        MetricKind::CurrentRatio => format!("Current ratio of {:.2} shows {}", value, verdict),
    }
}
