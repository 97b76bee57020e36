use serde::{Deserialize, Serialize};

use crate::{AnalysisError, MetricKind};

/// Technical signal families that carry weight in the technical sub-score.
/// Volume is not a family: it only amplifies the families that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalSignal {
    Rsi,
    Macd,
    Trend,
    Bollinger,
}

impl TechnicalSignal {
    pub const ALL: [TechnicalSignal; 4] = [
        TechnicalSignal::Rsi,
        TechnicalSignal::Macd,
        TechnicalSignal::Trend,
        TechnicalSignal::Bollinger,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TechnicalSignal::Rsi => "RSI",
            TechnicalSignal::Macd => "MACD",
            TechnicalSignal::Trend => "moving averages",
            TechnicalSignal::Bollinger => "Bollinger bands",
        }
    }
}

/// Lookbacks and thresholds for the indicator engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub sma_short: usize,
    pub sma_medium: usize,
    pub sma_long: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub stochastic_k: usize,
    pub stochastic_d: usize,
    pub atr_period: usize,
    pub volume_period: usize,
    /// Volume ratio above which fired signals are amplified.
    pub volume_spike_ratio: f64,
    /// Multiplier applied to fired signal weights on a volume spike.
    pub volume_amplifier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            sma_short: 20,
            sma_medium: 50,
            sma_long: 200,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            stochastic_k: 14,
            stochastic_d: 3,
            atr_period: 14,
            volume_period: 20,
            volume_spike_ratio: 1.5,
            volume_amplifier: 1.5,
        }
    }
}

/// Rule-table breakpoints for the metric evaluator. Ratios are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricBreakpoints {
    pub pe_undervalued: f64,
    pub pe_expensive: f64,
    pub profit_margin_excellent: f64,
    pub profit_margin_good: f64,
    pub operating_margin_excellent: f64,
    pub operating_margin_good: f64,
    pub growth_strong: f64,
    pub roe_excellent: f64,
    pub roe_good: f64,
    pub roa_excellent: f64,
    pub roa_good: f64,
    pub debt_low: f64,
    pub debt_high: f64,
    pub current_ratio_healthy: f64,
    pub current_ratio_risk: f64,
}

impl Default for MetricBreakpoints {
    fn default() -> Self {
        Self {
            pe_undervalued: 15.0,
            pe_expensive: 25.0,
            profit_margin_excellent: 0.20,
            profit_margin_good: 0.10,
            operating_margin_excellent: 0.20,
            operating_margin_good: 0.10,
            growth_strong: 0.15,
            roe_excellent: 0.15,
            roe_good: 0.08,
            roa_excellent: 0.08,
            roa_good: 0.04,
            debt_low: 0.5,
            debt_high: 1.5,
            current_ratio_healthy: 1.5,
            current_ratio_risk: 1.0,
        }
    }
}

/// Blend weights for the overall score; must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationWeights {
    pub technical: f64,
    pub fundamental: f64,
}

impl Default for AggregationWeights {
    fn default() -> Self {
        Self {
            technical: 0.6,
            fundamental: 0.4,
        }
    }
}

/// Inclusive lower bounds for each tier above STRONG_SELL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub strong_buy: f64,
    pub buy: f64,
    pub hold: f64,
    pub sell: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 80.0,
            buy: 65.0,
            hold: 45.0,
            sell: 30.0,
        }
    }
}

/// Cut-offs for the buy/sell candidate lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningParams {
    pub min_buy_score: f64,
    pub max_sell_score: f64,
    pub top_n: usize,
}

impl Default for ScreeningParams {
    fn default() -> Self {
        Self {
            min_buy_score: 60.0,
            max_sell_score: 40.0,
            top_n: 10,
        }
    }
}

/// Everything a batch run needs. Built once, then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub indicators: IndicatorParams,
    pub technical_weights: Vec<(TechnicalSignal, f64)>,
    pub metric_weights: Vec<(MetricKind, f64)>,
    pub breakpoints: MetricBreakpoints,
    pub aggregation: AggregationWeights,
    pub thresholds: TierThresholds,
    pub screening: ScreeningParams,
    /// Fraction of recognised metrics below which fundamentals are flagged sparse.
    pub coverage_floor: f64,
    /// Calendar days of price history requested per symbol.
    pub history_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorParams::default(),
            technical_weights: vec![
                (TechnicalSignal::Rsi, 2.0),
                (TechnicalSignal::Macd, 2.5),
                (TechnicalSignal::Trend, 2.0),
                (TechnicalSignal::Bollinger, 1.5),
            ],
            metric_weights: vec![
                (MetricKind::PeRatio, 2.0),
                (MetricKind::ProfitMargin, 2.0),
                (MetricKind::OperatingMargin, 1.5),
                (MetricKind::ReturnOnEquity, 2.0),
                (MetricKind::ReturnOnAssets, 1.5),
                (MetricKind::RevenueGrowth, 2.0),
                (MetricKind::EarningsGrowth, 2.0),
                (MetricKind::DebtToEquity, 1.5),
                (MetricKind::CurrentRatio, 1.0),
            ],
            breakpoints: MetricBreakpoints::default(),
            aggregation: AggregationWeights::default(),
            thresholds: TierThresholds::default(),
            screening: ScreeningParams::default(),
            coverage_floor: 0.5,
            history_days: 365,
        }
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Upper bound on the requested history window (100 years).
pub const MAX_HISTORY_DAYS: i64 = 36_500;

impl ScoringConfig {
    /// Weight of a technical family; 0 when it is not listed.
    pub fn technical_weight(&self, signal: TechnicalSignal) -> f64 {
        self.technical_weights
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    /// Weight of a fundamental metric; 0 when it is not listed.
    pub fn metric_weight(&self, metric: MetricKind) -> f64 {
        self.metric_weights
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let p = &self.indicators;
        let periods = [
            ("rsi_period", p.rsi_period),
            ("macd_fast", p.macd_fast),
            ("macd_slow", p.macd_slow),
            ("macd_signal", p.macd_signal),
            ("sma_short", p.sma_short),
            ("sma_medium", p.sma_medium),
            ("sma_long", p.sma_long),
            ("bollinger_period", p.bollinger_period),
            ("stochastic_k", p.stochastic_k),
            ("stochastic_d", p.stochastic_d),
            ("atr_period", p.atr_period),
            ("volume_period", p.volume_period),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, v)| *v == 0) {
            return Err(config_error(format!("{name} must be greater than zero")));
        }
        if p.macd_fast >= p.macd_slow {
            return Err(config_error("macd_fast must be shorter than macd_slow"));
        }
        if !(p.sma_short < p.sma_medium && p.sma_medium < p.sma_long) {
            return Err(config_error("moving average periods must be strictly increasing"));
        }
        if !(0.0 < p.rsi_oversold && p.rsi_oversold < p.rsi_overbought && p.rsi_overbought < 100.0) {
            return Err(config_error("RSI thresholds must satisfy 0 < oversold < overbought < 100"));
        }
        if !(p.bollinger_std_dev > 0.0 && p.volume_spike_ratio > 0.0 && p.volume_amplifier >= 1.0) {
            return Err(config_error(
                "bollinger_std_dev and volume_spike_ratio must be positive, volume_amplifier at least 1",
            ));
        }

        let weights = self
            .technical_weights
            .iter()
            .map(|(_, w)| *w)
            .chain(self.metric_weights.iter().map(|(_, w)| *w));
        for w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(config_error(format!("signal weights must be non-negative, got {w}")));
            }
        }

        let agg = &self.aggregation;
        if !agg.technical.is_finite()
            || !agg.fundamental.is_finite()
            || agg.technical < 0.0
            || agg.fundamental < 0.0
            || (agg.technical + agg.fundamental - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            return Err(config_error(format!(
                "aggregation weights must be non-negative and sum to 1, got {} + {}",
                agg.technical, agg.fundamental
            )));
        }

        let t = &self.thresholds;
        if !(t.strong_buy <= 100.0 && t.strong_buy > t.buy && t.buy > t.hold && t.hold > t.sell && t.sell > 0.0) {
            return Err(config_error("tier thresholds must be strictly descending within (0, 100]"));
        }

        let b = &self.breakpoints;
        let ordered = b.pe_undervalued < b.pe_expensive
            && b.profit_margin_good < b.profit_margin_excellent
            && b.operating_margin_good < b.operating_margin_excellent
            && b.roe_good < b.roe_excellent
            && b.roa_good < b.roa_excellent
            && b.debt_low < b.debt_high
            && b.current_ratio_risk < b.current_ratio_healthy;
        if !ordered {
            return Err(config_error("metric breakpoints are out of order"));
        }

        if !(0.0..=1.0).contains(&self.coverage_floor) {
            return Err(config_error("coverage_floor must be within [0, 1]"));
        }
        if self.history_days <= 0 || self.history_days > MAX_HISTORY_DAYS {
            return Err(config_error(format!(
                "history_days must be within 1..={MAX_HISTORY_DAYS}, got {}",
                self.history_days
            )));
        }

        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> AnalysisError {
    AnalysisError::Config(msg.into())
}
