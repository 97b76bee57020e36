use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// True when every OHLCV field is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Chronological, duplicate-free daily history for one symbol.
///
/// Gaps (weekends, holidays) are kept as-is and never interpolated.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
    dropped_bars: usize,
}

impl PriceSeries {
    /// Builds a series, dropping bars with non-finite or negative values.
    ///
    /// Fails with `InvalidSeries` if the surviving bars are not strictly
    /// increasing by date.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();
        let total = bars.len();
        let bars: Vec<PriceBar> = bars.into_iter().filter(PriceBar::is_valid).collect();
        let dropped_bars = total - bars.len();

        if dropped_bars > 0 {
            tracing::warn!(
                "{}: dropped {} of {} bars with non-finite or negative OHLCV values",
                symbol,
                dropped_bars,
                total
            );
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(AnalysisError::InvalidSeries(format!(
                "{}: bar dated {} follows {}",
                symbol, pair[1].date, pair[0].date
            )));
        }

        Ok(Self {
            symbol,
            bars,
            dropped_bars,
        })
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
            dropped_bars: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Number of bars rejected as invalid during construction.
    pub fn dropped_bars(&self) -> usize {
        self.dropped_bars
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

/// Indicator values for one bar. `None` means the lookback was not satisfied.
///
/// The moving averages use the short/medium/long periods from
/// [`IndicatorParams`](crate::IndicatorParams) (20/50/200 by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub date: NaiveDate,
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_medium: Option<f64>,
    pub sma_long: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub atr: Option<f64>,
    pub obv: Option<f64>,
    pub volume_ratio: Option<f64>,
}

impl IndicatorSet {
    pub fn empty(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            rsi: None,
            macd_line: None,
            macd_signal: None,
            macd_histogram: None,
            sma_short: None,
            sma_medium: None,
            sma_long: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            stoch_k: None,
            stoch_d: None,
            atr: None,
            obv: None,
            volume_ratio: None,
        }
    }
}

/// Scored fundamental metrics, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    PeRatio,
    ProfitMargin,
    OperatingMargin,
    ReturnOnEquity,
    ReturnOnAssets,
    RevenueGrowth,
    EarningsGrowth,
    DebtToEquity,
    CurrentRatio,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::PeRatio,
        MetricKind::ProfitMargin,
        MetricKind::OperatingMargin,
        MetricKind::ReturnOnEquity,
        MetricKind::ReturnOnAssets,
        MetricKind::RevenueGrowth,
        MetricKind::EarningsGrowth,
        MetricKind::DebtToEquity,
        MetricKind::CurrentRatio,
    ];

    pub fn category(&self) -> MetricCategory {
        match self {
            MetricKind::PeRatio => MetricCategory::Valuation,
            MetricKind::ProfitMargin
            | MetricKind::OperatingMargin
            | MetricKind::ReturnOnEquity
            | MetricKind::ReturnOnAssets => MetricCategory::Profitability,
            MetricKind::RevenueGrowth | MetricKind::EarningsGrowth => MetricCategory::Growth,
            MetricKind::DebtToEquity => MetricCategory::Leverage,
            MetricKind::CurrentRatio => MetricCategory::Liquidity,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::PeRatio => "P/E ratio",
            MetricKind::ProfitMargin => "profit margin",
            MetricKind::OperatingMargin => "operating margin",
            MetricKind::ReturnOnEquity => "return on equity",
            MetricKind::ReturnOnAssets => "return on assets",
            MetricKind::RevenueGrowth => "revenue growth",
            MetricKind::EarningsGrowth => "earnings growth",
            MetricKind::DebtToEquity => "debt-to-equity",
            MetricKind::CurrentRatio => "current ratio",
        }
    }
}

/// Groups metrics for reasoning and coverage reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Valuation,
    Profitability,
    Growth,
    Leverage,
    Liquidity,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 5] = [
        MetricCategory::Valuation,
        MetricCategory::Profitability,
        MetricCategory::Growth,
        MetricCategory::Leverage,
        MetricCategory::Liquidity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricCategory::Valuation => "valuation",
            MetricCategory::Profitability => "profitability",
            MetricCategory::Growth => "growth",
            MetricCategory::Leverage => "leverage",
            MetricCategory::Liquidity => "liquidity",
        }
    }
}

/// Point-in-time company metrics. Every field is independently optional.
///
/// Margins, growth rates and returns are fractions (0.22 means 22%).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub as_of: Option<NaiveDate>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub market_cap: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
}

impl FundamentalSnapshot {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Value of a scored metric; non-finite values count as missing.
    pub fn metric(&self, kind: MetricKind) -> Option<f64> {
        let value = match kind {
            MetricKind::PeRatio => self.pe_ratio,
            MetricKind::ProfitMargin => self.profit_margin,
            MetricKind::OperatingMargin => self.operating_margin,
            MetricKind::ReturnOnEquity => self.return_on_equity,
            MetricKind::ReturnOnAssets => self.return_on_assets,
            MetricKind::RevenueGrowth => self.revenue_growth,
            MetricKind::EarningsGrowth => self.earnings_growth,
            MetricKind::DebtToEquity => self.debt_to_equity,
            MetricKind::CurrentRatio => self.current_ratio,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn present_metrics(&self) -> usize {
        MetricKind::ALL.iter().filter(|k| self.metric(**k).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_metrics() == 0
    }
}

/// Direction of a fired signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

impl Polarity {
    pub fn sign(&self) -> f64 {
        match self {
            Polarity::Bullish => 1.0,
            Polarity::Bearish => -1.0,
            Polarity::Neutral => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Polarity::Bullish => "bullish",
            Polarity::Bearish => "bearish",
            Polarity::Neutral => "neutral",
        }
    }
}

/// Everything that can appear in a reasoning section. Declaration order is
/// the order signals are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "metric")]
pub enum SignalKind {
    RsiOversold,
    RsiOverbought,
    MacdBullishCrossover,
    MacdBearishCrossover,
    Uptrend,
    Downtrend,
    LowerBandTouch,
    UpperBandTouch,
    VolumeSurge,
    Metric(MetricKind),
}

impl SignalKind {
    /// Position in the fixed reporting order (technical first, then
    /// valuation, profitability, growth, leverage, liquidity).
    pub fn order(&self) -> usize {
        match self {
            SignalKind::RsiOversold | SignalKind::RsiOverbought => 0,
            SignalKind::MacdBullishCrossover | SignalKind::MacdBearishCrossover => 1,
            SignalKind::Uptrend | SignalKind::Downtrend => 2,
            SignalKind::LowerBandTouch | SignalKind::UpperBandTouch => 3,
            SignalKind::VolumeSurge => 4,
            SignalKind::Metric(kind) => 10 + *kind as usize,
        }
    }
}

/// One triggered signal: what fired, which way, and a rendered sentence
/// carrying the concrete value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub label: String,
    pub polarity: Polarity,
    pub value: f64,
    /// Signed contribution to the component score's numerator.
    pub contribution: f64,
    pub explanation: String,
}

/// How much of the recognised input was actually available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub evaluated: usize,
    pub recognized: usize,
    pub missing: Vec<String>,
}

impl Coverage {
    pub fn ratio(&self) -> f64 {
        if self.recognized == 0 {
            return 0.0;
        }
        self.evaluated as f64 / self.recognized as f64
    }

    /// Below the usability floor (e.g. 0.5 = fewer than half available).
    pub fn is_sparse(&self, floor: f64) -> bool {
        self.ratio() < floor
    }
}

/// A technical or fundamental sub-score with the signals behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Always within [0, 100].
    pub score: f64,
    pub signals: Vec<Signal>,
    pub coverage: Coverage,
}

impl ComponentScore {
    /// Clamps the raw score into [0, 100].
    pub fn new(raw_score: f64, signals: Vec<Signal>, coverage: Coverage) -> Self {
        let score = if raw_score.is_finite() {
            raw_score.clamp(0.0, 100.0)
        } else {
            50.0
        };
        Self {
            score,
            signals,
            coverage,
        }
    }
}

/// Discrete recommendation classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationTier {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl RecommendationTier {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationTier::StrongBuy => "STRONG_BUY",
            RecommendationTier::Buy => "BUY",
            RecommendationTier::Hold => "HOLD",
            RecommendationTier::Sell => "SELL",
            RecommendationTier::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, RecommendationTier::StrongBuy | RecommendationTier::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, RecommendationTier::Sell | RecommendationTier::StrongSell)
    }
}

impl std::fmt::Display for RecommendationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Final, immutable output for one (symbol, date).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    symbol: String,
    date: NaiveDate,
    tier: RecommendationTier,
    overall_score: f64,
    technical_score: Option<f64>,
    fundamental_score: Option<f64>,
    partial_coverage: bool,
    reasoning: String,
    reference_price: Option<f64>,
}

impl Recommendation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        tier: RecommendationTier,
        overall_score: f64,
        technical_score: Option<f64>,
        fundamental_score: Option<f64>,
        partial_coverage: bool,
        reasoning: String,
        reference_price: Option<f64>,
    ) -> Result<Self, AnalysisError> {
        if !overall_score.is_finite() || !(0.0..=100.0).contains(&overall_score) {
            return Err(AnalysisError::ClassificationInconsistency(overall_score));
        }
        Ok(Self {
            symbol: symbol.into(),
            date,
            tier,
            overall_score,
            technical_score,
            fundamental_score,
            partial_coverage,
            reasoning,
            reference_price,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn tier(&self) -> RecommendationTier {
        self.tier
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn technical_score(&self) -> Option<f64> {
        self.technical_score
    }

    pub fn fundamental_score(&self) -> Option<f64> {
        self.fundamental_score
    }

    /// True when only one of the two sub-scores was available.
    pub fn partial_coverage(&self) -> bool {
        self.partial_coverage
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.reference_price
    }
}
