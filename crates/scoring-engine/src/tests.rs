use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use analysis_core::*;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::*;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

/// 200 steady gains, then a choppy stretch: close above every SMA, RSI
/// near 60, MACD histogram negative on both of the last two bars.
fn uptrend_bars(end: NaiveDate) -> Vec<PriceBar> {
    let mut closes = Vec::new();
    let mut price = 100.0;
    for _ in 0..200 {
        price += 0.5;
        closes.push(price);
    }
    for step in [1.0, -1.2].repeat(8).into_iter().chain([2.0]) {
        price += step;
        closes.push(price);
    }

    let n = closes.len() as i64;
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| PriceBar {
            date: end - Duration::days(n - 1 - i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1_000_000.0,
        })
        .collect()
}

fn value_snapshot(symbol: &str) -> FundamentalSnapshot {
    let mut snapshot = FundamentalSnapshot::new(symbol);
    snapshot.pe_ratio = Some(12.0);
    snapshot.profit_margin = Some(0.22);
    snapshot.revenue_growth = Some(0.18);
    snapshot.debt_to_equity = Some(0.3);
    snapshot
}

fn engine() -> ScoringEngine {
    ScoringEngine::new(ScoringConfig::default()).unwrap()
}

fn component(score: f64, signals: Vec<Signal>, evaluated: usize, recognized: usize) -> ComponentScore {
    ComponentScore::new(
        score,
        signals,
        Coverage {
            evaluated,
            recognized,
            missing: vec![],
        },
    )
}

fn signal(kind: SignalKind, explanation: &str) -> Signal {
    Signal {
        kind,
        label: explanation.to_string(),
        polarity: Polarity::Bullish,
        value: 1.0,
        contribution: 1.0,
        explanation: explanation.to_string(),
    }
}

fn rec(symbol: &str, tier: RecommendationTier, score: f64) -> Recommendation {
    Recommendation::new(symbol, as_of(), tier, score, Some(score), None, true, String::new(), None).unwrap()
}

#[test]
fn test_classifier_lower_bounds_are_inclusive() {
    let classifier = RecommendationClassifier::new(TierThresholds::default());
    let cases = [
        (100.0, RecommendationTier::StrongBuy),
        (80.0, RecommendationTier::StrongBuy),
        (79.99, RecommendationTier::Buy),
        (65.0, RecommendationTier::Buy),
        (64.99, RecommendationTier::Hold),
        (45.0, RecommendationTier::Hold),
        (44.99, RecommendationTier::Sell),
        (30.0, RecommendationTier::Sell),
        (29.99, RecommendationTier::StrongSell),
        (0.0, RecommendationTier::StrongSell),
    ];
    for (score, expected) in cases {
        assert_eq!(classifier.classify(score).unwrap(), expected, "score {}", score);
    }
}

#[test]
fn test_classifier_rejects_scores_outside_range() {
    let classifier = RecommendationClassifier::new(TierThresholds::default());
    assert_eq!(
        classifier.classify(100.5),
        Err(AnalysisError::ClassificationInconsistency(100.5))
    );
    assert!(classifier.classify(-0.1).is_err());
    assert!(classifier.classify(f64::NAN).is_err());
}

#[test]
fn test_aggregate_blends_with_default_weights() {
    let aggregator = ScoreAggregator::new(AggregationWeights::default());
    for t in (0..=10).map(|i| i as f64 * 10.0) {
        for f in (0..=10).map(|i| i as f64 * 10.0) {
            let result = aggregator.combine(Some(t), Some(f)).unwrap();
            assert!((0.0..=100.0).contains(&result.overall));
            assert!((result.overall - (0.6 * t + 0.4 * f)).abs() < 1e-9);
            assert!(!result.partial_coverage);
        }
    }
}

#[test]
fn test_aggregate_single_score_passes_through() {
    let aggregator = ScoreAggregator::new(AggregationWeights::default());

    let technical_only = aggregator.combine(Some(62.5), None).unwrap();
    assert_eq!(technical_only.overall, 62.5);
    assert!(technical_only.partial_coverage);

    let fundamental_only = aggregator.combine(None, Some(30.0)).unwrap();
    assert_eq!(fundamental_only.overall, 30.0);
    assert!(fundamental_only.partial_coverage);
}

#[test]
fn test_aggregate_without_scores_fails() {
    let aggregator = ScoreAggregator::new(AggregationWeights::default());
    assert!(matches!(
        aggregator.combine(None, None),
        Err(AnalysisError::AggregationError(_))
    ));
}

#[test]
fn test_reasoning_is_deterministic_and_ordered() {
    let technical = component(
        70.0,
        vec![
            signal(SignalKind::VolumeSurge, "volume"),
            signal(SignalKind::Uptrend, "trend"),
            signal(SignalKind::RsiOversold, "rsi"),
        ],
        4,
        4,
    );
    let fundamental = component(
        80.0,
        vec![
            signal(SignalKind::Metric(MetricKind::CurrentRatio), "liquidity"),
            signal(SignalKind::Metric(MetricKind::PeRatio), "valuation"),
        ],
        6,
        9,
    );
    let generator = ReasoningGenerator::new(0.5);

    let first = generator.generate(RecommendationTier::Buy, 74.0, Some(&technical), Some(&fundamental));
    let second = generator.generate(RecommendationTier::Buy, 74.0, Some(&technical), Some(&fundamental));

    assert_eq!(first, second);
    assert_eq!(
        first,
        "BUY at 74.0/100 || Technical (70.0/100): rsi | trend | volume || Fundamental (80.0/100): valuation | liquidity"
    );
}

#[test]
fn test_reasoning_notes_missing_and_empty_sections() {
    let technical = component(50.0, vec![], 4, 4);
    let generator = ReasoningGenerator::new(0.5);
    let text = generator.generate(RecommendationTier::Hold, 50.0, Some(&technical), None);

    assert_eq!(
        text,
        "HOLD at 50.0/100 || Technical (50.0/100): No technical signals fired || \
         Fundamental: no fundamental data available || \
         Partial coverage: score reflects technical analysis only"
    );
}

#[test]
fn test_end_to_end_uptrend_value_stock() {
    let engine = engine();
    let series = PriceSeries::new("UP", uptrend_bars(as_of())).unwrap();
    let evaluation = engine
        .score_symbol("UP", &series, &value_snapshot("UP"), as_of())
        .unwrap();
    let rec = &evaluation.recommendation;

    let latest = evaluation.technical.latest().unwrap();
    let rsi = latest.rsi.unwrap();
    assert!(rsi > 30.0 && rsi < 70.0);
    assert!(latest.close > latest.sma_long.unwrap());

    assert!((rec.technical_score().unwrap() - 62.5).abs() < 1e-9);
    assert_eq!(rec.fundamental_score(), Some(100.0));
    assert!((rec.overall_score() - 77.5).abs() < 1e-9);
    assert!(rec.overall_score() >= 65.0);
    assert_eq!(rec.tier(), RecommendationTier::Buy);
    assert!(!rec.partial_coverage());
    assert_eq!(rec.date(), as_of());
    assert!((rec.reference_price().unwrap() - 200.4).abs() < 1e-9);

    for phrase in ["uptrend", "undervalued", "strong growth"] {
        assert!(rec.reasoning().contains(phrase), "missing {phrase:?} in {}", rec.reasoning());
    }
    assert_eq!(
        rec.reasoning(),
        "BUY at 77.5/100 || Technical (62.5/100): Price 200.40 above SMA20, SMA50 and SMA200 indicates an uptrend || \
         Fundamental (100.0/100): P/E of 12.0 suggests the stock is undervalued | Profit margin of 22.0% is excellent | \
         Revenue growth of 18.0% shows strong growth | Debt-to-equity of 0.30 signals low risk | \
         Limited data (4 of 9 metrics), missing liquidity"
    );
}

#[test]
fn test_fundamentals_only_symbol_is_partial() {
    let engine = engine();
    let evaluation = engine
        .score_symbol("FUND", &PriceSeries::empty("FUND"), &value_snapshot("FUND"), as_of())
        .unwrap();
    let rec = evaluation.recommendation;

    assert_eq!(rec.overall_score(), 100.0);
    assert_eq!(rec.tier(), RecommendationTier::StrongBuy);
    assert!(rec.partial_coverage());
    assert_eq!(rec.technical_score(), None);
    assert_eq!(rec.reference_price(), None);
    assert!(rec.reasoning().contains("insufficient price history"));
}

#[test]
fn test_engine_rejects_invalid_config() {
    let mut config = ScoringConfig::default();
    config.aggregation.fundamental = 0.5;
    assert!(ScoringEngine::new(config).is_err());
}

#[test]
fn test_buy_candidates_ranked_and_capped() {
    let recs = vec![
        rec("AAA", RecommendationTier::Buy, 70.0),
        rec("BBB", RecommendationTier::StrongBuy, 85.0),
        rec("CCC", RecommendationTier::Hold, 62.0),
        rec("DDD", RecommendationTier::Buy, 70.0),
        rec("EEE", RecommendationTier::Buy, 66.0),
    ];
    let params = ScreeningParams {
        min_buy_score: 60.0,
        max_sell_score: 40.0,
        top_n: 3,
    };

    let symbols: Vec<&str> = buy_candidates(&recs, &params).iter().map(|r| r.symbol()).collect();
    assert_eq!(symbols, vec!["BBB", "AAA", "DDD"]);
}

#[test]
fn test_sell_candidates_only_consider_holdings() {
    let recs = vec![
        rec("HELD_WEAK", RecommendationTier::StrongSell, 25.0),
        rec("HELD_LOW_HOLD", RecommendationTier::Sell, 38.0),
        rec("HELD_OK", RecommendationTier::Hold, 50.0),
        rec("NOT_HELD", RecommendationTier::StrongSell, 10.0),
    ];
    let held: BTreeSet<String> = ["HELD_WEAK", "HELD_LOW_HOLD", "HELD_OK"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let symbols: Vec<&str> = sell_candidates(&recs, &held, &ScreeningParams::default())
        .iter()
        .map(|r| r.symbol())
        .collect();
    assert_eq!(symbols, vec!["HELD_WEAK", "HELD_LOW_HOLD"]);
}

struct FakeSource {
    bars: HashMap<String, Vec<PriceBar>>,
    snapshots: HashMap<String, FundamentalSnapshot>,
    failing: BTreeSet<String>,
    windows: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn get_price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError> {
        self.windows.lock().unwrap().push((start, end));
        if self.failing.contains(symbol) {
            return Err(AnalysisError::Source(format!("{symbol}: upstream timeout")));
        }
        let bars: Vec<PriceBar> = self
            .bars
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        PriceSeries::new(symbol, bars)
    }

    async fn get_fundamental_snapshot(&self, symbol: &str) -> Result<FundamentalSnapshot, AnalysisError> {
        Ok(self
            .snapshots
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| FundamentalSnapshot::new(symbol)))
    }
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let mut unordered = uptrend_bars(as_of());
    unordered.swap(10, 11);

    let source = Arc::new(FakeSource {
        bars: HashMap::from([
            ("UP".to_string(), uptrend_bars(as_of())),
            ("BAD".to_string(), unordered),
        ]),
        snapshots: HashMap::from([
            ("UP".to_string(), value_snapshot("UP")),
            ("FUND".to_string(), value_snapshot("FUND")),
        ]),
        failing: BTreeSet::from(["ERR".to_string()]),
        windows: Mutex::new(Vec::new()),
    });

    let request = BatchRequest::new(["UP", "FUND", "ERR", "BAD", "NODATA"], as_of());
    let outcome = engine().evaluate(source.clone(), &request).await;

    let symbols: Vec<&str> = outcome.recommendations.iter().map(|r| r.symbol()).collect();
    assert_eq!(symbols, vec!["FUND", "UP"]);
    assert_eq!(outcome.recommendations[1].tier(), RecommendationTier::Buy);
    assert!(outcome.recommendations[0].partial_coverage());

    assert_eq!(outcome.indicator_sets.len(), 2);
    assert_eq!(outcome.indicator_sets[1].symbol, "UP");
    assert_eq!(outcome.indicator_sets[1].sets.len(), 217);

    let failures: Vec<(&str, &AnalysisError)> = outcome
        .failures
        .iter()
        .map(|f| (f.symbol.as_str(), &f.error))
        .collect();
    assert_eq!(failures.len(), 3);
    assert!(matches!(failures[0], ("BAD", AnalysisError::InvalidSeries(_))));
    assert!(matches!(failures[1], ("ERR", AnalysisError::Source(_))));
    assert!(matches!(failures[2], ("NODATA", AnalysisError::AggregationError(_))));

    let windows = source.windows.lock().unwrap();
    assert_eq!(windows.len(), 5);
    assert!(windows
        .iter()
        .all(|(start, end)| *end == as_of() && *start == as_of() - Duration::days(365)));
}

#[tokio::test]
async fn test_empty_batch() {
    let source = Arc::new(FakeSource {
        bars: HashMap::new(),
        snapshots: HashMap::new(),
        failing: BTreeSet::new(),
        windows: Mutex::new(Vec::new()),
    });
    let outcome = engine()
        .evaluate(source, &BatchRequest::new(Vec::<String>::new(), as_of()))
        .await;

    assert!(outcome.recommendations.is_empty());
    assert!(outcome.failures.is_empty());
}

#[tokio::test]
async fn test_window_clamps_at_calendar_start() {
    let source = Arc::new(FakeSource {
        bars: HashMap::new(),
        snapshots: HashMap::from([("OLD".to_string(), value_snapshot("OLD"))]),
        failing: BTreeSet::new(),
        windows: Mutex::new(Vec::new()),
    });
    let mut config = ScoringConfig::default();
    config.history_days = MAX_HISTORY_DAYS;
    let as_of = NaiveDate::MIN + Duration::days(10);

    let outcome = ScoringEngine::new(config)
        .unwrap()
        .evaluate(source.clone(), &BatchRequest::new(["OLD"], as_of))
        .await;

    assert_eq!(outcome.recommendations.len(), 1);
    assert!(outcome.failures.is_empty());
    assert_eq!(*source.windows.lock().unwrap(), vec![(NaiveDate::MIN, as_of)]);
}
