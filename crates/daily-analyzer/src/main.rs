use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use analysis_core::Recommendation;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use scoring_engine::{
    buy_candidates, sell_candidates, BatchOutcome, BatchRequest, ScoringEngine, SymbolFailure, SymbolIndicators,
};
use serde::Serialize;

mod config;
mod holdings;
mod source;

use config::AnalyzerConfig;
use source::JsonDirSource;

const USAGE: &str =
    "Usage: daily-analyzer --data-dir <DIR> [--as-of YYYY-MM-DD] [--out <FILE>] [--with-indicators]";

#[derive(Debug, Serialize)]
struct DailyReport<'a> {
    as_of: NaiveDate,
    recommendations: &'a [Recommendation],
    buy_candidates: Vec<&'a Recommendation>,
    sell_candidates: Vec<&'a Recommendation>,
    failures: &'a [SymbolFailure],
    realized_pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    indicators: Option<&'a [SymbolIndicators]>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let args: Vec<String> = std::env::args().collect();
    let Some(data_dir) = arg_value(&args, "--data-dir").map(PathBuf::from) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let as_of = match arg_value(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("Invalid --as-of {}", raw))?,
        None => chrono::Local::now().date_naive(),
    };
    let out = arg_value(&args, "--out").map(PathBuf::from);
    let with_indicators = args.iter().any(|a| a == "--with-indicators");

    let config = AnalyzerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!(
        "  Weights: technical {:.2}, fundamental {:.2}",
        config.scoring.aggregation.technical,
        config.scoring.aggregation.fundamental
    );
    tracing::info!("  History: {} days", config.scoring.history_days);

    let daily = run(&data_dir, as_of, &config).await?;
    let params = &config.scoring.screening;
    let report = DailyReport {
        as_of,
        recommendations: &daily.outcome.recommendations,
        buy_candidates: buy_candidates(&daily.outcome.recommendations, params),
        sell_candidates: sell_candidates(&daily.outcome.recommendations, &daily.held, params),
        failures: &daily.outcome.failures,
        realized_pnl: daily.realized_pnl,
        indicators: with_indicators.then_some(daily.outcome.indicator_sets.as_slice()),
    };

    tracing::info!(
        "{} recommendations, {} buy candidates, {} sell candidates, {} failures",
        report.recommendations.len(),
        report.buy_candidates.len(),
        report.sell_candidates.len(),
        report.failures.len()
    );

    let json = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

struct DailyRun {
    outcome: BatchOutcome,
    held: BTreeSet<String>,
    realized_pnl: f64,
}

/// Scores the configured symbols from `data_dir` and replays its holdings.
async fn run(data_dir: &Path, as_of: NaiveDate, config: &AnalyzerConfig) -> Result<DailyRun> {
    let source = Arc::new(JsonDirSource::new(data_dir));
    let symbols: BTreeSet<String> = match &config.watchlist {
        Some(watchlist) => watchlist.iter().cloned().collect(),
        None => source
            .symbols()
            .with_context(|| format!("Failed to list symbols in {}", data_dir.display()))?,
    };
    if symbols.is_empty() {
        tracing::warn!("No symbols to analyze in {}", data_dir.display());
    }

    let engine = ScoringEngine::new(config.scoring.clone())?;
    let outcome = engine.evaluate(source, &BatchRequest { symbols, as_of }).await;

    let ledger = holdings::load_ledger(&data_dir.join("holdings.json"))?;

    Ok(DailyRun {
        outcome,
        held: ledger.held_symbols(),
        realized_pnl: ledger.total_realized_pnl(),
    })
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{RecommendationTier, ScoringConfig};

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn config(watchlist: Option<Vec<&str>>) -> AnalyzerConfig {
        AnalyzerConfig {
            scoring: ScoringConfig::default(),
            watchlist: watchlist.map(|w| w.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_arg_value() {
        let args: Vec<String> = ["bin", "--data-dir", "/tmp/x", "--out"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(arg_value(&args, "--data-dir"), Some("/tmp/x"));
        assert_eq!(arg_value(&args, "--out"), None);
        assert_eq!(arg_value(&args, "--as-of"), None);
    }

    #[tokio::test]
    async fn test_run_scores_directory_and_holdings() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "fundamentals/GOOD.json",
            r#"{"pe_ratio": 12.0, "profit_margin": 0.22, "revenue_growth": 0.18, "debt_to_equity": 0.3}"#,
        );
        write(
            dir.path(),
            "fundamentals/WEAK.json",
            r#"{"pe_ratio": -5.0, "revenue_growth": -0.2, "debt_to_equity": 3.0}"#,
        );
        write(dir.path(), "prices/BAD.json", "not json");
        write(
            dir.path(),
            "holdings.json",
            r#"[
                {"symbol": "WEAK", "purchase_date": "2024-01-02", "purchase_price": 50.0, "quantity": 10},
                {"symbol": "GOOD", "purchase_date": "2024-01-02", "purchase_price": 20.0, "quantity": 5,
                 "sell": {"date": "2024-02-01", "price": 30.0, "quantity": 5}}
            ]"#,
        );

        let as_of = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let config = config(None);
        let daily = run(dir.path(), as_of, &config).await.unwrap();

        let symbols: Vec<&str> = daily.outcome.recommendations.iter().map(|r| r.symbol()).collect();
        assert_eq!(symbols, vec!["GOOD", "WEAK"]);
        assert_eq!(daily.outcome.failures.len(), 1);
        assert_eq!(daily.outcome.failures[0].symbol, "BAD");
        assert_eq!(daily.realized_pnl, 50.0);

        let good = &daily.outcome.recommendations[0];
        assert_eq!(good.tier(), RecommendationTier::StrongBuy);
        assert_eq!(good.date(), as_of);

        let params = &config.scoring.screening;
        let buys: Vec<&str> = buy_candidates(&daily.outcome.recommendations, params)
            .iter()
            .map(|r| r.symbol())
            .collect();
        assert_eq!(buys, vec!["GOOD"]);
        let sells: Vec<&str> = sell_candidates(&daily.outcome.recommendations, &daily.held, params)
            .iter()
            .map(|r| r.symbol())
            .collect();
        assert_eq!(sells, vec!["WEAK"]);
    }

    #[tokio::test]
    async fn test_watchlist_limits_symbols() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fundamentals/GOOD.json", r#"{"pe_ratio": 12.0}"#);
        write(dir.path(), "fundamentals/OTHER.json", r#"{"pe_ratio": 30.0}"#);

        let as_of = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let daily = run(dir.path(), as_of, &config(Some(vec!["OTHER"]))).await.unwrap();

        assert_eq!(daily.outcome.recommendations.len(), 1);
        assert_eq!(daily.outcome.recommendations[0].symbol(), "OTHER");
        assert!(daily.held.is_empty());
    }
}
