use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use analysis_core::{AnalysisError, FundamentalSnapshot, MarketDataSource, PriceBar, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Reads fixtures laid out as `prices/<SYMBOL>.json` (array of bars) and
/// `fundamentals/<SYMBOL>.json` (one snapshot).
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn price_path(&self, symbol: &str) -> PathBuf {
        self.root.join("prices").join(format!("{}.json", symbol))
    }

    fn fundamentals_path(&self, symbol: &str) -> PathBuf {
        self.root.join("fundamentals").join(format!("{}.json", symbol))
    }

    /// Every symbol with a price or fundamentals file.
    pub fn symbols(&self) -> std::io::Result<BTreeSet<String>> {
        let mut symbols = BTreeSet::new();
        for dir in ["prices", "fundamentals"] {
            let path = self.root.join(dir);
            if !path.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&path)? {
                let file = entry?.path();
                if file.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                        symbols.insert(stem.to_string());
                    }
                }
            }
        }
        Ok(symbols)
    }
}

/// File contents, or `None` when the file does not exist.
async fn read_optional(path: &Path) -> Result<Option<String>, AnalysisError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AnalysisError::Source(format!("{}: {}", path.display(), e))),
    }
}

#[async_trait]
impl MarketDataSource for JsonDirSource {
    async fn get_price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError> {
        let path = self.price_path(symbol);
        let Some(raw) = read_optional(&path).await? else {
            tracing::debug!("{}: no price file at {}", symbol, path.display());
            return Ok(PriceSeries::empty(symbol));
        };

        let bars: Vec<PriceBar> = serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::Source(format!("{}: {}", path.display(), e)))?;
        let bars = bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();

        PriceSeries::new(symbol, bars)
    }

    async fn get_fundamental_snapshot(&self, symbol: &str) -> Result<FundamentalSnapshot, AnalysisError> {
        let path = self.fundamentals_path(symbol);
        let Some(raw) = read_optional(&path).await? else {
            tracing::debug!("{}: no fundamentals file at {}", symbol, path.display());
            return Ok(FundamentalSnapshot::new(symbol));
        };

        let mut snapshot: FundamentalSnapshot = serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::Source(format!("{}: {}", path.display(), e)))?;
        if snapshot.symbol.is_empty() {
            snapshot.symbol = symbol.to_string();
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    const BARS: &str = r#"[
        {"date": "2024-01-02", "open": 10.0, "high": 11.0, "low": 9.5, "close": 10.5, "volume": 1000},
        {"date": "2024-01-03", "open": 10.5, "high": 11.5, "low": 10.0, "close": 11.0, "volume": 1200},
        {"date": "2024-01-04", "open": 11.0, "high": 12.0, "low": 10.5, "close": -1.0, "volume": 900}
    ]"#;

    #[tokio::test]
    async fn test_reads_and_windows_price_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prices/ACME.json", BARS);
        let source = JsonDirSource::new(dir.path());

        let series = source.get_price_series("ACME", day(3), day(31)).await.unwrap();
        // 01-02 is outside the window, 01-04 has a negative close
        assert_eq!(series.len(), 1);
        assert_eq!(series.dropped_bars(), 1);
        assert_eq!(series.closes(), vec![11.0]);
    }

    #[tokio::test]
    async fn test_missing_files_are_empty_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirSource::new(dir.path());

        assert!(source.get_price_series("NONE", day(1), day(31)).await.unwrap().is_empty());
        let snapshot = source.get_fundamental_snapshot("NONE").await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.symbol, "NONE");
    }

    #[tokio::test]
    async fn test_partial_snapshot_and_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fundamentals/ACME.json", r#"{"pe_ratio": 12.0, "beta": 1.1}"#);
        write(dir.path(), "fundamentals/BROKEN.json", "{ not json");
        let source = JsonDirSource::new(dir.path());

        let snapshot = source.get_fundamental_snapshot("ACME").await.unwrap();
        assert_eq!(snapshot.symbol, "ACME");
        assert_eq!(snapshot.pe_ratio, Some(12.0));
        assert_eq!(snapshot.profit_margin, None);

        assert!(matches!(
            source.get_fundamental_snapshot("BROKEN").await,
            Err(AnalysisError::Source(_))
        ));
    }

    #[test]
    fn test_symbols_from_both_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prices/AAA.json", "[]");
        write(dir.path(), "fundamentals/BBB.json", "{}");
        write(dir.path(), "fundamentals/notes.txt", "ignored");
        let source = JsonDirSource::new(dir.path());

        let symbols: Vec<String> = source.symbols().unwrap().into_iter().collect();
        assert_eq!(symbols, vec!["AAA".to_string(), "BBB".to_string()]);
    }
}
