use std::env;
use std::str::FromStr;

use analysis_core::ScoringConfig;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub scoring: ScoringConfig,
    /// Symbols to analyze; `None` means every symbol found in the data dir.
    pub watchlist: Option<Vec<String>>,
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value lookup. `SCORING_CONFIG` names a
    /// JSON file used as the base; individual keys override it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut scoring: ScoringConfig = match lookup("SCORING_CONFIG") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read scoring config {}", path))?;
                serde_json::from_str(&raw).with_context(|| format!("Failed to parse scoring config {}", path))?
            }
            None => ScoringConfig::default(),
        };

        let technical: Option<f64> = parse_var(&lookup, "TECHNICAL_WEIGHT")?;
        let fundamental: Option<f64> = parse_var(&lookup, "FUNDAMENTAL_WEIGHT")?;
        match (technical, fundamental) {
            (Some(t), Some(f)) => {
                scoring.aggregation.technical = t;
                scoring.aggregation.fundamental = f;
            }
            // one side given: the other takes the remainder
            (Some(t), None) => {
                scoring.aggregation.technical = t;
                scoring.aggregation.fundamental = 1.0 - t;
            }
            (None, Some(f)) => {
                scoring.aggregation.technical = 1.0 - f;
                scoring.aggregation.fundamental = f;
            }
            (None, None) => {}
        }

        let p = &mut scoring.indicators;
        override_var(&lookup, "RSI_PERIOD", &mut p.rsi_period)?;
        override_var(&lookup, "RSI_OVERSOLD", &mut p.rsi_oversold)?;
        override_var(&lookup, "RSI_OVERBOUGHT", &mut p.rsi_overbought)?;
        override_var(&lookup, "VOLUME_SPIKE_THRESHOLD", &mut p.volume_spike_ratio)?;
        override_var(&lookup, "HISTORY_DAYS", &mut scoring.history_days)?;
        override_var(&lookup, "MIN_BUY_SCORE", &mut scoring.screening.min_buy_score)?;
        override_var(&lookup, "MAX_SELL_SCORE", &mut scoring.screening.max_sell_score)?;
        override_var(&lookup, "TOP_N", &mut scoring.screening.top_n)?;

        scoring.validate().context("Invalid scoring configuration")?;

        let watchlist = lookup("WATCHLIST")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|symbols| !symbols.is_empty());

        Ok(Self { scoring, watchlist })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn override_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = parse_var(lookup, key)? {
        *slot = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.scoring, ScoringConfig::default());
        assert!(config.watchlist.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("TECHNICAL_WEIGHT", "0.5"),
            ("RSI_PERIOD", "10"),
            ("HISTORY_DAYS", "400"),
            ("WATCHLIST", "aapl, msft,,"),
        ]))
        .unwrap();

        assert_eq!(config.scoring.aggregation.technical, 0.5);
        assert_eq!(config.scoring.aggregation.fundamental, 0.5);
        assert_eq!(config.scoring.indicators.rsi_period, 10);
        assert_eq!(config.scoring.history_days, 400);
        assert_eq!(config.watchlist, Some(vec!["AAPL".to_string(), "MSFT".to_string()]));
    }

    #[test]
    fn test_rejects_unparseable_value() {
        let err = AnalyzerConfig::from_lookup(lookup_from(&[("RSI_PERIOD", "fourteen")])).unwrap_err();
        assert!(err.to_string().contains("RSI_PERIOD"));
    }

    #[test]
    fn test_rejects_nan_weight_and_oversized_history() {
        assert!(AnalyzerConfig::from_lookup(lookup_from(&[("TECHNICAL_WEIGHT", "nan")])).is_err());
        assert!(AnalyzerConfig::from_lookup(lookup_from(&[("HISTORY_DAYS", "100000000")])).is_err());
    }

    #[test]
    fn test_rejects_unbalanced_weights() {
        let result = AnalyzerConfig::from_lookup(lookup_from(&[
            ("TECHNICAL_WEIGHT", "0.7"),
            ("FUNDAMENTAL_WEIGHT", "0.7"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_reads_json_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "thresholds": {{ "strong_buy": 85.0 }}, "coverage_floor": 0.3 }}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("SCORING_CONFIG", path.as_str()),
            ("MIN_BUY_SCORE", "70"),
        ]))
        .unwrap();

        assert_eq!(config.scoring.thresholds.strong_buy, 85.0);
        assert_eq!(config.scoring.thresholds.buy, 65.0);
        assert_eq!(config.scoring.coverage_floor, 0.3);
        assert_eq!(config.scoring.screening.min_buy_score, 70.0);
    }
}
