use analysis_core::{
    AnalysisError, ComponentScore, Coverage, IndicatorSet, Polarity, PriceSeries, ScoringConfig, Signal,
    SignalKind, TechnicalSignal,
};
use serde::Serialize;

use crate::indicators::*;

/// Output of the indicator engine for one series
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalAnalysis {
    pub symbol: String,
    /// One entry per bar, in date order.
    pub indicators: Vec<IndicatorSet>,
    /// Sub-score as of the latest bar; `None` when no signal family could be evaluated.
    pub score: Option<ComponentScore>,
    /// Indicators omitted for lack of history, plus any dropped-bar notice.
    pub caveats: Vec<AnalysisError>,
}

impl TechnicalAnalysis {
    pub fn latest(&self) -> Option<&IndicatorSet> {
        self.indicators.last()
    }
}

/// Computes indicators from a price series and turns the latest bar into
/// directional signals and a technical sub-score.
pub struct IndicatorEngine<'a> {
    config: &'a ScoringConfig,
}

impl<'a> IndicatorEngine<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Bars each indicator needs before it produces a value.
    pub fn lookbacks(&self) -> Vec<(String, usize)> {
        let p = &self.config.indicators;
        vec![
            ("RSI".to_string(), p.rsi_period + 1),
            // a crossover compares the histogram on the last two bars
            ("MACD".to_string(), p.macd_slow + p.macd_signal),
            (format!("SMA{}", p.sma_short), p.sma_short),
            (format!("SMA{}", p.sma_medium), p.sma_medium),
            (format!("SMA{}", p.sma_long), p.sma_long),
            ("Bollinger".to_string(), p.bollinger_period),
            ("Stochastic".to_string(), p.stochastic_k),
            ("ATR".to_string(), p.atr_period),
            ("OBV".to_string(), 1),
            ("Volume ratio".to_string(), p.volume_period),
        ]
    }

    /// Per-bar indicator values. Fields whose lookback is not met stay `None`.
    pub fn compute(&self, series: &PriceSeries) -> Vec<IndicatorSet> {
        let p = &self.config.indicators;
        let bars = series.bars();
        let n = bars.len();
        let closes = series.closes();
        let volumes = series.volumes();

        let rsi_values = pad_front(&rsi(&closes, p.rsi_period), n);
        let macd_result = macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let macd_line = pad_front(&macd_result.macd_line, n);
        let macd_signal = pad_front(&macd_result.signal_line, n);
        let macd_histogram = pad_front(&macd_result.histogram, n);
        let sma_short = pad_front(&sma(&closes, p.sma_short), n);
        let sma_medium = pad_front(&sma(&closes, p.sma_medium), n);
        let sma_long = pad_front(&sma(&closes, p.sma_long), n);
        let bb = bollinger_bands(&closes, p.bollinger_period, p.bollinger_std_dev);
        let bb_upper = pad_front(&bb.upper, n);
        let bb_middle = pad_front(&bb.middle, n);
        let bb_lower = pad_front(&bb.lower, n);
        let stoch = stochastic(bars, p.stochastic_k, p.stochastic_d);
        let stoch_k = pad_front(&stoch.k, n);
        let stoch_d = pad_front(&stoch.d, n);
        let atr_values = pad_front(&atr(bars, p.atr_period), n);
        let obv_values = pad_front(&obv(bars), n);
        let volume_ratios: Vec<Option<f64>> = pad_front(&volume_ratio(&volumes, p.volume_period), n)
            .into_iter()
            .map(Option::flatten)
            .collect();

        bars.iter()
            .enumerate()
            .map(|(i, bar)| IndicatorSet {
                date: bar.date,
                close: bar.close,
                rsi: rsi_values[i],
                macd_line: macd_line[i],
                macd_signal: macd_signal[i],
                macd_histogram: macd_histogram[i],
                sma_short: sma_short[i],
                sma_medium: sma_medium[i],
                sma_long: sma_long[i],
                bb_upper: bb_upper[i],
                bb_middle: bb_middle[i],
                bb_lower: bb_lower[i],
                stoch_k: stoch_k[i],
                stoch_d: stoch_d[i],
                atr: atr_values[i],
                obv: obv_values[i],
                volume_ratio: volume_ratios[i],
            })
            .collect()
    }

    /// Full analysis as of the latest bar.
    pub fn analyze(&self, series: &PriceSeries) -> TechnicalAnalysis {
        let indicators = self.compute(series);
        let score = indicators
            .len()
            .checked_sub(1)
            .and_then(|last| self.score_at(&indicators, last));

        let mut caveats: Vec<AnalysisError> = self
            .lookbacks()
            .into_iter()
            .filter(|(_, required)| *required > series.len())
            .map(|(indicator, required)| AnalysisError::InsufficientHistory {
                indicator,
                required,
                available: series.len(),
            })
            .collect();
        if series.dropped_bars() > 0 {
            caveats.push(AnalysisError::InvalidPriceData(format!(
                "{} bars dropped before computation",
                series.dropped_bars()
            )));
        }

        if !caveats.is_empty() {
            tracing::debug!(
                "{}: {} indicator caveats over {} bars",
                series.symbol(),
                caveats.len(),
                series.len()
            );
        }
        if score.is_none() {
            tracing::info!("{}: no technical signal family could be evaluated", series.symbol());
        }

        TechnicalAnalysis {
            symbol: series.symbol().to_string(),
            indicators,
            score,
            caveats,
        }
    }

    /// Signals and sub-score as of `sets[index]`.
    ///
    /// Only families whose indicators are present at that bar enter the
    /// denominator; absent ones neither count as neutral nor move the 50
    /// baseline.
    pub fn score_at(&self, sets: &[IndicatorSet], index: usize) -> Option<ComponentScore> {
        let p = &self.config.indicators;
        let set = sets.get(index)?;
        let prev = index.checked_sub(1).and_then(|i| sets.get(i));
        let close = set.close;

        let mut signals: Vec<Signal> = Vec::new();
        let mut evaluated_weight = 0.0;
        let mut evaluated = 0;
        let mut recognized = 0;
        let mut missing: Vec<String> = Vec::new();

        for family in TechnicalSignal::ALL {
            let weight = self.config.technical_weight(family);
            if weight <= 0.0 {
                continue;
            }
            recognized += 1;

            let fired = match family {
                TechnicalSignal::Rsi => set.rsi.map(|rsi| {
                    if rsi < p.rsi_oversold {
                        Some(fire(
                            SignalKind::RsiOversold,
                            "oversold",
                            Polarity::Bullish,
                            rsi,
                            weight,
                            format!("RSI at {:.1} indicates oversold conditions", rsi),
                        ))
                    } else if rsi > p.rsi_overbought {
                        Some(fire(
                            SignalKind::RsiOverbought,
                            "overbought",
                            Polarity::Bearish,
                            rsi,
                            weight,
                            format!("RSI at {:.1} indicates overbought conditions", rsi),
                        ))
                    } else {
                        None
                    }
                }),
                TechnicalSignal::Macd => {
                    match (prev.and_then(|s| s.macd_histogram), set.macd_histogram) {
                        (Some(prev_hist), Some(hist)) => Some(if prev_hist <= 0.0 && hist > 0.0 {
                            Some(fire(
                                SignalKind::MacdBullishCrossover,
                                "MACD bullish crossover",
                                Polarity::Bullish,
                                hist,
                                weight,
                                format!("MACD bullish crossover with histogram turning positive at {:.3}", hist),
                            ))
                        } else if prev_hist >= 0.0 && hist < 0.0 {
                            Some(fire(
                                SignalKind::MacdBearishCrossover,
                                "MACD bearish crossover",
                                Polarity::Bearish,
                                hist,
                                weight,
                                format!("MACD bearish crossover with histogram turning negative at {:.3}", hist),
                            ))
                        } else {
                            None
                        }),
                        _ => None,
                    }
                }
                TechnicalSignal::Trend => match (set.sma_short, set.sma_medium) {
                    (Some(short), Some(medium)) => {
                        let mut averages = vec![(p.sma_short, short), (p.sma_medium, medium)];
                        if let Some(long) = set.sma_long {
                            averages.push((p.sma_long, long));
                        }
                        let names = join_averages(&averages);

                        Some(if averages.iter().all(|(_, avg)| close > *avg) {
                            Some(fire(
                                SignalKind::Uptrend,
                                "uptrend",
                                Polarity::Bullish,
                                close,
                                weight,
                                format!("Price {:.2} above {} indicates an uptrend", close, names),
                            ))
                        } else if averages.iter().all(|(_, avg)| close < *avg) {
                            Some(fire(
                                SignalKind::Downtrend,
                                "downtrend",
                                Polarity::Bearish,
                                close,
                                weight,
                                format!("Price {:.2} below {} indicates a downtrend", close, names),
                            ))
                        } else {
                            None
                        })
                    }
                    _ => None,
                },
                TechnicalSignal::Bollinger => match (set.bb_lower, set.bb_upper) {
                    // Zero-width bands (flat closes) carry no information.
                    (Some(lower), Some(upper)) => Some(if upper > lower && close <= lower {
                        Some(fire(
                            SignalKind::LowerBandTouch,
                            "oversold, lower band",
                            Polarity::Bullish,
                            close,
                            weight,
                            format!(
                                "Price {:.2} at or below the lower Bollinger band {:.2} (oversold, lower band)",
                                close, lower
                            ),
                        ))
                    } else if upper > lower && close >= upper {
                        Some(fire(
                            SignalKind::UpperBandTouch,
                            "overbought, upper band",
                            Polarity::Bearish,
                            close,
                            weight,
                            format!(
                                "Price {:.2} at or above the upper Bollinger band {:.2} (overbought, upper band)",
                                close, upper
                            ),
                        ))
                    } else {
                        None
                    }),
                    _ => None,
                },
            };

            match fired {
                Some(signal) => {
                    evaluated += 1;
                    evaluated_weight += weight;
                    signals.extend(signal);
                }
                None => missing.push(family.label().to_string()),
            }
        }

        if evaluated_weight <= 0.0 {
            return None;
        }

        // Volume never fires on its own; it only strengthens what already fired.
        if let Some(ratio) = set.volume_ratio {
            if ratio > p.volume_spike_ratio && !signals.is_empty() {
                for signal in signals.iter_mut() {
                    signal.contribution *= p.volume_amplifier;
                }
                let net: f64 = signals.iter().map(|s| s.contribution).sum();
                let polarity = if net > 0.0 {
                    Polarity::Bullish
                } else if net < 0.0 {
                    Polarity::Bearish
                } else {
                    Polarity::Neutral
                };
                signals.push(Signal {
                    kind: SignalKind::VolumeSurge,
                    label: "volume surge".to_string(),
                    polarity,
                    value: ratio,
                    contribution: 0.0,
                    explanation: format!(
                        "Volume at {:.1}x the {}-day average amplifies the {} signals",
                        ratio,
                        p.volume_period,
                        polarity.label()
                    ),
                });
            }
        }

        let net: f64 = signals.iter().map(|s| s.contribution).sum();
        let raw_score = 50.0 + 50.0 * net / evaluated_weight;

        Some(ComponentScore::new(
            raw_score,
            signals,
            Coverage {
                evaluated,
                recognized,
                missing,
            },
        ))
    }
}

fn fire(
    kind: SignalKind,
    label: &str,
    polarity: Polarity,
    value: f64,
    weight: f64,
    explanation: String,
) -> Signal {
    Signal {
        kind,
        label: label.to_string(),
        polarity,
        value,
        contribution: polarity.sign() * weight,
        explanation,
    }
}

fn join_averages(averages: &[(usize, f64)]) -> String {
    let names: Vec<String> = averages.iter().map(|(period, _)| format!("SMA{}", period)).collect();
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
