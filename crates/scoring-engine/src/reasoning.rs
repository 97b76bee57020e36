use analysis_core::{ComponentScore, RecommendationTier, Signal};

const SECTION_SEPARATOR: &str = " || ";
const SIGNAL_SEPARATOR: &str = " | ";

/// Renders fired signals into the reasoning text of a recommendation.
///
/// Output depends only on the arguments, so identical scores always give
/// byte-identical text. Layout:
///
/// `BUY at 77.5/100 || Technical (62.5/100): ... || Fundamental (100.0/100): ...`
pub struct ReasoningGenerator {
    coverage_floor: f64,
}

impl ReasoningGenerator {
    pub fn new(coverage_floor: f64) -> Self {
        Self { coverage_floor }
    }

    pub fn generate(
        &self,
        tier: RecommendationTier,
        overall: f64,
        technical: Option<&ComponentScore>,
        fundamental: Option<&ComponentScore>,
    ) -> String {
        let mut sections = vec![format!("{} at {:.1}/100", tier, overall)];

        sections.push(match technical {
            Some(score) => {
                let mut items = ordered_explanations(&score.signals);
                if items.is_empty() {
                    items.push("No technical signals fired".to_string());
                }
                format!("Technical ({:.1}/100): {}", score.score, items.join(SIGNAL_SEPARATOR))
            }
            None => "Technical: insufficient price history for any indicator".to_string(),
        });

        sections.push(match fundamental {
            Some(score) => {
                let mut items = ordered_explanations(&score.signals);
                if items.is_empty() {
                    items.push("No fundamental signals fired".to_string());
                }
                if score.coverage.is_sparse(self.coverage_floor) {
                    items.push(format!(
                        "Limited data ({} of {} metrics), missing {}",
                        score.coverage.evaluated,
                        score.coverage.recognized,
                        score.coverage.missing.join(", ")
                    ));
                }
                format!("Fundamental ({:.1}/100): {}", score.score, items.join(SIGNAL_SEPARATOR))
            }
            None => "Fundamental: no fundamental data available".to_string(),
        });

        match (technical.is_some(), fundamental.is_some()) {
            (true, false) => sections.push("Partial coverage: score reflects technical analysis only".to_string()),
            (false, true) => sections.push("Partial coverage: score reflects fundamental analysis only".to_string()),
            _ => {}
        }

        sections.join(SECTION_SEPARATOR)
    }
}

/// Explanations in reporting order. The sort is stable, so signals of the
/// same kind keep the order the evaluator emitted them in.
fn ordered_explanations(signals: &[Signal]) -> Vec<String> {
    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by_key(|s| s.kind.order());
    ordered.iter().map(|s| s.explanation.clone()).collect()
}
