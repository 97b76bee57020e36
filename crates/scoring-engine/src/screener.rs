use std::collections::BTreeSet;

use analysis_core::{Recommendation, ScreeningParams};

/// Buy-rated recommendations scoring at least `min_buy_score`, best first,
/// capped at `top_n`. Ties are broken by symbol.
pub fn buy_candidates<'a>(recommendations: &'a [Recommendation], params: &ScreeningParams) -> Vec<&'a Recommendation> {
    let mut candidates: Vec<&Recommendation> = recommendations
        .iter()
        .filter(|r| r.tier().is_buy() && r.overall_score() >= params.min_buy_score)
        .collect();

    candidates.sort_by(|a, b| {
        b.overall_score()
            .total_cmp(&a.overall_score())
            .then_with(|| a.symbol().cmp(b.symbol()))
    });
    candidates.truncate(params.top_n);

    tracing::debug!(
        "{} buy candidates out of {} recommendations",
        candidates.len(),
        recommendations.len()
    );
    candidates
}

/// Held symbols that are sell-rated or score at most `max_sell_score`,
/// weakest first.
pub fn sell_candidates<'a>(
    recommendations: &'a [Recommendation],
    held_symbols: &BTreeSet<String>,
    params: &ScreeningParams,
) -> Vec<&'a Recommendation> {
    let mut candidates: Vec<&Recommendation> = recommendations
        .iter()
        .filter(|r| held_symbols.contains(r.symbol()))
        .filter(|r| r.tier().is_sell() || r.overall_score() <= params.max_sell_score)
        .collect();

    candidates.sort_by(|a, b| {
        a.overall_score()
            .total_cmp(&b.overall_score())
            .then_with(|| a.symbol().cmp(b.symbol()))
    });
    candidates
}
