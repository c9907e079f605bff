//! Heuristic reliability score for an answer's supporting fragments.

use crate::analyzer::QuestionAnalysis;
use crate::fragment::RetrievedResult;

/// Most a broad question can gain from coverage.
const MAX_BREADTH_BONUS: f32 = 0.2;

/// Result count at which the breadth bonus saturates.
const BREADTH_SATURATION: f32 = 20.0;

/// Best similarity above which a narrow question is boosted.
const STRONG_MATCH: f32 = 0.8;

/// Score the result set in `[0, 1]`, rounded to two decimals.
///
/// Weighs average and best similarity equally (0.4 each) plus 0.2 for how
/// close the count is to `base_top_k`. Broad questions gain up to 0.2 for
/// coverage; narrow questions with a strong best match are scaled by 1.1.
/// An empty set scores 0.
pub fn score(results: &[RetrievedResult], analysis: &QuestionAnalysis, base_top_k: usize) -> f32 {
    if results.is_empty() {
        return 0.0;
    }

    let count = results.len() as f32;
    let similarities = results.iter().map(RetrievedResult::similarity);
    let average = similarities.clone().sum::<f32>() / count;
    let best = similarities.fold(f32::NEG_INFINITY, f32::max);
    let coverage = (count / base_top_k.max(1) as f32).min(1.0);

    let mut confidence = 0.4 * average + 0.4 * best + 0.2 * coverage;

    if analysis.is_broad {
        confidence += (count / BREADTH_SATURATION).min(MAX_BREADTH_BONUS);
    } else if best > STRONG_MATCH {
        confidence *= 1.1;
    }

    (confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
