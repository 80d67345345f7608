//! Final result formatting
//!
//! Projects candidates into user-facing items: attaches parent context
//! for child chunks and computes a confidence tier from the final score.
//! The tier bands are identical whether or not reranking ran, so tier
//! meaning is stable across both code paths.

use crate::config::FormatConfig;
use crate::types::{Candidate, ConfidenceTier, ResultItem, RerankMode};

/// Label prefixing the parent context inside `enhanced_text`
const CONTEXT_LABEL: &str = "[Context] ";

/// Compute the confidence tier for a final score
pub fn confidence_tier(score: f32, config: &FormatConfig) -> ConfidenceTier {
    if score >= config.excellent_threshold {
        ConfidenceTier::Excellent
    } else if score >= config.good_threshold {
        ConfidenceTier::Good
    } else if score >= config.fair_threshold {
        ConfidenceTier::Fair
    } else {
        ConfidenceTier::Low
    }
}

/// Render the final candidate list into result items.
///
/// The tier score is the combined score when reranking contributed
/// (applied or fused fallback) and the fused score when the stage was
/// skipped; both live on the same scale, so the bands are shared.
pub fn format_results(
    candidates: Vec<Candidate>,
    rerank: RerankMode,
    config: &FormatConfig,
) -> Vec<ResultItem> {
    candidates
        .into_iter()
        .map(|candidate| {
            let score = match rerank {
                RerankMode::Applied | RerankMode::FusedFallback => candidate.combined_score,
                RerankMode::Skipped => candidate.fused_score,
            };

            let parent_context = if candidate.is_parent {
                None
            } else {
                candidate.parent_preview.clone()
            };

            let enhanced_text = match &parent_context {
                Some(context) => {
                    format!("{}\n\n{}{}", candidate.text, CONTEXT_LABEL, context)
                }
                None => candidate.text.clone(),
            };

            ResultItem {
                text: candidate.text,
                enhanced_text,
                source_id: candidate.source_id,
                score,
                confidence_tier: confidence_tier(score, config),
                merged_count: candidate.merged_count,
                parent_context,
            }
        })
        .collect()
}
