//! LLM reranking with defensive response parsing
//!
//! The fused candidate list is re-scored against the original query by
//! an external completion service. The service's output is untrusted
//! text: parsing walks a ladder from strict JSON down to "grab the
//! numbers", and when nothing usable comes back the stage substitutes
//! deterministic scores derived from fusion. A query never fails here.

use crate::config::RerankConfig;
use crate::services::CompletionBackend;
use crate::types::{Candidate, RerankMode};
use crate::util::truncate_str;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Reranks fused candidates via an external relevance-scoring service
pub struct LlmReranker {
    completion: Option<Arc<dyn CompletionBackend>>,
    config: RerankConfig,
}

impl LlmReranker {
    pub fn new(completion: Option<Arc<dyn CompletionBackend>>, config: RerankConfig) -> Self {
        Self { completion, config }
    }

    /// Re-score candidates against the original (unexpanded) query.
    ///
    /// Returns the candidates sorted descending by `combined_score`
    /// together with the mode that produced the ordering:
    /// - `Applied`: service scores parsed and blended with fusion
    /// - `FusedFallback`: service output unusable, ranking equals fusion
    /// - `Skipped`: no service, call failed, or call timed out
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<Candidate>,
    ) -> (Vec<Candidate>, RerankMode) {
        if candidates.is_empty() {
            return (candidates, RerankMode::Skipped);
        }

        let backend = match &self.completion {
            Some(b) => b,
            None => {
                sort_by_fused(&mut candidates);
                return (candidates, RerankMode::Skipped);
            }
        };

        let prompt = self.build_prompt(query, &candidates);
        let call_timeout = Duration::from_secs(self.config.timeout_secs);

        let response = match timeout(call_timeout, backend.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Rerank service failed: {}. Sorting by fused score.", e);
                sort_by_fused(&mut candidates);
                return (candidates, RerankMode::Skipped);
            }
            Err(_) => {
                warn!("Rerank service timed out. Sorting by fused score.");
                sort_by_fused(&mut candidates);
                return (candidates, RerankMode::Skipped);
            }
        };

        let mode = match parse_scores(&response, candidates.len()) {
            Some(scores) => {
                for (candidate, score) in candidates.iter_mut().zip(scores.iter()) {
                    candidate.rerank_score = Some(*score);
                }
                RerankMode::Applied
            }
            None => {
                warn!(
                    "Rerank response unusable for {} candidates. Falling back to fused ranking.",
                    candidates.len()
                );
                for candidate in candidates.iter_mut() {
                    candidate.rerank_score = Some(candidate.fused_score * 10.0);
                }
                RerankMode::FusedFallback
            }
        };

        self.blend_and_sort(&mut candidates);

        debug!(
            "Reranked {} candidates ({:?}), top combined score {:.3}",
            candidates.len(),
            mode,
            candidates.first().map(|c| c.combined_score).unwrap_or(0.0)
        );

        (candidates, mode)
    }

    fn build_prompt(&self, query: &str, candidates: &[Candidate]) -> String {
        let passages = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "Passage {}:\n{}",
                    i + 1,
                    truncate_str(&c.text, self.config.preview_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Given the user query and candidate passages, score each passage's \
             relevance to the query on a scale of 0-10. Output ONLY a JSON array \
             of numbers, one per passage, in order. Format: [score1, score2, ...]\n\n\
             Query: {}\n\nPassages:\n{}\n\nScores (0-10):",
            query, passages
        )
    }

    /// Blend rerank and fused scores, add the positional stability bonus,
    /// and sort descending by the combined score.
    ///
    /// Candidates arrive in fused order, so the bonus favors the
    /// pre-rerank ranking on near-ties.
    fn blend_and_sort(&self, candidates: &mut [Candidate]) {
        let n = candidates.len() as f32;
        let w = self.config.rerank_weight;
        let eps = self.config.position_epsilon;

        for (i, candidate) in candidates.iter_mut().enumerate() {
            let rerank_component = candidate.rerank_score.unwrap_or(0.0) / 10.0;
            let position_bonus = eps * (n - i as f32) / n;
            candidate.combined_score =
                w * rerank_component + (1.0 - w) * candidate.fused_score + position_bonus;
        }

        candidates.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

fn sort_by_fused(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for candidate in candidates.iter_mut() {
        candidate.combined_score = candidate.fused_score;
    }
}

/// Parse exactly `expected` scores out of untrusted service output.
///
/// Strategies, in order:
/// 1. strict JSON array parse of the whole (trimmed) response
/// 2. JSON parse of the outermost bracketed slice, after stripping
///    code fences
/// 3. regex extraction of all numbers, taking the first `expected`
///
/// Returns `None` when no strategy yields the expected count; scores
/// are clamped to [0, 10].
fn parse_scores(response: &str, expected: usize) -> Option<Vec<f32>> {
    let trimmed = response.trim();

    // Strategy 1: the whole response is a JSON array
    if let Ok(values) = serde_json::from_str::<Vec<f64>>(trimmed) {
        return check_count(values, expected);
    }

    // Strategy 2: bracketed slice inside wrapping (code fences, prose)
    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let (Some(start), Some(end)) = (unfenced.find('['), unfenced.rfind(']')) {
        if start < end {
            if let Ok(values) = serde_json::from_str::<Vec<f64>>(&unfenced[start..=end]) {
                return check_count(values, expected);
            }
        }
    }

    // Strategy 3: extract all numbers and take the first N
    let number_re = regex::Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex");
    let numbers: Vec<f32> = number_re
        .find_iter(unfenced)
        .filter_map(|m| m.as_str().parse::<f32>().ok())
        .collect();

    if numbers.len() >= expected {
        return Some(numbers.into_iter().take(expected).map(clamp_score).collect());
    }

    None
}

fn check_count(values: Vec<f64>, expected: usize) -> Option<Vec<f32>> {
    if values.len() == expected {
        Some(values.into_iter().map(|v| clamp_score(v as f32)).collect())
    } else {
        None
    }
}

fn clamp_score(score: f32) -> f32 {
    score.clamp(0.0, 10.0)
}
