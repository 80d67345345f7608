//! Hybrid retrieval combining dense and lexical search across query variants

use super::fusion::fuse_scores;
use crate::config::RetrievalConfig;
use crate::index::SearchIndex;
use crate::services::EmbeddingBackend;
use crate::types::{Candidate, ChunkId, SearchOptions};
use crate::util::truncate_str;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hybrid retrieval engine executing every query variant against both
/// indices and fusing the score spaces into one candidate list
pub struct HybridRetriever {
    index: Arc<SearchIndex>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<SearchIndex>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    /// Retrieve fused candidates for a set of query variants.
    ///
    /// Each index is over-fetched to leave room for dedup and rerank
    /// losses. Results are unioned by chunk identity across variants:
    /// a later occurrence only updates a score it improves on, and the
    /// fused score is recomputed from the best components.
    ///
    /// Degradation is per-path: an absent or failing embedding service
    /// drops to lexical-only, a disabled or absent lexical index drops
    /// to dense-only.
    pub async fn retrieve(
        &self,
        variants: &[String],
        k: usize,
        options: &SearchOptions,
    ) -> Vec<Candidate> {
        if variants.is_empty() || k == 0 {
            return Vec::new();
        }

        let fetch_k = k.saturating_mul(self.config.overfetch_factor).max(k);
        let use_dense = self.config.enable_dense && self.index.has_dense();
        let use_lexical =
            self.config.enable_lexical && options.use_hybrid && self.index.has_lexical();

        // Embed all variants in one batch; failure degrades to lexical-only
        let variant_embeddings = if use_dense {
            match &self.embedder {
                Some(embedder) => match embedder.embed_batch(variants).await {
                    Ok(embeddings) => Some(embeddings),
                    Err(e) => {
                        warn!("Query embedding failed: {}. Falling back to lexical search.", e);
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };

        // Best observed component scores per chunk across all variants
        let mut best_dense: HashMap<ChunkId, f32> = HashMap::new();
        let mut best_lexical: HashMap<ChunkId, f32> = HashMap::new();

        for (i, variant) in variants.iter().enumerate() {
            if let Some(embeddings) = &variant_embeddings {
                if let Some(embedding) = embeddings.get(i) {
                    match self.index.dense_search(embedding, fetch_k) {
                        Ok(results) => {
                            debug!(
                                "Dense search for variant {}: {} results",
                                i,
                                results.len()
                            );
                            for r in results {
                                best_dense
                                    .entry(r.chunk_id)
                                    .and_modify(|d| *d = d.min(r.distance))
                                    .or_insert(r.distance);
                            }
                        }
                        Err(e) => warn!("Dense search failed for variant {}: {}", i, e),
                    }
                }
            }

            if use_lexical {
                match self.index.lexical_search(variant, fetch_k) {
                    Ok(results) => {
                        debug!(
                            "Lexical search for variant {}: {} results",
                            i,
                            results.len()
                        );
                        for r in results {
                            best_lexical
                                .entry(r.chunk_id)
                                .and_modify(|s| *s = s.max(r.score))
                                .or_insert(r.score);
                        }
                    }
                    Err(e) => warn!("Lexical search failed for variant {}: {}", i, e),
                }
            }
        }

        // Union by chunk identity, fusing from the best components
        let arena = self.index.arena();
        let mut chunk_ids: Vec<&ChunkId> = best_dense.keys().chain(best_lexical.keys()).collect();
        chunk_ids.sort();
        chunk_ids.dedup();

        let mut candidates: Vec<Candidate> = chunk_ids
            .into_iter()
            .filter_map(|chunk_id| {
                let chunk = arena.get(chunk_id)?;
                let mut candidate = Candidate::from_chunk(chunk);
                candidate.dense_distance = best_dense.get(chunk_id).copied();
                candidate.lexical_score = best_lexical.get(chunk_id).copied();
                candidate.fused_score = fuse_scores(
                    candidate.dense_distance,
                    candidate.lexical_score,
                    &self.config,
                );
                candidate.combined_score = candidate.fused_score;
                Some(candidate)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            "Hybrid retrieval for '{}' ({} variants): {} candidates",
            truncate_str(&variants[0], 50),
            variants.len(),
            candidates.len()
        );

        candidates
    }
}
