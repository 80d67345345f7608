//! Candidate deduplication and adjacent-chunk merging
//!
//! Two collapses run here: exact duplicates (same normalized text
//! prefix) keep only the better-scoring instance, and same-source
//! candidates whose chunk positions nearly touch are merged back into
//! one item, reconstructing context the chunker split apart.
//!
//! Merging never crosses source boundaries and never reorders text
//! within a group; running the pass twice changes nothing.

use crate::config::RetrievalConfig;
use crate::types::Candidate;
use crate::util::normalize_text;
use std::collections::HashMap;
use tracing::debug;

/// Visible separator between texts joined by an adjacency merge
const MERGE_SEPARATOR: &str = "\n[...]\n";

/// Collapse duplicates and, when `merge_adjacent` is set, merge
/// same-source candidates within `max_merge_gap` positions of each other.
pub fn merge_candidates(
    candidates: Vec<Candidate>,
    merge_adjacent: bool,
    config: &RetrievalConfig,
) -> Vec<Candidate> {
    let before = candidates.len();

    let deduped = drop_exact_duplicates(candidates, config.dedup_prefix_chars);
    let merged = if merge_adjacent {
        merge_adjacent_chunks(deduped, config.max_merge_gap)
    } else {
        deduped
    };

    let mut result = merged;
    result.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if result.len() != before {
        debug!("Merge pass: {} candidates -> {}", before, result.len());
    }

    result
}

/// Keep the best-scoring instance of each normalized text prefix
fn drop_exact_duplicates(candidates: Vec<Candidate>, prefix_chars: usize) -> Vec<Candidate> {
    let mut best_by_key: HashMap<String, Candidate> = HashMap::new();

    for candidate in candidates {
        let normalized = normalize_text(&candidate.text);
        let key: String = normalized.chars().take(prefix_chars).collect();

        match best_by_key.get(&key) {
            Some(existing) if existing.fused_score >= candidate.fused_score => {}
            _ => {
                best_by_key.insert(key, candidate);
            }
        }
    }

    best_by_key.into_values().collect()
}

/// Merge same-source candidates whose ordinals are within `max_gap`.
///
/// Groups are chains: a candidate joins a group when its ordinal is
/// within the gap of the group's nearest member. Text is concatenated
/// in ordinal order; scores take the best of the constituents.
fn merge_adjacent_chunks(candidates: Vec<Candidate>, max_gap: usize) -> Vec<Candidate> {
    let mut by_source: HashMap<String, Vec<Candidate>> = HashMap::new();
    for candidate in candidates {
        by_source
            .entry(candidate.source_id.clone())
            .or_default()
            .push(candidate);
    }

    let mut result = Vec::new();

    for (_, mut group) in by_source {
        group.sort_by_key(|c| c.ordinal);

        let mut cluster: Vec<Candidate> = Vec::new();
        for candidate in group {
            let chain_continues = cluster
                .last()
                .is_some_and(|last| candidate.ordinal - last.ordinal <= max_gap);

            if chain_continues {
                cluster.push(candidate);
            } else {
                if !cluster.is_empty() {
                    result.push(merge_cluster(std::mem::take(&mut cluster)));
                }
                cluster.push(candidate);
            }
        }
        if !cluster.is_empty() {
            result.push(merge_cluster(cluster));
        }
    }

    result
}

/// Combine a cluster of ordinal-sorted candidates into one.
/// Single-element clusters pass through untouched.
fn merge_cluster(cluster: Vec<Candidate>) -> Candidate {
    if cluster.len() == 1 {
        return cluster.into_iter().next().expect("cluster is non-empty");
    }

    let text = cluster
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(MERGE_SEPARATOR);

    let best_idx = cluster
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.fused_score
                .partial_cmp(&b.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let merged_count: usize = cluster.iter().map(|c| c.merged_count).sum();
    let ordinal = cluster.iter().map(|c| c.ordinal).min().unwrap_or(0);
    let dense_distance = cluster
        .iter()
        .filter_map(|c| c.dense_distance)
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let lexical_score = cluster
        .iter()
        .filter_map(|c| c.lexical_score)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let fused_score = cluster
        .iter()
        .map(|c| c.fused_score)
        .fold(f32::MIN, f32::max);

    let best = &cluster[best_idx];
    Candidate {
        chunk_id: best.chunk_id.clone(),
        source_id: best.source_id.clone(),
        ordinal,
        text,
        is_parent: best.is_parent,
        parent_ref: best.parent_ref.clone(),
        parent_preview: best.parent_preview.clone(),
        dense_distance,
        lexical_score,
        fused_score,
        rerank_score: None,
        combined_score: fused_score,
        merged_count,
    }
}
