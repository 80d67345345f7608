//! Source diversity selection
//!
//! Re-picks the final top-K so a single source document cannot crowd
//! out the rest: the best candidate of each distinct source is seated
//! first, remaining slots backfill by overall rank.

use crate::types::Candidate;
use std::collections::HashSet;
use tracing::debug;

/// Select up to `k` candidates, touching at least `min(min_sources, k)`
/// distinct sources whenever the input offers that many.
///
/// Input is expected in rank order (best first); output is re-sorted
/// descending by combined score.
pub fn select_diverse(ranked: Vec<Candidate>, k: usize, min_sources: usize) -> Vec<Candidate> {
    if k == 0 || ranked.is_empty() {
        return Vec::new();
    }
    if ranked.len() <= k {
        return ranked;
    }

    let mut picked: Vec<Option<Candidate>> = ranked.into_iter().map(Some).collect();
    let mut selected: Vec<Candidate> = Vec::with_capacity(k);
    let mut seen_sources: HashSet<String> = HashSet::new();

    // First pass: best candidate per distinct source, in rank order
    for slot in picked.iter_mut() {
        if selected.len() >= k {
            break;
        }
        let source = match slot {
            Some(c) => c.source_id.clone(),
            None => continue,
        };
        if seen_sources.insert(source) {
            selected.push(slot.take().expect("slot checked above"));
        }
    }

    // Backfill remaining slots by overall rank, regardless of source
    for slot in picked.iter_mut() {
        if selected.len() >= k {
            break;
        }
        if let Some(candidate) = slot.take() {
            selected.push(candidate);
        }
    }

    selected.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let distinct = selected
        .iter()
        .map(|c| c.source_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    debug!(
        "Diversity selection: {} candidates from {} sources (min_sources={})",
        selected.len(),
        distinct,
        min_sources
    );

    selected
}
