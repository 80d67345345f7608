//! Chunking, index, retrieval, expansion, rerank, diversity, and
//! formatting configuration

use serde::{Deserialize, Serialize};

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in chars; parents at or under this size are
    /// indexed whole, larger parents are split into children at roughly
    /// half this size
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive child chunks, in chars
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Fragments shorter than this (trimmed) are dropped as noise
    #[serde(default = "default_min_fragment_chars")]
    pub min_fragment_chars: usize,
    /// Length of the parent preview stored on child chunks
    #[serde(default = "default_parent_preview_chars")]
    pub parent_preview_chars: usize,
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    120
}

fn default_min_fragment_chars() -> usize {
    20
}

fn default_parent_preview_chars() -> usize {
    240
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_fragment_chars: default_min_fragment_chars(),
            parent_preview_chars: default_parent_preview_chars(),
        }
    }
}

/// Dense (HNSW) index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// HNSW M parameter (connections per layer)
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    #[serde(default = "default_hnsw_ef_search")]
    pub hnsw_ef_search: usize,
}

fn default_hnsw_m() -> usize {
    16
}

fn default_hnsw_ef_construction() -> usize {
    200
}

fn default_hnsw_ef_search() -> usize {
    100
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            hnsw_ef_search: default_hnsw_ef_search(),
        }
    }
}

/// Retrieval, fusion, and merge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Enable dense (vector) retrieval
    #[serde(default = "default_true")]
    pub enable_dense: bool,
    /// Enable lexical (BM25) retrieval
    #[serde(default = "default_true")]
    pub enable_lexical: bool,
    /// Weight of the normalized dense score in fusion; lexical gets the rest
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,
    /// Scale for the lexical sigmoid squash
    #[serde(default = "default_lexical_scale")]
    pub lexical_scale: f32,
    /// Each index is asked for k * overfetch_factor candidates to leave
    /// room for dedup and rerank losses
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// Same-source candidates within this sibling-index distance merge
    #[serde(default = "default_max_merge_gap")]
    pub max_merge_gap: usize,
    /// Normalized-text prefix length used for exact-duplicate detection
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_dense_weight() -> f32 {
    0.6
}

fn default_lexical_scale() -> f32 {
    10.0
}

fn default_overfetch_factor() -> usize {
    4
}

fn default_max_merge_gap() -> usize {
    3
}

fn default_dedup_prefix_chars() -> usize {
    160
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enable_dense: true,
            enable_lexical: true,
            dense_weight: default_dense_weight(),
            lexical_scale: default_lexical_scale(),
            overfetch_factor: default_overfetch_factor(),
            max_merge_gap: default_max_merge_gap(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
        }
    }
}

/// Query expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Total number of query variants, original included
    #[serde(default = "default_num_variants")]
    pub num_variants: usize,
    /// Paraphrases shorter than this are discarded
    #[serde(default = "default_min_variant_chars")]
    pub min_variant_chars: usize,
    /// Timeout for each expansion service call
    #[serde(default = "default_expansion_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_num_variants() -> usize {
    3
}

fn default_min_variant_chars() -> usize {
    10
}

fn default_expansion_timeout_secs() -> u64 {
    15
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            num_variants: default_num_variants(),
            min_variant_chars: default_min_variant_chars(),
            timeout_secs: default_expansion_timeout_secs(),
        }
    }
}

/// Reranking configuration
///
/// The blend constants are tuning knobs, not invariants; the only
/// guarantee is that the output is sorted by the combined score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Weight of the rerank score in the combined score; fused gets the rest
    #[serde(default = "default_rerank_weight")]
    pub rerank_weight: f32,
    /// Small positional bonus for rank stability
    #[serde(default = "default_position_epsilon")]
    pub position_epsilon: f32,
    /// Per-candidate text preview length sent to the scoring service
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Timeout for the rerank service call
    #[serde(default = "default_rerank_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rerank_weight() -> f32 {
    0.6
}

fn default_position_epsilon() -> f32 {
    0.01
}

fn default_preview_chars() -> usize {
    500
}

fn default_rerank_timeout_secs() -> u64 {
    20
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            rerank_weight: default_rerank_weight(),
            position_epsilon: default_position_epsilon(),
            preview_chars: default_preview_chars(),
            timeout_secs: default_rerank_timeout_secs(),
        }
    }
}

/// Source diversity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityConfig {
    /// Minimum number of distinct sources the final result set should
    /// touch, when the candidate pool has that many
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
}

fn default_min_sources() -> usize {
    3
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
        }
    }
}

/// Result formatting configuration
///
/// The tier thresholds apply to the final score on both the reranked and
/// the fused-only path, so tier meaning is stable across the two. They
/// are defaults, not validated constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_excellent_threshold")]
    pub excellent_threshold: f32,
    #[serde(default = "default_good_threshold")]
    pub good_threshold: f32,
    #[serde(default = "default_fair_threshold")]
    pub fair_threshold: f32,
}

fn default_excellent_threshold() -> f32 {
    0.70
}

fn default_good_threshold() -> f32 {
    0.50
}

fn default_fair_threshold() -> f32 {
    0.30
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            excellent_threshold: default_excellent_threshold(),
            good_threshold: default_good_threshold(),
            fair_threshold: default_fair_threshold(),
        }
    }
}
