//! Core types for the Fathom retrieval pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a source document
pub type SourceId = String;

/// Unique identifier for a chunk
pub type ChunkId = String;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Kind of source document a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Plain,
    Pdf,
    Record,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Pdf => f.write_str("pdf"),
            Self::Record => f.write_str("record"),
        }
    }
}

/// Document to be ingested into the corpus
///
/// Immutable once created; re-ingesting a source replaces its chunks
/// wholesale rather than mutating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_id: SourceId,
    pub kind: DocumentKind,
    pub text: String,
    pub title: Option<String>,
    pub metadata: HashMap<String, String>,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source_id: uuid::Uuid::new_v4().to_string(),
            kind: DocumentKind::Plain,
            text: text.into(),
            title: None,
            metadata: HashMap::new(),
            ingested_at: Utc::now(),
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = id.into();
        self
    }

    pub fn with_kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A chunk of document text, the unit of indexing and retrieval
///
/// Chunks form a two-level hierarchy: parents cover the document in
/// contiguous spans, children subdivide oversized parents. Every
/// non-parent chunk points at a parent whose span contains its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub source_id: SourceId,
    pub text: String,
    /// Span in char offsets into the original document text
    pub char_span: (usize, usize),
    pub is_parent: bool,
    pub parent_ref: Option<ChunkId>,
    /// Position in the document's indexed-chunk sequence (parents that
    /// only serve as context carry their position in the parent sequence)
    pub sibling_index: usize,
    /// Truncated preview of the parent's full text, stored on children
    /// for context injection at format time
    pub parent_preview: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// A retrieval candidate, transient within a single query
///
/// Created fresh per query and discarded when the query completes;
/// never persisted or shared across queries.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub source_id: SourceId,
    /// Sibling index of the underlying chunk (minimum across a merged group)
    pub ordinal: usize,
    pub text: String,
    pub is_parent: bool,
    pub parent_ref: Option<ChunkId>,
    pub parent_preview: Option<String>,
    /// Best dense distance seen for this chunk (lower is better)
    pub dense_distance: Option<f32>,
    /// Best lexical score seen for this chunk (higher is better)
    pub lexical_score: Option<f32>,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
    pub combined_score: f32,
    /// Number of chunks merged into this candidate (1 = unmerged)
    pub merged_count: usize,
}

impl Candidate {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            source_id: chunk.source_id.clone(),
            ordinal: chunk.sibling_index,
            text: chunk.text.clone(),
            is_parent: chunk.is_parent,
            parent_ref: chunk.parent_ref.clone(),
            parent_preview: chunk.parent_preview.clone(),
            dense_distance: None,
            lexical_score: None,
            fused_score: 0.0,
            rerank_score: None,
            combined_score: 0.0,
            merged_count: 1,
        }
    }
}

/// Confidence tier computed from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    Excellent,
    Good,
    Fair,
    Low,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => f.write_str("excellent"),
            Self::Good => f.write_str("good"),
            Self::Fair => f.write_str("fair"),
            Self::Low => f.write_str("low"),
        }
    }
}

/// User-facing search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub text: String,
    /// Chunk text plus labeled parent context, when available
    pub enhanced_text: String,
    pub source_id: SourceId,
    pub score: f32,
    pub confidence_tier: ConfidenceTier,
    pub merged_count: usize,
    pub parent_context: Option<String>,
}

/// Whether and how reranking contributed to the final ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RerankMode {
    /// Reranker scores were parsed and applied
    Applied,
    /// Reranker output was unusable; ranking equals the fused ranking
    FusedFallback,
    /// Reranking stage did not run (disabled, unavailable, or timed out)
    Skipped,
}

/// Search response: ranked items plus the rerank outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<ResultItem>,
    pub rerank: RerankMode,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            rerank: RerankMode::Skipped,
        }
    }
}

/// Per-query pipeline toggles; everything defaults to enabled
///
/// Disabling an option degrades to a smaller pipeline rather than
/// changing the meaning of the remaining stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchOptions {
    pub use_reranking: bool,
    pub use_hyde: bool,
    pub use_hybrid: bool,
    pub use_multi_query: bool,
    pub ensure_diversity: bool,
    pub merge_context: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            use_reranking: true,
            use_hyde: true,
            use_hybrid: true,
            use_multi_query: true,
            ensure_diversity: true,
            merge_context: true,
        }
    }
}

/// Health snapshot of the current index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub available: bool,
    pub total_indexed_chunks: usize,
    pub embedding_dimension: usize,
}

/// Outcome of an ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub indexed_documents: usize,
    /// Sources that yielded zero chunks (empty or degenerate text)
    pub skipped_documents: Vec<SourceId>,
    pub total_chunks: usize,
}
