//! Index over the chunked corpus
//!
//! Three parallel structures share one chunk set:
//! - a chunk arena owning every chunk (parents and children)
//! - a dense HNSW index over leaf-chunk embeddings
//! - a lexical BM25 index over leaf-chunk text
//!
//! A `SearchIndex` is built once per ingest and read-only afterwards.
//! Rebuilding constructs a new instance which the pipeline swaps in
//! atomically; in-flight queries keep their snapshot.

mod arena;
mod dense;
mod lexical;

pub use arena::*;
pub use dense::*;
pub use lexical::*;

use crate::config::Config;
use crate::types::{Chunk, ChunkId, Embedding, IndexStatus};
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{info, warn};

/// Immutable snapshot of the indexed corpus
pub struct SearchIndex {
    arena: ChunkArena,
    dense: Option<DenseIndex>,
    lexical: Option<LexicalIndex>,
    embedding_dimension: usize,
    indexed_chunks: usize,
}

impl SearchIndex {
    /// An empty index: every search returns nothing, status reports
    /// unavailable. The pipeline starts here until the first ingest.
    pub fn empty(embedding_dimension: usize) -> Self {
        Self {
            arena: ChunkArena::empty(),
            dense: None,
            lexical: None,
            embedding_dimension,
            indexed_chunks: 0,
        }
    }

    /// Build the index from a chunk set and the matching leaf embeddings.
    ///
    /// `embeddings` pairs leaf chunk ids with their vectors; leaves with
    /// no embedding still enter the lexical index. `embeddings = None`
    /// builds a lexical-only index.
    pub fn build(
        chunks: Vec<Chunk>,
        embeddings: Option<Vec<(ChunkId, Embedding)>>,
        config: &Config,
    ) -> Result<Self> {
        let leaf_ids: HashSet<ChunkId> = leaf_chunks(&chunks)
            .into_iter()
            .map(|c| c.chunk_id.clone())
            .collect();

        let lexical = if leaf_ids.is_empty() {
            None
        } else {
            let lex = LexicalIndex::new().context("Failed to create lexical index")?;
            for chunk in &chunks {
                if leaf_ids.contains(&chunk.chunk_id) {
                    lex.add(chunk)?;
                }
            }
            lex.commit()?;
            Some(lex)
        };

        let dense = match &embeddings {
            Some(pairs) if !pairs.is_empty() => {
                let index = DenseIndex::new(
                    config.embedding.dimensions,
                    &config.index,
                    pairs.len(),
                )?;
                let mut added = 0usize;
                for (chunk_id, embedding) in pairs {
                    if !leaf_ids.contains(chunk_id) {
                        warn!("Embedding for unknown or non-leaf chunk {}, skipping", chunk_id);
                        continue;
                    }
                    index.add(chunk_id, embedding)?;
                    added += 1;
                }
                info!("Dense index built with {} vectors", added);
                Some(index)
            }
            _ => None,
        };

        let indexed_chunks = leaf_ids.len();
        info!(
            "Search index built: {} chunks total, {} indexed, dense={}, lexical={}",
            chunks.len(),
            indexed_chunks,
            dense.is_some(),
            lexical.is_some()
        );

        Ok(Self {
            arena: ChunkArena::new(chunks),
            dense,
            lexical,
            embedding_dimension: config.embedding.dimensions,
            indexed_chunks,
        })
    }

    /// Nearest neighbors by embedding distance, ascending.
    /// Empty or dense-less index returns an empty list.
    pub fn dense_search(&self, query: &Embedding, k: usize) -> Result<Vec<DenseSearchResult>> {
        match &self.dense {
            Some(index) => index.search(query, k),
            None => Ok(Vec::new()),
        }
    }

    /// BM25 term ranking, descending. Empty or lexical-less index
    /// returns an empty list.
    pub fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<LexicalSearchResult>> {
        match &self.lexical {
            Some(index) => index.search(query, k),
            None => Ok(Vec::new()),
        }
    }

    pub fn has_dense(&self) -> bool {
        self.dense.is_some()
    }

    pub fn has_lexical(&self) -> bool {
        self.lexical.is_some()
    }

    /// The chunk arena backing this index
    pub fn arena(&self) -> &ChunkArena {
        &self.arena
    }

    /// Health snapshot for the surrounding service
    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            available: self.indexed_chunks > 0,
            total_indexed_chunks: self.indexed_chunks,
            embedding_dimension: self.embedding_dimension,
        }
    }
}

/// Leaf chunks are the indexable unit: children, plus parents that no
/// child references (standalone parents).
pub fn leaf_chunks(chunks: &[Chunk]) -> Vec<&Chunk> {
    let referenced: HashSet<&str> = chunks
        .iter()
        .filter_map(|c| c.parent_ref.as_deref())
        .collect();

    chunks
        .iter()
        .filter(|c| !referenced.contains(c.chunk_id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use std::collections::HashMap;

    fn make_chunk(id: &str, source_id: &str, text: &str, parent: Option<&str>) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            source_id: source_id.to_string(),
            text: text.to_string(),
            char_span: (0, text.chars().count()),
            is_parent: parent.is_none(),
            parent_ref: parent.map(str::to_string),
            sibling_index: 0,
            parent_preview: None,
            metadata: HashMap::new(),
        }
    }

    fn test_config(dims: usize) -> Config {
        let mut config = Config::default();
        config.embedding.dimensions = dims;
        config.index = IndexConfig {
            hnsw_m: 8,
            hnsw_ef_construction: 100,
            hnsw_ef_search: 50,
        };
        config
    }

    #[test]
    fn test_leaf_chunks_excludes_container_parents() {
        let chunks = vec![
            make_chunk("p0", "doc", "container parent text", None),
            make_chunk("c0", "doc", "first child", Some("p0")),
            make_chunk("c1", "doc", "second child", Some("p0")),
            make_chunk("s0", "doc", "standalone parent", None),
        ];

        let leaves = leaf_chunks(&chunks);
        let ids: Vec<&str> = leaves.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "s0"]);
    }

    #[test]
    fn test_build_and_search_both_paths() {
        let chunks = vec![
            make_chunk("c0", "doc1", "machine learning and artificial intelligence", None),
            make_chunk("c1", "doc2", "deep learning neural networks", None),
        ];
        let embeddings = vec![
            ("c0".to_string(), vec![1.0, 0.0, 0.0, 0.0]),
            ("c1".to_string(), vec![0.0, 1.0, 0.0, 0.0]),
        ];

        let index = SearchIndex::build(chunks, Some(embeddings), &test_config(4)).unwrap();
        assert!(index.has_dense());
        assert!(index.has_lexical());

        let dense = index.dense_search(&vec![1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(dense[0].chunk_id, "c0");

        let lexical = index.lexical_search("neural networks", 2).unwrap();
        assert_eq!(lexical[0].chunk_id, "c1");

        let status = index.status();
        assert!(status.available);
        assert_eq!(status.total_indexed_chunks, 2);
        assert_eq!(status.embedding_dimension, 4);
    }

    #[test]
    fn test_build_without_embeddings_is_lexical_only() {
        let chunks = vec![make_chunk("c0", "doc1", "content without vectors", None)];
        let index = SearchIndex::build(chunks, None, &test_config(4)).unwrap();

        assert!(!index.has_dense());
        assert!(index.has_lexical());
        assert!(index.dense_search(&vec![0.0; 4], 5).unwrap().is_empty());
        assert!(!index.lexical_search("content", 5).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_searches_return_empty() {
        let index = SearchIndex::empty(4);
        assert!(index.dense_search(&vec![0.0; 4], 5).unwrap().is_empty());
        assert!(index.lexical_search("anything", 5).unwrap().is_empty());

        let status = index.status();
        assert!(!status.available);
        assert_eq!(status.total_indexed_chunks, 0);
    }
}
