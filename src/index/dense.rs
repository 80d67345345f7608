//! Dense vector index using USearch (HNSW)

use crate::config::IndexConfig;
use crate::types::{ChunkId, Embedding};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// Vector index over chunk embeddings
///
/// Built once per ingest and read-only afterwards; rebuilding means
/// constructing a fresh index and swapping the reference.
pub struct DenseIndex {
    /// USearch index
    index: Index,
    /// Mapping from internal key to chunk ID
    key_to_chunk: RwLock<HashMap<u64, ChunkId>>,
    /// Next available key
    next_key: AtomicU64,
    /// Number of dimensions
    dimensions: usize,
}

/// Search result from the dense index
#[derive(Debug, Clone)]
pub struct DenseSearchResult {
    pub chunk_id: ChunkId,
    /// Cosine distance, lower is more similar
    pub distance: f32,
}

impl DenseIndex {
    /// Create a new dense index
    pub fn new(dimensions: usize, config: &IndexConfig, capacity: usize) -> Result<Self> {
        info!(
            "Creating dense index: {} dimensions, M={}, ef_construction={}",
            dimensions, config.hnsw_m, config.hnsw_ef_construction
        );

        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.hnsw_m,
            expansion_add: config.hnsw_ef_construction,
            expansion_search: config.hnsw_ef_search,
            multi: false,
        };

        let index = Index::new(&options).context("Failed to create USearch index")?;
        index
            .reserve(capacity.max(1))
            .context("Failed to reserve index capacity")?;

        Ok(Self {
            index,
            key_to_chunk: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(0),
            dimensions,
        })
    }

    /// Add a single embedding to the index
    pub fn add(&self, chunk_id: &ChunkId, embedding: &Embedding) -> Result<u64> {
        anyhow::ensure!(
            embedding.len() == self.dimensions,
            "Embedding dimension mismatch: expected {}, got {}",
            self.dimensions,
            embedding.len()
        );

        let key = self.next_key.fetch_add(1, Ordering::SeqCst);

        self.index
            .add(key, embedding)
            .context("Failed to add to index")?;

        self.key_to_chunk.write().insert(key, chunk_id.clone());

        debug!("Added chunk {} with key {}", chunk_id, key);
        Ok(key)
    }

    /// Search for nearest neighbors, returned in ascending distance order.
    /// An empty index returns an empty list rather than an error.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<DenseSearchResult>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        anyhow::ensure!(
            query.len() == self.dimensions,
            "Query dimension mismatch: expected {}, got {}",
            self.dimensions,
            query.len()
        );

        let results = self.index.search(query, k).context("Search failed")?;

        let key_to_chunk = self.key_to_chunk.read();
        let search_results: Vec<DenseSearchResult> = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .filter_map(|(&key, &distance)| {
                key_to_chunk.get(&key).map(|chunk_id| DenseSearchResult {
                    chunk_id: chunk_id.clone(),
                    distance,
                })
            })
            .collect();

        Ok(search_results)
    }

    /// Get the number of items in the index
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the embedding dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}
