//! Chunk arena: exclusive owner of all chunks for an index lifetime
//!
//! The parent/child hierarchy is flat: chunks are held in one vector and
//! looked up by id; `parent_ref` is a plain id lookup, no shared nodes.

use crate::types::{Chunk, ChunkId};
use std::collections::HashMap;

/// Owns every chunk (parents and children) behind id lookup
pub struct ChunkArena {
    chunks: Vec<Chunk>,
    by_id: HashMap<ChunkId, usize>,
}

impl ChunkArena {
    /// Build an arena from a chunk set. Later duplicates of an id are
    /// ignored; chunk ids are unique per ingest by construction.
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            by_id.entry(chunk.chunk_id.clone()).or_insert(i);
        }
        Self { chunks, by_id }
    }

    pub fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Look up a chunk by id
    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&i| &self.chunks[i])
    }

    /// Resolve a chunk's parent, if it has one
    pub fn parent_of(&self, chunk: &Chunk) -> Option<&Chunk> {
        chunk.parent_ref.as_deref().and_then(|id| self.get(id))
    }

    /// Iterate over all chunks
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
