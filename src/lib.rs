//! Fathom: hybrid passage retrieval and reranking
//!
//! A retrieval pipeline over a mixed text corpus, featuring:
//! - Two-level parent/child chunking with separator-priority splitting
//! - Dense vector search (USearch HNSW) + lexical BM25 search (Tantivy)
//! - Weighted score fusion across both signals
//! - LLM query expansion (multi-query + hypothetical answers)
//! - LLM reranking with defensive response parsing
//! - Near-duplicate collapse, adjacent-chunk merging, source diversity
//!
//! External services (embeddings, completions) sit behind async traits
//! with per-call timeouts; every remote failure degrades quality rather
//! than failing the query.

pub mod chunking;
pub mod config;
pub mod error;
pub mod expansion;
pub mod index;
pub mod query;
pub mod retrieval;
pub mod services;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::SearchError;
pub use query::{CancellationToken, SearchPipeline};
pub use types::*;
