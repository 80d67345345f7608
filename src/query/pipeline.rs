//! The search pipeline: ingest, search, status
//!
//! Owns the index snapshot, the service backends, and the
//! configuration. Constructed explicitly and passed where needed;
//! there is no process-wide instance.

use super::cancel::CancellationToken;
use crate::chunking::Chunker;
use crate::config::Config;
use crate::error::{SearchError, SearchResult};
use crate::expansion::QueryExpander;
use crate::index::{leaf_chunks, SearchIndex};
use crate::retrieval::{
    format_results, merge_candidates, select_diverse, HybridRetriever, LlmReranker,
};
use crate::services::{CompletionBackend, EmbeddingBackend};
use crate::types::{
    ChunkId, Document, Embedding, IndexStatus, IngestReport, SearchOptions, SearchResponse,
};
use crate::util::truncate_str;
use anyhow::Context;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hybrid retrieval pipeline over an immutable index snapshot
///
/// `search` runs against whatever snapshot is current when the query
/// starts; `ingest` builds a complete replacement index and swaps it in
/// atomically, so in-flight queries finish against the old one.
pub struct SearchPipeline {
    index: RwLock<Arc<SearchIndex>>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    completion: Option<Arc<dyn CompletionBackend>>,
    chunker: Chunker,
    config: Config,
}

impl SearchPipeline {
    /// Create a pipeline with an empty index.
    ///
    /// Both backends are optional: without an embedder the index is
    /// lexical-only, without a completion backend expansion and
    /// reranking quietly skip themselves.
    pub fn new(
        config: Config,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        completion: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        let index = Arc::new(SearchIndex::empty(config.embedding.dimensions));
        let chunker = Chunker::new(config.chunking.clone());
        Self {
            index: RwLock::new(index),
            embedder,
            completion,
            chunker,
            config,
        }
    }

    /// Ingest a corpus: chunk every document, embed the leaves, build a
    /// fresh index, and publish it.
    ///
    /// This is the one exclusive, infrequent operation; unlike the
    /// query path, an embedding failure here is an error, because a
    /// silently vector-less rebuild would degrade every later query.
    pub async fn ingest(&self, documents: Vec<Document>) -> SearchResult<IngestReport> {
        let started = Instant::now();
        let mut all_chunks = Vec::new();
        let mut skipped = Vec::new();
        let mut indexed_documents = 0usize;

        for document in &documents {
            let chunks = self.chunker.chunk(document);
            if chunks.is_empty() {
                warn!("Document {} produced no chunks, skipping", document.source_id);
                skipped.push(document.source_id.clone());
                continue;
            }
            indexed_documents += 1;
            all_chunks.extend(chunks);
        }

        let embeddings = match &self.embedder {
            Some(embedder) => {
                let leaves = leaf_chunks(&all_chunks);
                let texts: Vec<String> = leaves.iter().map(|c| c.text.clone()).collect();
                let ids: Vec<ChunkId> = leaves.iter().map(|c| c.chunk_id.clone()).collect();

                let vectors = embedder
                    .embed_batch(&texts)
                    .await
                    .map_err(|e| SearchError::Index(format!("corpus embedding failed: {}", e)))?;

                let pairs: Vec<(ChunkId, Embedding)> =
                    ids.into_iter().zip(vectors.into_iter()).collect();
                Some(pairs)
            }
            None => None,
        };

        let total_chunks = all_chunks.len();
        let new_index = SearchIndex::build(all_chunks, embeddings, &self.config)
            .context("index build failed")?;

        // Publish atomically; in-flight queries keep their snapshot
        *self.index.write() = Arc::new(new_index);

        info!(
            "Ingested {} documents ({} skipped) into {} chunks in {:?}",
            indexed_documents,
            skipped.len(),
            total_chunks,
            started.elapsed()
        );

        Ok(IngestReport {
            indexed_documents,
            skipped_documents: skipped,
            total_chunks,
        })
    }

    /// Search the corpus
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        options: SearchOptions,
    ) -> SearchResult<SearchResponse> {
        self.search_with_cancel(query, k, options, &CancellationToken::new())
            .await
    }

    /// Search with a caller-held cancellation token, checked between
    /// stages
    pub async fn search_with_cancel(
        &self,
        query: &str,
        k: usize,
        options: SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchResponse> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        if k == 0 {
            return Ok(SearchResponse::empty());
        }

        // Snapshot the index for the whole query
        let index = self.index.read().clone();
        if !index.status().available {
            debug!("Search on empty corpus returns no results");
            return Ok(SearchResponse::empty());
        }

        let started = Instant::now();

        // Stage 1: expansion
        let expander = QueryExpander::new(self.completion.clone(), self.config.expansion.clone());
        let variants = expander.expand(query, &options).await;
        check_cancelled(cancel)?;

        // Stage 2: hybrid retrieval across variants
        let retriever = HybridRetriever::new(
            index.clone(),
            self.embedder.clone(),
            self.config.retrieval.clone(),
        );
        let candidates = retriever.retrieve(&variants, k, &options).await;
        check_cancelled(cancel)?;

        // Stage 3: dedup and context merging
        let mut candidates =
            merge_candidates(candidates, options.merge_context, &self.config.retrieval);

        // Cap what goes into the reranker prompt
        candidates.truncate(k.saturating_mul(2).max(k));
        check_cancelled(cancel)?;

        // Stage 4: reranking against the original query
        let (ranked, rerank_mode) = if options.use_reranking {
            let reranker = LlmReranker::new(self.completion.clone(), self.config.rerank.clone());
            reranker.rerank(query, candidates).await
        } else {
            let mut sorted = candidates;
            sorted.sort_by(|a, b| {
                b.fused_score
                    .partial_cmp(&a.fused_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for c in sorted.iter_mut() {
                c.combined_score = c.fused_score;
            }
            (sorted, crate::types::RerankMode::Skipped)
        };
        check_cancelled(cancel)?;

        // Stage 5: source diversity
        let selected = if options.ensure_diversity {
            select_diverse(ranked, k, self.config.diversity.min_sources)
        } else {
            let mut top = ranked;
            top.truncate(k);
            top
        };

        // Stage 6: formatting
        let items = format_results(selected, rerank_mode, &self.config.formatting);

        info!(
            "Search '{}': {} results ({:?}) in {:?}",
            truncate_str(query, 50),
            items.len(),
            rerank_mode,
            started.elapsed()
        );

        Ok(SearchResponse {
            items,
            rerank: rerank_mode,
        })
    }

    /// Health snapshot of the current index
    pub fn status(&self) -> IndexStatus {
        self.index.read().status()
    }
}

fn check_cancelled(cancel: &CancellationToken) -> SearchResult<()> {
    if cancel.is_cancelled() {
        Err(SearchError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{hash_based_embedding, ServiceResult};
    use crate::types::DocumentKind;

    #[derive(Debug)]
    struct HashEmbedder {
        dims: usize,
    }

    #[async_trait::async_trait]
    impl EmbeddingBackend for HashEmbedder {
        async fn embed(&self, text: &str) -> ServiceResult<Embedding> {
            Ok(hash_based_embedding(text, self.dims))
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn name(&self) -> &str {
            "hash"
        }
    }

    fn test_config(dims: usize) -> Config {
        let mut config = Config::default();
        config.embedding.dimensions = dims;
        config.chunking.chunk_size = 200;
        config.chunking.chunk_overlap = 30;
        config
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new(
                "The reservoir stores spring meltwater for the dry season. \
                 Capacity is measured in millions of cubic meters.",
            )
            .with_source_id("doc-reservoir")
            .with_kind(DocumentKind::Plain),
            Document::new(
                "Canal gates are inspected annually. Gate corrosion is the \
                 most common maintenance finding across the network.",
            )
            .with_source_id("doc-canal")
            .with_kind(DocumentKind::Record),
        ]
    }

    fn pipeline(dims: usize) -> SearchPipeline {
        SearchPipeline::new(
            test_config(dims),
            Some(Arc::new(HashEmbedder { dims })),
            None,
        )
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_empty_not_error() {
        let p = pipeline(16);
        let response = p.search("anything", 5, SearchOptions::default()).await.unwrap();
        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let p = pipeline(16);
        let err = p.search("   \t ", 5, SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery));
    }

    #[tokio::test]
    async fn test_ingest_then_search() {
        let p = pipeline(16);
        let report = p.ingest(corpus()).await.unwrap();
        assert_eq!(report.indexed_documents, 2);
        assert!(report.skipped_documents.is_empty());
        assert!(report.total_chunks >= 2);

        let response = p
            .search("canal gate maintenance", 5, SearchOptions::default())
            .await
            .unwrap();
        assert!(!response.items.is_empty());
        assert_eq!(response.rerank, crate::types::RerankMode::Skipped);
    }

    #[tokio::test]
    async fn test_empty_document_reported_skipped() {
        let p = pipeline(16);
        let mut docs = corpus();
        docs.push(Document::new("").with_source_id("doc-empty"));

        let report = p.ingest(docs).await.unwrap();
        assert_eq!(report.indexed_documents, 2);
        assert_eq!(report.skipped_documents, vec!["doc-empty".to_string()]);
    }

    #[tokio::test]
    async fn test_status_reflects_ingest() {
        let p = pipeline(16);
        let before = p.status();
        assert!(!before.available);
        assert_eq!(before.total_indexed_chunks, 0);
        assert_eq!(before.embedding_dimension, 16);

        p.ingest(corpus()).await.unwrap();

        let after = p.status();
        assert!(after.available);
        assert!(after.total_indexed_chunks >= 2);
    }

    #[tokio::test]
    async fn test_reingest_replaces_corpus() {
        let p = pipeline(16);
        p.ingest(corpus()).await.unwrap();

        let replacement = vec![Document::new(
            "Completely different topic: migratory bird counts along the flyway.",
        )
        .with_source_id("doc-birds")];
        p.ingest(replacement).await.unwrap();

        let response = p
            .search("migratory bird counts", 5, SearchOptions::default())
            .await
            .unwrap();
        assert!(!response.items.is_empty());
        for item in &response.items {
            assert_eq!(item.source_id, "doc-birds", "old corpus must be gone");
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let p = pipeline(16);
        p.ingest(corpus()).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = p
            .search_with_cancel("reservoir capacity", 5, SearchOptions::default(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
    }

    #[tokio::test]
    async fn test_k_zero_returns_empty() {
        let p = pipeline(16);
        p.ingest(corpus()).await.unwrap();
        let response = p.search("reservoir", 0, SearchOptions::default()).await.unwrap();
        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn test_lexical_only_pipeline_without_embedder() {
        let p = SearchPipeline::new(test_config(16), None, None);
        p.ingest(corpus()).await.unwrap();

        let response = p
            .search("canal gate corrosion", 5, SearchOptions::default())
            .await
            .unwrap();
        assert!(!response.items.is_empty(), "lexical-only search should work");
    }
}
