//! Integration tests for the fathom retrieval pipeline
//!
//! These tests drive the full ingest -> search flow with deterministic
//! test backends standing in for the external services.

use fathom::config::Config;
use fathom::services::{
    hash_based_embedding, CompletionBackend, EmbeddingBackend, ServiceError, ServiceResult,
};
use fathom::{
    CancellationToken, ConfidenceTier, Document, DocumentKind, Embedding, RerankMode,
    SearchError, SearchOptions, SearchPipeline,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic embedding backend for tests
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

/// Completion backend that answers each pipeline prompt kind in turn:
/// paraphrases for expansion, a short answer for HyDE, and a JSON score
/// array sized to the passage count for reranking.
#[derive(Debug)]
struct ScriptedCompletion {
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> ServiceResult<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if prompt.contains("alternative phrasings") {
            return Ok("maximum reservoir storage volume\nhow much water reservoirs hold".to_string());
        }
        if prompt.contains("write a detailed, factual answer") {
            return Ok("Reservoir capacity is rated in millions of cubic meters and \
                       depends on dam height and basin shape."
                .to_string());
        }
        if prompt.contains("score each passage") {
            let passages = prompt.matches("Passage ").count();
            let scores: Vec<String> = (0..passages)
                .map(|i| format!("{}", 9 - (i % 10).min(9)))
                .collect();
            return Ok(format!("[{}]", scores.join(", ")));
        }

        Err(ServiceError::RequestFailed("unexpected prompt".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Completion backend that always returns garbage (unparseable scores,
/// unusable paraphrases)
#[derive(Debug)]
struct GarbageCompletion;

#[async_trait::async_trait]
impl CompletionBackend for GarbageCompletion {
    async fn complete(&self, prompt: &str) -> ServiceResult<String> {
        if prompt.contains("score each passage") {
            // Parses into two numbers regardless of candidate count
            return Ok("I think 7 and maybe 3".to_string());
        }
        Ok("??".to_string())
    }

    fn name(&self) -> &str {
        "garbage"
    }
}

const DIMS: usize = 24;

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimensions = DIMS;
    config.chunking.chunk_size = 240;
    config.chunking.chunk_overlap = 40;
    config
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "The main reservoir stores spring meltwater for irrigation. Its \
             rated capacity is 42 million cubic meters. Seasonal drawdown \
             begins in late June and continues through September.",
        )
        .with_source_id("reservoir-passport")
        .with_kind(DocumentKind::Record)
        .with_title("Reservoir Passport"),
        Document::new(
            "Canal inspection report. The headworks gates show moderate \
             corrosion. Sediment accumulation near kilometer twelve reduces \
             flow capacity by roughly eight percent.",
        )
        .with_source_id("canal-report")
        .with_kind(DocumentKind::Pdf),
        Document::new(
            "Groundwater wells in the eastern district supply drinking water. \
             Static water levels declined two meters over the past decade. \
             Recharge depends on winter precipitation.",
        )
        .with_source_id("wells-survey")
        .with_kind(DocumentKind::Plain),
        Document::new(
            "Lake monitoring summary. Phosphorus concentrations remain within \
             permitted limits. Algal bloom risk is rated low for the current \
             season based on temperature forecasts.",
        )
        .with_source_id("lake-summary")
        .with_kind(DocumentKind::Plain),
    ]
}

async fn full_pipeline() -> SearchPipeline {
    let pipeline = SearchPipeline::new(
        test_config(),
        Some(Arc::new(HashEmbedder { dims: DIMS })),
        Some(Arc::new(ScriptedCompletion::new())),
    );
    pipeline.ingest(corpus()).await.unwrap();
    pipeline
}

#[tokio::test]
async fn test_full_pipeline_end_to_end() {
    let pipeline = full_pipeline().await;

    let response = pipeline
        .search("reservoir capacity", 3, SearchOptions::default())
        .await
        .unwrap();

    assert!(!response.items.is_empty());
    assert!(response.items.len() <= 3);
    assert_eq!(response.rerank, RerankMode::Applied);

    // Items are ranked descending and carry complete payloads
    for pair in response.items.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for item in &response.items {
        assert!(!item.text.is_empty());
        assert!(!item.enhanced_text.is_empty());
        assert!(!item.source_id.is_empty());
        assert!(item.merged_count >= 1);
    }
}

#[tokio::test]
async fn test_empty_corpus_search_returns_empty() {
    let pipeline = SearchPipeline::new(
        test_config(),
        Some(Arc::new(HashEmbedder { dims: DIMS })),
        None,
    );

    let response = pipeline
        .search("anything", 5, SearchOptions::default())
        .await
        .unwrap();
    assert!(response.items.is_empty());

    let status = pipeline.status();
    assert!(!status.available);
    assert_eq!(status.total_indexed_chunks, 0);
    assert_eq!(status.embedding_dimension, DIMS);
}

#[tokio::test]
async fn test_invalid_query_rejected_before_any_stage() {
    let pipeline = full_pipeline().await;
    let err = pipeline
        .search("", 5, SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery));
}

#[tokio::test]
async fn test_malformed_rerank_output_degrades_to_fused_ranking() {
    let pipeline = SearchPipeline::new(
        test_config(),
        Some(Arc::new(HashEmbedder { dims: DIMS })),
        Some(Arc::new(GarbageCompletion)),
    );
    pipeline.ingest(corpus()).await.unwrap();

    // Garbage paraphrases are filtered, garbage scores parse into the
    // wrong count; the query must still succeed
    let response = pipeline
        .search("canal gate corrosion inspection", 3, SearchOptions::default())
        .await
        .unwrap();

    assert!(!response.items.is_empty());
    assert_eq!(response.rerank, RerankMode::FusedFallback);
}

#[tokio::test]
async fn test_rerank_disabled_reports_skipped() {
    let pipeline = full_pipeline().await;

    let options = SearchOptions {
        use_reranking: false,
        ..Default::default()
    };
    let response = pipeline
        .search("groundwater wells", 3, options)
        .await
        .unwrap();

    assert!(!response.items.is_empty());
    assert_eq!(response.rerank, RerankMode::Skipped);
}

#[tokio::test]
async fn test_no_completion_backend_degrades_gracefully() {
    let pipeline = SearchPipeline::new(
        test_config(),
        Some(Arc::new(HashEmbedder { dims: DIMS })),
        None,
    );
    pipeline.ingest(corpus()).await.unwrap();

    let response = pipeline
        .search("phosphorus concentration limits", 3, SearchOptions::default())
        .await
        .unwrap();

    assert!(!response.items.is_empty());
    assert_eq!(response.rerank, RerankMode::Skipped);
}

#[tokio::test]
async fn test_source_diversity_across_corpus() {
    let pipeline = full_pipeline().await;

    // A broad query touching every document; diversity selection should
    // spread the results over multiple sources
    let response = pipeline
        .search("water capacity monitoring levels", 4, SearchOptions::default())
        .await
        .unwrap();

    let sources: std::collections::HashSet<&str> = response
        .items
        .iter()
        .map(|i| i.source_id.as_str())
        .collect();
    assert!(
        sources.len() >= 2,
        "expected multiple sources, got {:?}",
        sources
    );
}

#[tokio::test]
async fn test_each_option_toggle_still_returns_results() {
    let pipeline = full_pipeline().await;

    let toggles = [
        SearchOptions { use_reranking: false, ..Default::default() },
        SearchOptions { use_hyde: false, ..Default::default() },
        SearchOptions { use_hybrid: false, ..Default::default() },
        SearchOptions { use_multi_query: false, ..Default::default() },
        SearchOptions { ensure_diversity: false, ..Default::default() },
        SearchOptions { merge_context: false, ..Default::default() },
    ];

    for options in toggles {
        let response = pipeline
            .search("reservoir capacity", 3, options)
            .await
            .unwrap_or_else(|e| panic!("options {:?} failed: {}", options, e));
        assert!(
            !response.items.is_empty(),
            "options {:?} returned no results",
            options
        );
    }
}

#[tokio::test]
async fn test_confidence_tiers_present_and_stable() {
    let pipeline = full_pipeline().await;

    let response = pipeline
        .search("reservoir capacity", 3, SearchOptions::default())
        .await
        .unwrap();

    // Tiers follow the score ordering: a better-scoring item never has
    // a strictly worse tier
    fn tier_rank(t: ConfidenceTier) -> u8 {
        match t {
            ConfidenceTier::Excellent => 3,
            ConfidenceTier::Good => 2,
            ConfidenceTier::Fair => 1,
            ConfidenceTier::Low => 0,
        }
    }

    for pair in response.items.windows(2) {
        assert!(tier_rank(pair[0].confidence_tier) >= tier_rank(pair[1].confidence_tier));
    }
}

#[tokio::test]
async fn test_reingest_swaps_corpus_atomically() {
    let pipeline = full_pipeline().await;
    let before = pipeline.status();
    assert!(before.available);

    let replacement = vec![Document::new(
        "Snowpack telemetry stations report hourly depth and density from \
         the upper basin, feeding the runoff forecast model.",
    )
    .with_source_id("snowpack-telemetry")];
    let report = pipeline.ingest(replacement).await.unwrap();
    assert_eq!(report.indexed_documents, 1);

    let response = pipeline
        .search("snowpack telemetry runoff forecast", 5, SearchOptions::default())
        .await
        .unwrap();
    assert!(!response.items.is_empty());
    for item in &response.items {
        assert_eq!(item.source_id, "snowpack-telemetry");
    }
}

#[tokio::test]
async fn test_cancellation_token_aborts_search() {
    let pipeline = full_pipeline().await;

    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .search_with_cancel("reservoir capacity", 3, SearchOptions::default(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
}

#[tokio::test]
async fn test_concurrent_searches_share_snapshot() {
    let pipeline = Arc::new(full_pipeline().await);

    let mut handles = Vec::new();
    for query in ["reservoir capacity", "canal corrosion", "groundwater wells"] {
        let p = pipeline.clone();
        handles.push(tokio::spawn(async move {
            p.search(query, 3, SearchOptions::default()).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert!(!response.items.is_empty());
    }
}
