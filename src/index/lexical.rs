//! Lexical search index using Tantivy (BM25 ranking)

use crate::types::{Chunk, ChunkId};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{Field, Schema, Value, STORED, TEXT},
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument,
};
use tracing::{debug, warn};

/// In-memory BM25 index over chunk text
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    schema: LexicalSchema,
    doc_count: AtomicUsize,
}

/// Schema fields for the lexical index
struct LexicalSchema {
    chunk_id: Field,
    source_id: Field,
    content: Field,
}

/// Lexical search result
#[derive(Debug, Clone)]
pub struct LexicalSearchResult {
    pub chunk_id: ChunkId,
    pub source_id: String,
    /// BM25 relevance score, higher is more similar
    pub score: f32,
}

impl LexicalIndex {
    /// Create a new in-memory lexical index
    pub fn new() -> Result<Self> {
        let (schema, fields) = Self::build_schema();
        let index = Index::create_in_ram(schema);

        let writer = index.writer(50_000_000)?; // 50MB buffer
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
            schema: fields,
            doc_count: AtomicUsize::new(0),
        })
    }

    fn build_schema() -> (Schema, LexicalSchema) {
        let mut schema_builder = Schema::builder();

        let chunk_id = schema_builder.add_text_field("chunk_id", STORED);
        let source_id = schema_builder.add_text_field("source_id", STORED);
        let content = schema_builder.add_text_field("content", TEXT | STORED);

        let schema = schema_builder.build();
        let fields = LexicalSchema {
            chunk_id,
            source_id,
            content,
        };

        (schema, fields)
    }

    /// Add a chunk to the index
    pub fn add(&self, chunk: &Chunk) -> Result<()> {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.schema.chunk_id, &chunk.chunk_id);
        doc.add_text(self.schema.source_id, &chunk.source_id);
        doc.add_text(self.schema.content, &chunk.text);

        self.writer.lock().add_document(doc)?;
        self.doc_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Commit pending changes and make them visible to searches
    pub fn commit(&self) -> Result<()> {
        self.writer.lock().commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Search for matching chunks, returned in descending score order.
    ///
    /// Arbitrary user text never errors: query syntax is stripped down to
    /// bare terms first, and a query with no usable terms returns nothing.
    pub fn search(&self, query_text: &str, k: usize) -> Result<Vec<LexicalSearchResult>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let sanitized = sanitize_query(query_text);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.schema.content]);
        let query = match query_parser.parse_query(&sanitized) {
            Ok(q) => q,
            Err(e) => {
                warn!("Lexical query unparseable after sanitization: {}", e);
                return Ok(Vec::new());
            }
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;

            let chunk_id = doc
                .get_first(self.schema.chunk_id)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let source_id = doc
                .get_first(self.schema.source_id)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            results.push(LexicalSearchResult {
                chunk_id,
                source_id,
                score,
            });
        }

        debug!("Lexical search for '{}': {} results", sanitized, results.len());
        Ok(results)
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.doc_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reduce arbitrary query text to lowercase bare terms, removing query
/// syntax characters that the parser would otherwise interpret.
fn sanitize_query(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
