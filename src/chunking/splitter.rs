//! Document splitting into a two-level chunk hierarchy
//!
//! The document is first cut into contiguous, non-overlapping parent
//! segments along paragraph boundaries. Parents that fit the target size
//! are indexed whole; oversized parents are subdivided into overlapping
//! child chunks at the best separator boundary in range. Children keep a
//! reference to their parent plus a truncated preview of its text.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};
use crate::util::truncate_str;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Separator priority for split-point selection, largest structure first.
/// The empty string stands for a hard character cut.
const SEPARATORS: &[&str] = &[
    "\n\n\n", "\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " ", "",
];

/// Text splitter producing the parent/child chunk hierarchy
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a new chunker
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split a document into chunks.
    ///
    /// Returns every chunk of the hierarchy: container parents first serve
    /// as context for their children, standalone parents and children are
    /// the indexable leaves. An empty or blank document yields no chunks.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        let parent_spans = self.parent_spans(&chars);

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut ordinal = 0usize;

        for (parent_idx, &(start, end)) in parent_spans.iter().enumerate() {
            let parent_text = slice_trimmed(&chars, start, end);
            if parent_text.chars().count() < self.config.min_fragment_chars {
                continue;
            }

            if parent_text.chars().count() <= self.config.chunk_size {
                // Standalone parent, indexed directly
                chunks.push(self.make_chunk(
                    document,
                    format!("{}_{}", document.source_id, ordinal),
                    parent_text,
                    (start, end),
                    true,
                    None,
                    ordinal,
                    None,
                ));
                ordinal += 1;
                continue;
            }

            // Oversized parent: keep it as context, index its children
            let parent_id = format!("{}_p{}", document.source_id, parent_idx);
            let preview = truncate_str(&parent_text, self.config.parent_preview_chars);
            chunks.push(self.make_chunk(
                document,
                parent_id.clone(),
                parent_text,
                (start, end),
                true,
                None,
                parent_idx,
                None,
            ));

            for (child_start, child_end) in self.child_spans(&chars, start, end) {
                let child_text = slice_trimmed(&chars, child_start, child_end);
                if child_text.chars().count() < self.config.min_fragment_chars {
                    continue;
                }
                chunks.push(self.make_chunk(
                    document,
                    format!("{}_{}", document.source_id, ordinal),
                    child_text,
                    (child_start, child_end),
                    false,
                    Some(parent_id.clone()),
                    ordinal,
                    Some(preview.clone()),
                ));
                ordinal += 1;
            }
        }

        let total_tokens: usize = chunks.iter().map(|c| Self::estimate_tokens(&c.text)).sum();
        debug!(
            "Split document {} into {} chunks ({} indexable, ~{} tokens)",
            document.source_id,
            chunks.len(),
            ordinal,
            total_tokens
        );

        chunks
    }

    /// Cut the document into contiguous parent spans along paragraph
    /// boundaries, packing consecutive paragraphs up to the target size.
    /// Spans tile the whole text; a single paragraph larger than the
    /// target stays whole and is subdivided later.
    fn parent_spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let paragraphs = paragraph_runs(chars);

        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut acc_start: Option<usize> = None;
        let mut acc_len = 0usize;

        for &(start, end) in &paragraphs {
            let run_len = end - start;
            match acc_start {
                None => {
                    acc_start = Some(start);
                    acc_len = run_len;
                }
                Some(s) => {
                    if acc_len + run_len <= self.config.chunk_size {
                        acc_len += run_len;
                    } else {
                        spans.push((s, start));
                        acc_start = Some(start);
                        acc_len = run_len;
                    }
                }
            }
        }
        if let Some(s) = acc_start {
            spans.push((s, chars.len()));
        }

        // Fold undersized trailing spans into their predecessor so that
        // parents stay above the fragment floor without dropping text
        let min = self.config.min_fragment_chars;
        let mut folded: Vec<(usize, usize)> = Vec::new();
        for (start, end) in spans {
            let trimmed_len = slice_trimmed(chars, start, end).chars().count();
            match folded.last_mut() {
                Some(last) if trimmed_len < min => last.1 = end,
                _ => folded.push((start, end)),
            }
        }

        folded
    }

    /// Subdivide an oversized parent into overlapping child spans, each
    /// aimed at roughly half the target size and cut at the best
    /// separator boundary in range.
    fn child_spans(&self, chars: &[char], start: usize, end: usize) -> Vec<(usize, usize)> {
        let child_target = (self.config.chunk_size / 2).max(self.config.min_fragment_chars);
        let overlap = self.config.chunk_overlap.min(child_target.saturating_sub(1));

        let mut spans = Vec::new();
        let mut cursor = start;

        while cursor < end {
            let target_end = (cursor + child_target).min(end);
            let split_end = if target_end >= end {
                end
            } else {
                find_split_point(chars, cursor, target_end)
            };

            spans.push((cursor, split_end));

            if split_end >= end {
                break;
            }
            cursor = (split_end.saturating_sub(overlap)).max(cursor + 1);
        }

        spans
    }

    #[allow(clippy::too_many_arguments)]
    fn make_chunk(
        &self,
        document: &Document,
        chunk_id: String,
        text: String,
        char_span: (usize, usize),
        is_parent: bool,
        parent_ref: Option<String>,
        sibling_index: usize,
        parent_preview: Option<String>,
    ) -> Chunk {
        let mut metadata = document.metadata.clone();
        metadata.insert("kind".to_string(), document.kind.to_string());
        if let Some(title) = &document.title {
            metadata.insert("title".to_string(), title.clone());
        }

        Chunk {
            chunk_id,
            source_id: document.source_id.clone(),
            text,
            char_span,
            is_parent,
            parent_ref,
            sibling_index,
            parent_preview,
            metadata,
        }
    }

    /// Estimate token count from text
    pub fn estimate_tokens(text: &str) -> usize {
        text.unicode_words().count()
    }
}

/// Partition the text into paragraph runs: maximal spans separated by
/// blank lines, with separator chars attached to the preceding run so
/// the runs tile the whole text.
fn paragraph_runs(chars: &[char]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] == '\n' {
            // Measure the newline run (with interleaved spaces allowed)
            let mut j = i;
            let mut newlines = 0;
            while j < chars.len() && (chars[j] == '\n' || chars[j] == '\r' || chars[j] == ' ') {
                if chars[j] == '\n' {
                    newlines += 1;
                }
                j += 1;
            }
            if newlines >= 2 {
                runs.push((run_start, j));
                run_start = j;
            }
            i = j;
        } else {
            i += 1;
        }
    }

    if run_start < chars.len() {
        runs.push((run_start, chars.len()));
    }

    runs
}

/// Find the best split point in (start, target_end], preferring larger
/// structural boundaries. Falls back to a hard cut at target_end.
fn find_split_point(chars: &[char], start: usize, target_end: usize) -> usize {
    let lookback = ((target_end - start) / 2).max(1);
    let search_start = target_end.saturating_sub(lookback).max(start + 1);

    for sep in SEPARATORS {
        if sep.is_empty() {
            break;
        }
        let sep_chars: Vec<char> = sep.chars().collect();
        // Last occurrence whose end lands inside the search window
        for i in (search_start..target_end.saturating_sub(sep_chars.len() - 1)).rev() {
            if chars[i..].starts_with(&sep_chars) {
                let split = i + sep_chars.len();
                if split > start && split <= target_end {
                    return split;
                }
            }
        }
    }

    target_end
}

/// Extract a trimmed string slice from a char span
fn slice_trimmed(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect::<String>().trim().to_string()
}
