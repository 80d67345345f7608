//! Query expansion: multi-query paraphrasing and hypothetical answers
//!
//! Pure text transformation around two completion-service calls. The
//! stage tolerates a slow, rate-limited, or absent service: every
//! failure path falls back to the original query.

use crate::config::ExpansionConfig;
use crate::services::CompletionBackend;
use crate::types::SearchOptions;
use crate::util::truncate_str;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Expands one user query into retrieval variants
pub struct QueryExpander {
    completion: Option<Arc<dyn CompletionBackend>>,
    config: ExpansionConfig,
}

impl QueryExpander {
    pub fn new(completion: Option<Arc<dyn CompletionBackend>>, config: ExpansionConfig) -> Self {
        Self { completion, config }
    }

    /// Expand a query into variants; element 0 is always the original.
    ///
    /// With multi-query enabled, paraphrases from the completion service
    /// are appended. With HyDE enabled, a hypothetical answer is
    /// generated and appended to each variant's text, closing the
    /// phrasing gap between questions and answers in embedding space.
    pub async fn expand(&self, query: &str, options: &SearchOptions) -> Vec<String> {
        let mut variants = vec![query.to_string()];

        let backend = match &self.completion {
            Some(b) => b,
            None => return variants,
        };

        let wants_multi = options.use_multi_query && self.config.num_variants > 1;
        let wants_hyde = options.use_hyde;

        if !wants_multi && !wants_hyde {
            return variants;
        }

        let call_timeout = Duration::from_secs(self.config.timeout_secs);

        // Independent calls, independent timeouts, run concurrently
        let (paraphrases, hypothesis) = tokio::join!(
            async {
                if !wants_multi {
                    return None;
                }
                let prompt = self.paraphrase_prompt(query);
                match timeout(call_timeout, backend.complete(&prompt)).await {
                    Ok(Ok(text)) => Some(text),
                    Ok(Err(e)) => {
                        warn!("Multi-query generation failed: {}. Using original query.", e);
                        None
                    }
                    Err(_) => {
                        warn!("Multi-query generation timed out. Using original query.");
                        None
                    }
                }
            },
            async {
                if !wants_hyde {
                    return None;
                }
                let prompt = hyde_prompt(query);
                match timeout(call_timeout, backend.complete(&prompt)).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
                    Ok(Ok(_)) => None,
                    Ok(Err(e)) => {
                        warn!("HyDE expansion failed: {}. Using unmodified query.", e);
                        None
                    }
                    Err(_) => {
                        warn!("HyDE expansion timed out. Using unmodified query.");
                        None
                    }
                }
            },
        );

        if let Some(text) = paraphrases {
            let accepted = self.parse_paraphrases(query, &text);
            debug!("Multi-query generation produced {} usable variants", accepted.len());
            variants.extend(accepted);
        }

        if let Some(answer) = hypothesis {
            debug!(
                "Query expanded with hypothetical answer ({} chars): {}",
                answer.len(),
                truncate_str(&answer, 80)
            );
            for variant in &mut variants {
                *variant = format!("{} {}", variant, answer);
            }
        }

        variants
    }

    fn paraphrase_prompt(&self, query: &str) -> String {
        format!(
            "Generate {} alternative phrasings of the following search query. \
             Vary the terminology and wording while keeping the meaning. \
             Output one phrasing per line, nothing else.\n\nQuery: {}",
            self.config.num_variants - 1,
            query
        )
    }

    /// Keep usable paraphrases: non-empty, long enough, not just the
    /// original query again
    fn parse_paraphrases(&self, original: &str, text: &str) -> Vec<String> {
        let original_lower = original.trim().to_lowercase();
        let mut seen = vec![original_lower.clone()];

        text.lines()
            .map(strip_list_marker)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| line.chars().count() >= self.config.min_variant_chars)
            .filter_map(|line| {
                let lower = line.to_lowercase();
                if seen.contains(&lower) {
                    None
                } else {
                    seen.push(lower);
                    Some(line.to_string())
                }
            })
            .take(self.config.num_variants.saturating_sub(1))
            .collect()
    }
}

fn hyde_prompt(query: &str) -> String {
    format!(
        "Given the following question, write a detailed, factual answer as if \
         you were responding from a knowledge base. Keep it concise (2-3 \
         sentences) and focused on facts.\n\nQuestion: {}\n\nAnswer:",
        query
    )
}

/// Strip leading list markers ("1.", "-", "*") that models often add
/// despite instructions
fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    let without_number = trimmed
        .strip_prefix(|c: char| c.is_ascii_digit())
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_digit()))
        .and_then(|rest| rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')))
        .unwrap_or(trimmed);
    without_number
        .trim_start_matches(['-', '*', '•'])
        .trim_start()
}
