//! Configuration for the Fathom pipeline

mod logging;
mod pipeline;
mod services;

pub use logging::{init_tracing, LogFormat, LogLevel, LoggingConfig};
pub use pipeline::{
    ChunkingConfig, DiversityConfig, ExpansionConfig, FormatConfig, IndexConfig, RerankConfig,
    RetrievalConfig,
};
pub use services::{CompletionServiceConfig, EmbeddingServiceConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Dense index configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// Retrieval and fusion configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Query expansion configuration
    #[serde(default)]
    pub expansion: ExpansionConfig,
    /// Reranking configuration
    #[serde(default)]
    pub rerank: RerankConfig,
    /// Source diversity configuration
    #[serde(default)]
    pub diversity: DiversityConfig,
    /// Result formatting configuration
    #[serde(default)]
    pub formatting: FormatConfig,
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingServiceConfig,
    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionServiceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, validating all fields.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Embedding validation
        if self.embedding.dimensions == 0 {
            errors.push("embedding dimensions must be positive".to_string());
        }
        if self.embedding.dimensions > 4096 {
            errors.push("embedding dimensions must be <= 4096".to_string());
        }

        // Chunking validation
        if self.chunking.chunk_size == 0 {
            errors.push("chunk_size must be positive".to_string());
        }
        if self.chunking.chunk_size > 8192 {
            errors.push("chunk_size must be <= 8192".to_string());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            errors.push("chunk_overlap must be smaller than chunk_size".to_string());
        }
        if self.chunking.min_fragment_chars == 0 {
            errors.push("min_fragment_chars must be positive".to_string());
        }

        // Retrieval validation
        if self.retrieval.dense_weight < 0.0 || self.retrieval.dense_weight > 1.0 {
            errors.push("dense_weight must be between 0.0 and 1.0".to_string());
        }
        if self.retrieval.overfetch_factor < 1 {
            errors.push("overfetch_factor must be at least 1".to_string());
        }
        if self.retrieval.lexical_scale <= 0.0 {
            errors.push("lexical_scale must be positive".to_string());
        }
        if self.retrieval.max_merge_gap == 0 {
            errors.push("max_merge_gap must be positive".to_string());
        }
        if self.retrieval.dedup_prefix_chars == 0 {
            errors.push("dedup_prefix_chars must be positive".to_string());
        }

        // Expansion validation
        if self.expansion.num_variants == 0 {
            errors.push("num_variants must be positive".to_string());
        }
        if self.expansion.timeout_secs == 0 {
            errors.push("expansion timeout_secs must be positive".to_string());
        }

        // Rerank validation
        if self.rerank.rerank_weight < 0.0 || self.rerank.rerank_weight > 1.0 {
            errors.push("rerank_weight must be between 0.0 and 1.0".to_string());
        }
        if self.rerank.preview_chars == 0 {
            errors.push("rerank preview_chars must be positive".to_string());
        }
        if self.rerank.timeout_secs == 0 {
            errors.push("rerank timeout_secs must be positive".to_string());
        }

        // Diversity validation
        if self.diversity.min_sources == 0 {
            errors.push("min_sources must be positive".to_string());
        }

        // Formatting validation
        let f = &self.formatting;
        if !(f.fair_threshold < f.good_threshold && f.good_threshold < f.excellent_threshold) {
            errors.push(
                "confidence thresholds must be strictly increasing (fair < good < excellent)"
                    .to_string(),
            );
        }

        // Index validation
        if self.index.hnsw_m == 0 {
            errors.push("HNSW M parameter must be positive".to_string());
        }
        if self.index.hnsw_ef_construction == 0 {
            errors.push("ef_construction must be positive".to_string());
        }
        if self.index.hnsw_ef_search == 0 {
            errors.push("ef_search must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn default_config_passes_validation() {
        let cfg = valid_config();
        assert!(cfg.validate().is_ok(), "default config should be valid");
    }

    #[test]
    fn validate_rejects_zero_embedding_dimensions() {
        let mut cfg = valid_config();
        cfg.embedding.dimensions = 0;
        let err = cfg.validate().unwrap_err();
        assert!(
            err.to_string().contains("embedding dimensions must be positive"),
            "unexpected error message: {}",
            err
        );
    }

    #[test]
    fn validate_rejects_oversized_embedding_dimensions() {
        let mut cfg = valid_config();
        cfg.embedding.dimensions = 5000;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("embedding dimensions must be <= 4096"));
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut cfg = valid_config();
        cfg.chunking.chunk_size = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size must be positive"));
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_chunk() {
        let mut cfg = valid_config();
        cfg.chunking.chunk_overlap = cfg.chunking.chunk_size;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap must be smaller"));
    }

    #[test]
    fn validate_rejects_out_of_range_dense_weight() {
        let mut cfg = valid_config();
        cfg.retrieval.dense_weight = 1.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("dense_weight must be between 0.0 and 1.0"));
    }

    #[test]
    fn validate_rejects_out_of_range_rerank_weight() {
        let mut cfg = valid_config();
        cfg.rerank.rerank_weight = -0.1;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("rerank_weight must be between 0.0 and 1.0"));
    }

    #[test]
    fn validate_rejects_non_increasing_thresholds() {
        let mut cfg = valid_config();
        cfg.formatting.good_threshold = cfg.formatting.excellent_threshold;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.embedding.dimensions = 0;
        cfg.chunking.chunk_size = 0;
        cfg.index.hnsw_m = 0;
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("embedding dimensions must be positive"));
        assert!(msg.contains("chunk_size must be positive"));
        assert!(msg.contains("HNSW M parameter must be positive"));
    }

    #[test]
    fn default_retrieval_config_values() {
        let ret = RetrievalConfig::default();
        assert!(ret.enable_dense);
        assert!(ret.enable_lexical);
        assert!((ret.dense_weight - 0.6).abs() < f32::EPSILON);
        assert_eq!(ret.overfetch_factor, 4);
        assert!((ret.lexical_scale - 10.0).abs() < f32::EPSILON);
        assert_eq!(ret.max_merge_gap, 3);
        assert_eq!(ret.dedup_prefix_chars, 160);
    }

    #[test]
    fn default_chunking_config_values() {
        let ch = ChunkingConfig::default();
        assert_eq!(ch.chunk_size, 800);
        assert_eq!(ch.chunk_overlap, 120);
        assert_eq!(ch.min_fragment_chars, 20);
        assert_eq!(ch.parent_preview_chars, 240);
    }

    #[test]
    fn default_expansion_config_values() {
        let exp = ExpansionConfig::default();
        assert_eq!(exp.num_variants, 3);
        assert_eq!(exp.min_variant_chars, 10);
        assert_eq!(exp.timeout_secs, 15);
    }

    #[test]
    fn default_rerank_config_values() {
        let rr = RerankConfig::default();
        assert!((rr.rerank_weight - 0.6).abs() < f32::EPSILON);
        assert!((rr.position_epsilon - 0.01).abs() < f32::EPSILON);
        assert_eq!(rr.preview_chars, 500);
        assert_eq!(rr.timeout_secs, 20);
    }

    #[test]
    fn default_formatting_bands() {
        let f = FormatConfig::default();
        assert!(f.fair_threshold < f.good_threshold);
        assert!(f.good_threshold < f.excellent_threshold);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&text).expect("deserialize");
        assert!(back.validate().is_ok());
        assert_eq!(back.chunking.chunk_size, cfg.chunking.chunk_size);
        assert_eq!(back.embedding.dimensions, cfg.embedding.dimensions);
    }
}
