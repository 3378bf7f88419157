//! Shared records and configuration for the QA insight pipeline.
//!
//! Conversations arrive as loosely typed JSON from an upstream scraper, so the
//! raw shapes here accept strings, numbers, or nulls for most fields and get
//! normalized into [`Conversation`] by the pipeline's grouper.

mod config;
mod conversation;
mod de;
mod pipeline_config;

use std::path::PathBuf;

use thiserror::Error;

pub use config::{
    apply_env_overrides, load_pipeline_config, load_pipeline_config_from_env,
    parse_pipeline_config, read_pipeline_config,
};
pub use conversation::{
    Comment, Conversation, Question, RawConversation, RawRecord, RecordAnalysis,
    DEFAULT_CATEGORY, DEFAULT_COMMENT_CATEGORY, DEFAULT_SENTIMENT,
};
pub use pipeline_config::{
    ClassifierConfig, ClusteringConfig, EmbeddingBackend, EmbeddingConfig, FilterConfig,
    InsightConfig, NoiseHandling, OllamaEmbeddingConfig, PipelineConfig, PipelineMode,
    SentenceTransformersConfig, SpanConfig, SynthesisConfig, VectorStoreBackend,
    VectorStoreConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read pipeline config at {path}: {source}")]
    ConfigFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline config: {0}")]
    ConfigFileParse(#[from] serde_yaml::Error),

    #[error("unknown pipeline mode: {0}")]
    UnknownMode(String),

    #[error("unknown embedding backend: {0}")]
    UnknownEmbeddingBackend(String),

    #[error("unknown vector store backend: {0}")]
    UnknownVectorStore(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
