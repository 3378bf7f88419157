//! YAML-backed pipeline configuration.
//!
//! Every section defaults independently, so a config file only needs to name
//! the values it changes. An empty file yields the template-only pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Processing tier, in increasing order of external dependencies.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Mode A: keyword extraction and template labels, no network.
    #[default]
    #[serde(alias = "a", alias = "A")]
    TemplateOnly,
    /// Mode B: adds embeddings, an ephemeral vector table, and HDBSCAN.
    #[serde(alias = "b", alias = "B")]
    Clustering,
    /// Mode C: adds LLM labels and narrative for the largest clusters.
    #[serde(alias = "c", alias = "C")]
    Synthesis,
}

impl PipelineMode {
    #[must_use]
    pub fn uses_embeddings(self) -> bool {
        self >= Self::Clustering
    }

    #[must_use]
    pub fn uses_llm(self) -> bool {
        self == Self::Synthesis
    }

    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::TemplateOnly => 'A',
            Self::Clustering => 'B',
            Self::Synthesis => 'C',
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TemplateOnly => "template_only",
            Self::Clustering => "clustering",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "template_only" | "template" => Ok(Self::TemplateOnly),
            "b" | "clustering" | "cluster" => Ok(Self::Clustering),
            "c" | "synthesis" | "llm" => Ok(Self::Synthesis),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    SentenceTransformers,
    Ollama,
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence_transformers" | "sentence-transformers" | "tei" => {
                Ok(Self::SentenceTransformers)
            }
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::UnknownEmbeddingBackend(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreBackend {
    #[default]
    Memory,
    Qdrant,
}

impl FromStr for VectorStoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::UnknownVectorStore(s.to_string())),
        }
    }
}

/// What happens to points HDBSCAN labels as noise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseHandling {
    #[default]
    IncludeAsSingletons,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_upvotes: i64,
    pub min_word_count: usize,
    #[serde(alias = "sentiments")]
    pub allowed_sentiments: Vec<String>,
    #[serde(alias = "categories")]
    pub allowed_categories: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_upvotes: 5,
            min_word_count: 10,
            allowed_sentiments: vec!["negative".into(), "neutral".into()],
            allowed_categories: vec!["Question".into(), "Complaint".into(), "Suggestion".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanConfig {
    pub max_span_length: usize,
    pub max_spans_per_question: usize,
    pub min_span_words: usize,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            max_span_length: 200,
            max_spans_per_question: 3,
            min_span_words: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub min_product_area_confidence: f32,
    pub min_journey_stage_confidence: f32,
    /// Categories with fewer distinct keyword hits score zero.
    pub min_keyword_matches: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_product_area_confidence: 0.3,
            min_journey_stage_confidence: 0.4,
            min_keyword_matches: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceTransformersConfig {
    /// Base URL of a text-embeddings-inference server hosting the model.
    pub url: String,
    pub model_name: String,
    pub dimension: usize,
}

impl Default for SentenceTransformersConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".into(),
            model_name: "sentence-transformers/all-MiniLM-L6-v2".into(),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaEmbeddingConfig {
    pub base_url: String,
    pub model_name: String,
    pub dimension: usize,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model_name: "nomic-embed-text".into(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub sentence_transformers: SentenceTransformersConfig,
    pub ollama: OllamaEmbeddingConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            batch_size: 64,
            timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            sentence_transformers: SentenceTransformersConfig::default(),
            ollama: OllamaEmbeddingConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    /// Dimension the selected backend is expected to produce.
    #[must_use]
    pub fn expected_dimension(&self) -> usize {
        match self.backend {
            EmbeddingBackend::SentenceTransformers => self.sentence_transformers.dimension,
            EmbeddingBackend::Ollama => self.ollama.dimension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorStoreBackend,
    pub qdrant_url: String,
    /// Run tables are named `{table_prefix}_{run_id}`.
    pub table_prefix: String,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorStoreBackend::default(),
            qdrant_url: "http://localhost:6333".into(),
            table_prefix: "pain_spans".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub max_clusters: usize,
    pub noise_handling: NoiseHandling,
    /// Let the whole dataset form one cluster when nothing splits off.
    pub allow_single_cluster: bool,
    /// Clusters split below this distance are merged back together.
    pub cluster_selection_epsilon: f64,
    /// Members farther than this from their cluster centroid (Euclidean on
    /// unit vectors) become noise.
    pub max_member_distance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            min_samples: 2,
            max_clusters: 50,
            noise_handling: NoiseHandling::default(),
            allow_single_cluster: true,
            cluster_selection_epsilon: 0.5,
            max_member_distance: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub ollama_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_clusters_to_synthesize: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".into(),
            model: "smollm2:360m".into(),
            temperature: 0.3,
            max_clusters_to_synthesize: 20,
            timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub max_evidence_per_card: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            max_evidence_per_card: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    pub log_level: String,
    pub filter: FilterConfig,
    pub span_extraction: SpanConfig,
    pub classification: ClassifierConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub clustering: ClusteringConfig,
    pub synthesis: SynthesisConfig,
    pub insight: InsightConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            log_level: "info".into(),
            filter: FilterConfig::default(),
            span_extraction: SpanConfig::default(),
            classification: ClassifierConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            clustering: ClusteringConfig::default(),
            synthesis: SynthesisConfig::default(),
            insight: InsightConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        if self.filter.min_word_count == 0 {
            return fail("filter.min_word_count must be at least 1");
        }
        if self.span_extraction.max_span_length == 0 {
            return fail("span_extraction.max_span_length must be at least 1");
        }
        if self.span_extraction.max_spans_per_question == 0 {
            return fail("span_extraction.max_spans_per_question must be at least 1");
        }
        for (name, value) in [
            (
                "classification.min_product_area_confidence",
                self.classification.min_product_area_confidence,
            ),
            (
                "classification.min_journey_stage_confidence",
                self.classification.min_journey_stage_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.classification.min_keyword_matches == 0 {
            return fail("classification.min_keyword_matches must be at least 1");
        }
        if self.embedding.batch_size == 0 {
            return fail("embedding.batch_size must be at least 1");
        }
        if self.embedding.expected_dimension() == 0 {
            return fail("embedding dimension must be at least 1");
        }
        if self.vector_store.table_prefix.trim().is_empty() {
            return fail("vector_store.table_prefix must not be empty");
        }
        if self.clustering.min_cluster_size < 2 {
            return fail("clustering.min_cluster_size must be at least 2");
        }
        if self.clustering.min_samples == 0 {
            return fail("clustering.min_samples must be at least 1");
        }
        if self.clustering.min_samples > self.clustering.min_cluster_size {
            return fail("clustering.min_samples must not exceed clustering.min_cluster_size");
        }
        if self.clustering.max_clusters == 0 {
            return fail("clustering.max_clusters must be at least 1");
        }
        if !(self.clustering.cluster_selection_epsilon.is_finite()
            && self.clustering.cluster_selection_epsilon >= 0.0)
        {
            return fail("clustering.cluster_selection_epsilon must be a non-negative number");
        }
        if !(self.clustering.max_member_distance.is_finite()
            && self.clustering.max_member_distance > 0.0)
        {
            return fail("clustering.max_member_distance must be a positive number");
        }
        if !(0.0..=2.0).contains(&self.synthesis.temperature) {
            return fail("synthesis.temperature must be within [0, 2]");
        }
        if self.insight.max_evidence_per_card == 0 {
            return fail("insight.max_evidence_per_card must be at least 1");
        }
        Ok(())
    }
}
