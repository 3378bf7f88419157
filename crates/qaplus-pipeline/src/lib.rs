//! QA insight extraction pipeline.
//!
//! Turns grouped Q&A conversations into evidence-backed insight cards. Mode A
//! runs entirely offline on keyword tables. Mode B embeds pain spans, writes
//! them to a per-run vector table, and clusters them with HDBSCAN. Mode C adds
//! LLM-written labels and narrative for the largest clusters. Each tier falls
//! back to the one below when its backend is unavailable.

pub mod classifier;
pub mod clustering;
pub mod embeddings;
pub mod error;
pub mod filter;
pub mod grouper;
pub mod insight;
pub mod label;
pub mod legacy;
pub mod metrics;
pub mod pipeline;
pub mod solution;
pub mod span;
pub mod synthesizer;
pub mod types;
pub mod vector_store;

mod qdrant;
mod retry;
mod similarity;
mod text;

pub use classifier::{JourneyStageClassifier, ProductAreaClassifier};
pub use clustering::HdbscanClustering;
pub use embeddings::{EmbeddingPlugin, EmbeddingWrapper, OllamaEmbedder, SentenceEmbedder};
pub use error::PipelineError;
pub use filter::{FilterMetadata, FilterRecord, Filtered, InputFilter};
pub use grouper::EvidencePreservingGrouper;
pub use insight::{calculate_severity, CardDraft, InsightCardGenerator};
pub use label::TemplateLabelGenerator;
pub use legacy::LegacyAdapter;
pub use metrics::ClusterQualityMetrics;
pub use pipeline::{new_run_id, QaProcessorPlus};
pub use solution::SolutionExtractorV2;
pub use span::PainSpanExtractor;
pub use synthesizer::{ClusterSynthesis, LlmSynthesizer, OllamaGenerator, TextGenerator};
pub use types::{
    ClassificationResult, ClassifiedSpan, Cluster, ClusterMetrics, ClusteringResult,
    InsightCard, JourneyStage, LabelSource, LegacyPainPoint, LegacyReport, PipelineOutput,
    ProductArea, RunStats, Severity, Singleton, Solution, SolutionSource, SolutionType, Span,
    NOISE_LABEL,
};
pub use vector_store::{EphemeralTable, SearchHit, SpanPayload, TableMeta, VectorRecord, VectorStore};
