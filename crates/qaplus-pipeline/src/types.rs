use std::fmt;

use qaplus_core::PipelineMode;
use serde::{Deserialize, Serialize};

/// Label HDBSCAN assigns to points outside every dense cluster.
pub const NOISE_LABEL: i32 = -1;

/// A short fragment of a question believed to describe a pain point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Display text, at most `max_span_length` characters.
    pub text: String,
    /// The full sentence the span was cut from.
    pub sentence: String,
    pub pain_keywords: Vec<String>,
    /// Keyword density in `[0, 1]`, rounded to three decimals.
    pub confidence: f32,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductArea {
    Deployment,
    Reliability,
    Performance,
    PricingBilling,
    DataManagement,
    Security,
    Usability,
}

impl ProductArea {
    pub const ALL: [Self; 7] = [
        Self::Deployment,
        Self::Reliability,
        Self::Performance,
        Self::PricingBilling,
        Self::DataManagement,
        Self::Security,
        Self::Usability,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Reliability => "reliability",
            Self::Performance => "performance",
            Self::PricingBilling => "pricing_billing",
            Self::DataManagement => "data_management",
            Self::Security => "security",
            Self::Usability => "usability",
        }
    }

    /// Human-facing name used in template labels.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Reliability => "Reliability",
            Self::Performance => "Performance",
            Self::PricingBilling => "Pricing/Billing",
            Self::DataManagement => "Data Management",
            Self::Security => "Security",
            Self::Usability => "Usability",
        }
    }
}

impl fmt::Display for ProductArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    Shipping,
    Scaling,
    Building,
    FirstUse,
    Evaluation,
    Troubleshooting,
}

impl JourneyStage {
    /// Tie-break order: on equal confidence the earlier stage wins.
    pub const PRIORITY: [Self; 6] = [
        Self::Shipping,
        Self::Scaling,
        Self::Building,
        Self::FirstUse,
        Self::Evaluation,
        Self::Troubleshooting,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Scaling => "scaling",
            Self::Building => "building",
            Self::FirstUse => "first_use",
            Self::Evaluation => "evaluation",
            Self::Troubleshooting => "troubleshooting",
        }
    }
}

impl fmt::Display for JourneyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a keyword classifier. `category` is `None` when the best score
/// misses the threshold; `confidence` still reports that best score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult<C> {
    pub category: Option<C>,
    pub confidence: f32,
}

impl<C> ClassificationResult<C> {
    #[must_use]
    pub fn none() -> Self {
        Self {
            category: None,
            confidence: 0.0,
        }
    }
}

/// A span with its classifications and template label attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSpan {
    pub span: Span,
    pub product_area: ClassificationResult<ProductArea>,
    pub journey_stage: ClassificationResult<JourneyStage>,
    pub template_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionSource {
    Question,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionType {
    Workaround,
    Implementation,
    Configuration,
    ExternalTool,
    BestPractice,
    GeneralSolution,
}

/// A solution-like statement with only observed signals attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub text: String,
    pub source: SolutionSource,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub upvotes: i64,
    pub solution_type: SolutionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: i32,
    /// Indices into the clustered vector list, ascending.
    pub members: Vec<usize>,
    pub size: usize,
}

/// A noise point kept as its own one-member group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Singleton {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringResult {
    /// One label per input vector; [`NOISE_LABEL`] for noise.
    pub labels: Vec<i32>,
    pub clusters: Vec<Cluster>,
    /// Empty when noise handling is `discard`.
    pub singletons: Vec<Singleton>,
    pub noise_count: usize,
    /// L2-normalized copies of the input vectors.
    #[serde(skip)]
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// `None` unless at least two clusters have two or more members.
    pub silhouette_score: Option<f32>,
    pub avg_intra_cluster_cosine_similarity: Option<f32>,
    /// Mean `1 - cosine` between cluster centroids.
    pub avg_inter_cluster_separation: Option<f32>,
    pub noise_percentage: f32,
    pub num_clusters: usize,
    pub num_noise_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Numeric intensity used by the legacy pain-point schema.
    #[must_use]
    pub fn intensity(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    Template,
    Llm,
}

/// The canonical output unit: one theme of feedback with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightCard {
    pub label: String,
    pub label_source: LabelSource,
    /// Most representative spans first, capped at `max_evidence_per_card`.
    pub evidence: Vec<Span>,
    /// Total supporting spans, including any beyond the evidence cap.
    pub evidence_count: usize,
    pub product_area: Option<ProductArea>,
    pub journey_stage: Option<JourneyStage>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPainPoint {
    pub pain_point: String,
    pub frequency: usize,
    pub intensity: u8,
    pub category: String,
    pub sentiment_impact: String,
    pub examples: Vec<String>,
    pub associated_solutions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyReport {
    pub pain_points: Vec<LegacyPainPoint>,
    pub total_count: usize,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub conversations_in: usize,
    pub conversations_passed: usize,
    pub spans: usize,
    pub solutions: usize,
    pub clusters: usize,
    pub noise_points: usize,
    /// Clusters sent to the model, including ones whose calls failed.
    pub synthesized_clusters: usize,
    pub llm_labeled_clusters: usize,
}

/// Everything a run produces. `effective_mode` can be lower than the
/// requested mode when a backend was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub run_id: String,
    pub requested_mode: PipelineMode,
    pub effective_mode: PipelineMode,
    pub insight_cards: Vec<InsightCard>,
    pub legacy: LegacyReport,
    pub solutions: Vec<Solution>,
    pub cluster_metrics: Option<ClusterMetrics>,
    pub stats: RunStats,
}
