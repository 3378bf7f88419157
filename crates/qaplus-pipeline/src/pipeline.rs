//! Run orchestration.

use std::collections::HashSet;

use chrono::Utc;
use qaplus_core::{Conversation, PipelineConfig, PipelineMode};
use uuid::Uuid;

use crate::classifier::{JourneyStageClassifier, ProductAreaClassifier};
use crate::clustering::HdbscanClustering;
use crate::embeddings::{EmbeddingPlugin, EmbeddingWrapper};
use crate::error::PipelineError;
use crate::filter::InputFilter;
use crate::insight::{CardDraft, InsightCardGenerator};
use crate::label::TemplateLabelGenerator;
use crate::legacy::LegacyAdapter;
use crate::metrics::ClusterQualityMetrics;
use crate::similarity::centroid;
use crate::solution::SolutionExtractorV2;
use crate::span::PainSpanExtractor;
use crate::synthesizer::{LlmSynthesizer, OllamaGenerator, TextGenerator};
use crate::types::{
    ClassificationResult, ClassifiedSpan, Cluster, ClusterMetrics, ClusteringResult,
    InsightCard, JourneyStage, LabelSource, PipelineOutput, ProductArea, RunStats, Solution, Span,
};
use crate::vector_store::{EphemeralTable, SpanPayload, TableMeta, VectorRecord, VectorStore};

/// A fresh run identifier: `{yyyymmddHHMMSS}_{8 hex}`.
#[must_use]
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

/// The whole pipeline for one configuration.
///
/// Backends are optional: without an embedder the run stays in mode A, and
/// without a text generator mode C stops at B.
pub struct QaProcessorPlus<E = EmbeddingWrapper, G = OllamaGenerator> {
    config: PipelineConfig,
    filter: InputFilter,
    spans: PainSpanExtractor,
    product_areas: ProductAreaClassifier,
    journey_stages: JourneyStageClassifier,
    labels: TemplateLabelGenerator,
    solutions: SolutionExtractorV2,
    embedder: Option<E>,
    vector_store: VectorStore,
    clustering: HdbscanClustering,
    synthesizer: Option<LlmSynthesizer<G>>,
    insights: InsightCardGenerator,
    legacy: LegacyAdapter,
}

/// Cards plus diagnostics from a successful clustered run.
struct ClusteredCards {
    cards: Vec<InsightCard>,
    metrics: ClusterMetrics,
    clusters: usize,
    noise_points: usize,
    synthesized: usize,
    /// Synthesized clusters whose label came back from the model.
    llm_labeled: usize,
}

/// One future card: a cluster or a lone span.
struct Group {
    cluster_id: Option<i32>,
    /// Indices into the run's span list, most representative first.
    spans: Vec<usize>,
}

impl QaProcessorPlus {
    /// Build the pipeline with the backends the configured mode needs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for an invalid configuration, or
    /// [`PipelineError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let embedder = if config.mode.uses_embeddings() {
            Some(EmbeddingWrapper::from_config(&config.embedding)?)
        } else {
            None
        };
        let generator = if config.mode.uses_llm() {
            Some(OllamaGenerator::from_config(&config.synthesis)?)
        } else {
            None
        };
        let vector_store = VectorStore::from_config(&config.vector_store)?;
        Ok(Self::with_backends(config, embedder, vector_store, generator))
    }
}

impl<E: EmbeddingPlugin, G: TextGenerator> QaProcessorPlus<E, G> {
    pub fn with_backends(
        config: PipelineConfig,
        embedder: Option<E>,
        vector_store: VectorStore,
        generator: Option<G>,
    ) -> Self {
        let synthesizer = generator
            .map(|g| LlmSynthesizer::new(g, config.synthesis.max_clusters_to_synthesize));
        Self {
            filter: InputFilter::new(&config.filter),
            spans: PainSpanExtractor::new(&config.span_extraction),
            product_areas: ProductAreaClassifier::new(&config.classification),
            journey_stages: JourneyStageClassifier::new(&config.classification),
            labels: TemplateLabelGenerator::new(),
            solutions: SolutionExtractorV2::new(),
            clustering: HdbscanClustering::new(&config.clustering),
            insights: InsightCardGenerator::new(&config.insight),
            legacy: LegacyAdapter::new(),
            embedder,
            vector_store,
            synthesizer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    /// Process one batch of conversations.
    ///
    /// 1. Filter conversations on engagement and quality.
    /// 2. Extract pain spans from each question, then classify and label them.
    /// 3. Extract solutions from every turn.
    /// 4. Modes B/C: embed spans into the run's vector table, cluster, and
    ///    build one card per cluster and per noise singleton. Mode C adds LLM
    ///    synthesis for the largest clusters. The table is dropped afterwards.
    /// 5. Mode A, or B/C after an upstream failure: one card per span.
    /// 6. Project cards into the legacy schema.
    ///
    /// # Errors
    ///
    /// Only fatal errors (dimension mismatch, invalid clustering input) are
    /// returned. Unreachable backends degrade the run to mode A.
    pub async fn run(
        &self,
        conversations: &[Conversation],
        run_id: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        let requested_mode = self.config.mode;
        tracing::info!(
            run_id,
            mode = %requested_mode,
            conversations = conversations.len(),
            "pipeline run started"
        );

        let passed = self.filter.filter_records(conversations.iter());

        let classified: Vec<ClassifiedSpan> = passed
            .iter()
            .flat_map(|c| self.spans.extract_spans(&c.question))
            .map(|span| self.classify_span(span))
            .collect();

        let solutions: Vec<Solution> = passed
            .iter()
            .flat_map(|c| self.solutions.extract_solutions(c))
            .collect();

        let mut stats = RunStats {
            conversations_in: conversations.len(),
            conversations_passed: passed.len(),
            spans: classified.len(),
            solutions: solutions.len(),
            ..RunStats::default()
        };
        tracing::info!(
            run_id,
            passed = stats.conversations_passed,
            spans = stats.spans,
            solutions = stats.solutions,
            "extraction complete"
        );

        let mut effective_mode = self.available_mode();
        let mut cluster_metrics = None;
        let cards = match &self.embedder {
            Some(embedder) if effective_mode.uses_embeddings() && !classified.is_empty() => {
                match self
                    .clustered_cards(embedder, run_id, &classified, effective_mode.uses_llm())
                    .await
                {
                    Ok(outcome) => {
                        stats.clusters = outcome.clusters;
                        stats.noise_points = outcome.noise_points;
                        stats.synthesized_clusters = outcome.synthesized;
                        stats.llm_labeled_clusters = outcome.llm_labeled;
                        if outcome.synthesized > 0 && outcome.llm_labeled == 0 {
                            tracing::warn!(
                                run_id,
                                attempted = outcome.synthesized,
                                "every synthesis call failed, keeping template labels"
                            );
                            effective_mode = PipelineMode::Clustering;
                        }
                        cluster_metrics = Some(outcome.metrics);
                        outcome.cards
                    }
                    Err(e) if e.is_fatal() => {
                        tracing::error!(run_id, error = %e, "pipeline run aborted");
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!(
                            run_id,
                            error = %e,
                            "clustering unavailable, falling back to template cards"
                        );
                        effective_mode = PipelineMode::TemplateOnly;
                        self.template_cards(&classified)
                    }
                }
            }
            _ => self.template_cards(&classified),
        };

        let legacy = self.legacy.convert_to_legacy_pain_points(&cards);
        tracing::info!(
            run_id,
            effective_mode = %effective_mode,
            cards = cards.len(),
            clusters = stats.clusters,
            synthesized = stats.synthesized_clusters,
            "pipeline run finished"
        );

        Ok(PipelineOutput {
            run_id: run_id.to_string(),
            requested_mode,
            effective_mode,
            insight_cards: cards,
            legacy,
            solutions,
            cluster_metrics,
            stats,
        })
    }

    /// Drop the run's vector table if it still exists. Safe to call after a
    /// cancelled or completed run.
    pub async fn cleanup_run(&self, run_id: &str) {
        let name = self.vector_store.table_name(run_id);
        match self.vector_store.drop_table(&name).await {
            Ok(()) => tracing::info!(table = %name, "dropped leftover vector table"),
            Err(PipelineError::TableNotFound(_)) => {}
            Err(e) => tracing::warn!(table = %name, error = %e, "failed to drop vector table"),
        }
    }

    /// The configured mode, lowered to what the attached backends support.
    fn available_mode(&self) -> PipelineMode {
        let mut mode = self.config.mode;
        if mode.uses_llm() && self.synthesizer.is_none() {
            tracing::warn!("no text generator attached, synthesis disabled");
            mode = PipelineMode::Clustering;
        }
        if mode.uses_embeddings() && self.embedder.is_none() {
            tracing::warn!("no embedding backend attached, clustering disabled");
            mode = PipelineMode::TemplateOnly;
        }
        mode
    }

    fn classify_span(&self, span: Span) -> ClassifiedSpan {
        let product_area = self.product_areas.classify(&span.text);
        let journey_stage = self.journey_stages.classify(&span.text);
        let template_label =
            self.labels
                .generate_label(product_area.category, &span.pain_keywords, &span.text);
        ClassifiedSpan {
            span,
            product_area,
            journey_stage,
            template_label,
        }
    }

    fn template_cards(&self, classified: &[ClassifiedSpan]) -> Vec<InsightCard> {
        classified
            .iter()
            .cloned()
            .map(|c| self.insights.generate(CardDraft::from_span(c)))
            .collect()
    }

    async fn clustered_cards(
        &self,
        embedder: &E,
        run_id: &str,
        classified: &[ClassifiedSpan],
        synthesize: bool,
    ) -> Result<ClusteredCards, PipelineError> {
        let texts: Vec<String> = classified.iter().map(|c| c.span.text.clone()).collect();
        let vectors = embedder.encode(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(PipelineError::CountMismatch {
                service: "embedding",
                expected: texts.len(),
                got: vectors.len(),
            });
        }

        let records: Vec<VectorRecord> = vectors
            .into_iter()
            .zip(classified)
            .enumerate()
            .map(|(i, (vector, c))| VectorRecord {
                id: u64::try_from(i).unwrap_or(u64::MAX),
                vector,
                payload: SpanPayload {
                    span_index: i,
                    text: c.span.text.clone(),
                    post_id: c.span.post_id.clone(),
                    post_url: c.span.post_url.clone(),
                    confidence: c.span.confidence,
                },
            })
            .collect();
        let meta = TableMeta {
            embedding_model: embedder.model_name().to_string(),
            embedding_dimension: embedder.dimension(),
            created_at: Utc::now().to_rfc3339(),
        };

        let table = match self.vector_store.create_table(run_id, records, meta).await {
            Ok(table) => table,
            Err(e) => {
                // A partially created table would otherwise outlive the run.
                self.cleanup_run(run_id).await;
                return Err(e);
            }
        };
        let outcome = self
            .cards_from_table(&table, embedder.dimension(), classified, synthesize)
            .await;
        table.cleanup().await;
        outcome
    }

    async fn cards_from_table(
        &self,
        table: &EphemeralTable<'_>,
        dimension: usize,
        classified: &[ClassifiedSpan],
        synthesize: bool,
    ) -> Result<ClusteredCards, PipelineError> {
        table.validate_dimension(dimension).await?;
        let (result, payloads) = self.clustering.cluster_table(table).await?;
        let metrics = ClusterQualityMetrics::compute(&result.vectors, &result.labels);

        let mut clusters: Vec<&Cluster> = result.clusters.iter().collect();
        clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));

        let mut groups = Vec::with_capacity(clusters.len() + result.singletons.len());
        for cluster in clusters {
            groups.push(Group {
                cluster_id: Some(cluster.id),
                spans: rank_members(table, &result, &payloads, cluster).await,
            });
        }
        groups.extend(result.singletons.iter().map(|s| Group {
            cluster_id: None,
            spans: vec![payloads[s.index].span_index],
        }));

        let synthesizer = self.synthesizer.as_ref().filter(|_| synthesize);
        let mut synthesized = 0usize;
        let mut llm_labeled = 0usize;
        let mut cards = Vec::with_capacity(groups.len());
        for group in groups {
            let mut draft = self.group_draft(&group, classified);
            if let Some(synth) = synthesizer {
                if group.cluster_id.is_some() && synthesized < synth.max_clusters() {
                    let texts: Vec<&str> = draft.evidence.iter().map(|s| s.text.as_str()).collect();
                    let synthesis = synth.synthesize(&texts, &draft.label).await;
                    synthesized += 1;
                    if let Some(label) = synthesis.label {
                        draft.label = label;
                        draft.label_source = LabelSource::Llm;
                        llm_labeled += 1;
                    }
                    draft.why_it_matters = synthesis.why_it_matters;
                    draft.open_questions = synthesis.open_questions;
                }
            }
            cards.push(self.insights.generate(draft));
        }

        Ok(ClusteredCards {
            cards,
            metrics,
            clusters: result.clusters.len(),
            noise_points: result.noise_count,
            synthesized,
            llm_labeled,
        })
    }

    fn group_draft(&self, group: &Group, classified: &[ClassifiedSpan]) -> CardDraft {
        let members: Vec<&ClassifiedSpan> = group.spans.iter().map(|&i| &classified[i]).collect();
        let evidence: Vec<Span> = members.iter().map(|c| c.span.clone()).collect();

        if group.cluster_id.is_none() {
            if let Some(only) = members.first() {
                let mut draft = CardDraft::from_span((*only).clone());
                draft.evidence = evidence;
                return draft;
            }
        }

        let product_area = majority(
            members.iter().map(|c| &c.product_area),
            &ProductArea::ALL,
        );
        let journey_stage = majority(
            members.iter().map(|c| &c.journey_stage),
            &JourneyStage::PRIORITY,
        );
        let label = match members.first() {
            Some(top) => {
                self.labels
                    .generate_label(product_area, &top.span.pain_keywords, &top.span.text)
            }
            None => String::new(),
        };
        CardDraft {
            label,
            label_source: LabelSource::Template,
            evidence,
            product_area,
            journey_stage,
            cluster_id: group.cluster_id,
            why_it_matters: None,
            open_questions: Vec::new(),
        }
    }
}

/// Cluster members ordered by similarity to the cluster centroid. Falls back
/// to index order if the table cannot be searched.
async fn rank_members(
    table: &EphemeralTable<'_>,
    result: &ClusteringResult,
    payloads: &[SpanPayload],
    cluster: &Cluster,
) -> Vec<usize> {
    let members: Vec<usize> = cluster
        .members
        .iter()
        .map(|&i| payloads[i].span_index)
        .collect();
    let center = centroid(cluster.members.iter().map(|&i| result.vectors[i].as_slice()));
    match table.search(&center, table.len()).await {
        Ok(hits) => {
            let wanted: HashSet<usize> = members.iter().copied().collect();
            let mut seen = HashSet::new();
            let mut ranked: Vec<usize> = hits
                .into_iter()
                .map(|h| h.payload.span_index)
                .filter(|i| wanted.contains(i) && seen.insert(*i))
                .collect();
            ranked.extend(members.iter().filter(|i| !seen.contains(*i)));
            ranked
        }
        Err(e) => {
            tracing::warn!(cluster = cluster.id, error = %e, "evidence ranking search failed");
            members
        }
    }
}

/// Most frequent category among `votes`. Ties go to the higher summed
/// confidence, then to the earlier entry in `order`.
fn majority<'a, C: Copy + PartialEq + 'a>(
    votes: impl Iterator<Item = &'a ClassificationResult<C>> + Clone,
    order: &[C],
) -> Option<C> {
    let mut best: Option<(C, usize, f32)> = None;
    for &candidate in order {
        let (count, confidence) = votes
            .clone()
            .filter(|v| v.category == Some(candidate))
            .fold((0usize, 0.0_f32), |(n, sum), v| (n + 1, sum + v.confidence));
        if count == 0 {
            continue;
        }
        let better = best.is_none_or(|(_, best_count, best_conf)| {
            count > best_count || (count == best_count && confidence > best_conf)
        });
        if better {
            best = Some((candidate, count, confidence));
        }
    }
    best.map(|(c, _, _)| c)
}
