//! Final assembly of insight cards.

use qaplus_core::InsightConfig;

use crate::types::{
    ClassifiedSpan, InsightCard, JourneyStage, LabelSource, ProductArea, Severity, Span,
};

/// Everything a card is built from, before the evidence cap and severity.
#[derive(Debug, Clone)]
pub struct CardDraft {
    pub label: String,
    pub label_source: LabelSource,
    /// All supporting spans, most representative first.
    pub evidence: Vec<Span>,
    pub product_area: Option<ProductArea>,
    pub journey_stage: Option<JourneyStage>,
    pub cluster_id: Option<i32>,
    pub why_it_matters: Option<String>,
    pub open_questions: Vec<String>,
}

impl CardDraft {
    /// A template-labelled draft for one ungrouped span.
    #[must_use]
    pub fn from_span(classified: ClassifiedSpan) -> Self {
        Self {
            label: classified.template_label,
            label_source: LabelSource::Template,
            evidence: vec![classified.span],
            product_area: classified.product_area.category,
            journey_stage: classified.journey_stage.category,
            cluster_id: None,
            why_it_matters: None,
            open_questions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsightCardGenerator {
    max_evidence: usize,
}

impl InsightCardGenerator {
    #[must_use]
    pub fn new(config: &InsightConfig) -> Self {
        Self {
            max_evidence: config.max_evidence_per_card.max(1),
        }
    }

    /// Severity is judged on the full evidence list; only the stored
    /// evidence is capped.
    #[must_use]
    pub fn generate(&self, draft: CardDraft) -> InsightCard {
        let evidence_count = draft.evidence.len();
        let severity = calculate_severity(evidence_count, mean_confidence(&draft.evidence));
        let mut evidence = draft.evidence;
        evidence.truncate(self.max_evidence);

        InsightCard {
            label: draft.label,
            label_source: draft.label_source,
            evidence,
            evidence_count,
            product_area: draft.product_area,
            journey_stage: draft.journey_stage,
            severity,
            cluster_id: draft.cluster_id,
            why_it_matters: draft.why_it_matters,
            open_questions: draft.open_questions,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_confidence(spans: &[Span]) -> f32 {
    if spans.is_empty() {
        return 0.0;
    }
    spans.iter().map(|s| s.confidence).sum::<f32>() / spans.len() as f32
}

/// `high` needs both volume and confidence; either one alone reaches `medium`.
#[must_use]
pub fn calculate_severity(evidence_count: usize, mean_confidence: f32) -> Severity {
    if evidence_count == 0 {
        Severity::Low
    } else if evidence_count >= 5 && mean_confidence > 0.6 {
        Severity::High
    } else if evidence_count >= 3 || mean_confidence > 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
