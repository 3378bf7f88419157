//! Projection of insight cards into the older pain-point report schema.

use crate::text::truncate_chars;
use crate::types::{InsightCard, LegacyPainPoint, LegacyReport};

const MAX_EXAMPLES: usize = 3;
const MAX_EXAMPLE_CHARS: usize = 100;
const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyAdapter;

impl LegacyAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lossy and one-way. Solutions are not linked to pain points, so
    /// `associated_solutions` is always empty.
    #[must_use]
    pub fn convert_to_legacy_pain_points(&self, cards: &[InsightCard]) -> LegacyReport {
        let pain_points: Vec<LegacyPainPoint> = cards.iter().map(to_pain_point).collect();
        LegacyReport {
            total_count: pain_points.len(),
            pain_points,
            format: "legacy".to_string(),
        }
    }
}

fn to_pain_point(card: &InsightCard) -> LegacyPainPoint {
    LegacyPainPoint {
        pain_point: card.label.clone(),
        frequency: card.evidence_count,
        intensity: card.severity.intensity(),
        category: card
            .product_area
            .map_or_else(|| UNCATEGORIZED.to_string(), |a| a.as_str().to_string()),
        sentiment_impact: "negative".to_string(),
        examples: card
            .evidence
            .iter()
            .take(MAX_EXAMPLES)
            .map(|s| truncate_chars(&s.text, MAX_EXAMPLE_CHARS))
            .collect(),
        associated_solutions: Vec::new(),
    }
}
