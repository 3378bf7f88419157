//! Keyword-table classifiers for product area and customer journey stage.
//!
//! Both score a category as `matches / keywords_in_category`, but only once at
//! least `min_keyword_matches` distinct keywords hit. Below the category
//! threshold the result carries no category.

use qaplus_core::ClassifierConfig;

use crate::text::TokenizedText;
use crate::types::{ClassificationResult, JourneyStage, ProductArea};

const PRODUCT_AREA_KEYWORDS: &[(ProductArea, &[&str])] = &[
    (
        ProductArea::Deployment,
        &["deploy", "deployment", "release", "rollout", "production", "staging"],
    ),
    (
        ProductArea::Reliability,
        &["crash", "down", "outage", "downtime", "error", "fail", "timeout"],
    ),
    (
        ProductArea::Performance,
        &["slow", "lag", "latency", "performance", "throughput", "cpu", "memory"],
    ),
    (
        ProductArea::PricingBilling,
        &["price", "pricing", "billing", "cost", "subscription", "charge", "fee"],
    ),
    (
        ProductArea::DataManagement,
        &["data", "database", "backup", "recovery", "corruption", "loss"],
    ),
    (
        ProductArea::Security,
        &["security", "auth", "permission", "encryption", "vulnerability", "breach"],
    ),
    (
        ProductArea::Usability,
        &["ui", "ux", "confusing", "unclear", "interface", "workflow"],
    ),
];

const JOURNEY_STAGE_KEYWORDS: &[(JourneyStage, &[&str])] = &[
    (
        JourneyStage::Shipping,
        &["ship", "shipped", "delivery", "deliver", "arrival", "received", "arrived"],
    ),
    (
        JourneyStage::Scaling,
        &["scale", "scaling", "growth", "scale up", "handle load"],
    ),
    (
        JourneyStage::Building,
        &["build", "building", "develop", "developing", "implementation", "architect"],
    ),
    (
        JourneyStage::FirstUse,
        &["first time", "getting started", "onboarding", "new user", "first run", "setup"],
    ),
    (
        JourneyStage::Evaluation,
        &["evaluate", "considering", "trying out", "test", "poc"],
    ),
    (
        JourneyStage::Troubleshooting,
        &["troubleshoot", "debug", "fix", "issue", "problem", "error"],
    ),
];

#[allow(clippy::cast_precision_loss)]
fn keyword_confidence(tokens: &TokenizedText, keywords: &[&str], min_matches: usize) -> f32 {
    let matches = tokens.count_matches(keywords);
    if matches < min_matches || keywords.is_empty() {
        return 0.0;
    }
    matches as f32 / keywords.len() as f32
}

pub struct ProductAreaClassifier {
    min_confidence: f32,
    min_matches: usize,
}

impl ProductAreaClassifier {
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            min_confidence: config.min_product_area_confidence,
            min_matches: config.min_keyword_matches,
        }
    }

    /// Confidence for every area, in declaration order.
    #[must_use]
    pub fn scores(&self, text: &str) -> Vec<(ProductArea, f32)> {
        let tokens = TokenizedText::new(text);
        PRODUCT_AREA_KEYWORDS
            .iter()
            .map(|(area, keywords)| (*area, keyword_confidence(&tokens, keywords, self.min_matches)))
            .collect()
    }

    /// Highest-scoring area. Ties go to the area declared first.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult<ProductArea> {
        let mut best: Option<(ProductArea, f32)> = None;
        for (area, score) in self.scores(text) {
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((area, score));
            }
        }
        match best {
            Some((area, score)) if score >= self.min_confidence => ClassificationResult {
                category: Some(area),
                confidence: score,
            },
            Some((_, score)) => ClassificationResult {
                category: None,
                confidence: score,
            },
            None => ClassificationResult::none(),
        }
    }
}

pub struct JourneyStageClassifier {
    min_confidence: f32,
    min_matches: usize,
}

impl JourneyStageClassifier {
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            min_confidence: config.min_journey_stage_confidence,
            min_matches: config.min_keyword_matches,
        }
    }

    #[must_use]
    pub fn scores(&self, text: &str) -> Vec<(JourneyStage, f32)> {
        let tokens = TokenizedText::new(text);
        JOURNEY_STAGE_KEYWORDS
            .iter()
            .map(|(stage, keywords)| {
                (*stage, keyword_confidence(&tokens, keywords, self.min_matches))
            })
            .collect()
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult<JourneyStage> {
        match pick_stage(&self.scores(text)) {
            Some((stage, score)) if score >= self.min_confidence => ClassificationResult {
                category: Some(stage),
                confidence: score,
            },
            Some((_, score)) => ClassificationResult {
                category: None,
                confidence: score,
            },
            None => ClassificationResult::none(),
        }
    }
}

/// Best-scoring stage, resolving ties by [`JourneyStage::PRIORITY`].
///
/// The result depends only on the scores, never on the order of `scores`.
/// Zero scores never win.
#[must_use]
pub fn pick_stage(scores: &[(JourneyStage, f32)]) -> Option<(JourneyStage, f32)> {
    let mut best: Option<(JourneyStage, f32)> = None;
    for stage in JourneyStage::PRIORITY {
        let score = scores
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, score)| *score)
            .fold(0.0_f32, f32::max);
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((stage, score));
        }
    }
    best
}
