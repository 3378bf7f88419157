//! Deterministic labels built from product area, keyword, and nearby context.

use crate::text::{truncate_chars, TokenizedText};
use crate::types::ProductArea;

const MAX_LABEL_CHARS: usize = 100;
const FALLBACK_LABEL_CHARS: usize = 60;
/// Words inspected on each side of the keyword for a context word.
const CONTEXT_WINDOW: usize = 8;

const CONTEXT_TERMS: &[&str] = &[
    "error",
    "issue",
    "problem",
    "failure",
    "crash",
    "timeout",
    "lag",
    "delay",
    "slowness",
    "charges",
    "cost",
    "price",
    "billing",
    "data",
    "information",
    "records",
    "user",
    "customer",
    "client",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateLabelGenerator;

impl TemplateLabelGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `"{Area} — {keyword} {context}"`, or the first 60 characters of the
    /// span when no product area was assigned. Never longer than 100 characters.
    #[must_use]
    pub fn generate_label(
        &self,
        product_area: Option<ProductArea>,
        pain_keywords: &[String],
        span_text: &str,
    ) -> String {
        let Some(area) = product_area else {
            return truncate_chars(span_text.trim(), FALLBACK_LABEL_CHARS);
        };
        let Some(keyword) = pain_keywords.first() else {
            return area.display_name().to_string();
        };

        let label = match context_word(span_text, keyword) {
            Some(context) if context != keyword.as_str() => {
                format!("{} — {keyword} {context}", area.display_name())
            }
            _ => format!("{} — {keyword}", area.display_name()),
        };
        truncate_chars(&label, MAX_LABEL_CHARS)
    }
}

/// First vocabulary term within [`CONTEXT_WINDOW`] words of the keyword.
fn context_word(text: &str, keyword: &str) -> Option<&'static str> {
    let tokens = TokenizedText::new(text);
    let keyword = keyword.to_lowercase();
    let at = tokens.position(&keyword)?;
    let width = keyword.split_whitespace().count();
    let window = tokens.slice(at.saturating_sub(CONTEXT_WINDOW), at + width + CONTEXT_WINDOW);
    CONTEXT_TERMS
        .iter()
        .copied()
        .find(|term| *term != keyword.as_str() && window.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn label_combines_area_keyword_and_context() {
        let label = TemplateLabelGenerator::new().generate_label(
            Some(ProductArea::Performance),
            &keywords(&["slow"]),
            "Page loads are slow and every customer complains about it.",
        );
        assert_eq!(label, "Performance — slow customer");
    }

    #[test]
    fn context_equal_to_keyword_is_not_repeated() {
        let label = TemplateLabelGenerator::new().generate_label(
            Some(ProductArea::Reliability),
            &keywords(&["error"]),
            "Every deploy throws an error right away.",
        );
        assert_eq!(label, "Reliability — error");
    }

    #[test]
    fn context_is_anchored_on_the_keyword_token() {
        let label = TemplateLabelGenerator::new().generate_label(
            Some(ProductArea::Performance),
            &keywords(&["lag"]),
            "Each feature flag toggle in the admin settings screen takes effect only \
             after a reload, and then the lag hits every customer.",
        );
        assert_eq!(label, "Performance — lag customer");
    }

    #[test]
    fn missing_area_falls_back_to_span_prefix() {
        let text = "The app crashes constantly and the error messages are useless.";
        let label = TemplateLabelGenerator::new().generate_label(None, &keywords(&["crash"]), text);
        assert_eq!(label, truncate_chars(text, 60));
        assert!(label.chars().count() <= 60);
    }

    #[test]
    fn labels_never_exceed_the_cap() {
        let long_keyword = "x".repeat(150);
        let label = TemplateLabelGenerator::new().generate_label(
            Some(ProductArea::DataManagement),
            &[long_keyword.clone()],
            &long_keyword,
        );
        assert!(label.chars().count() <= 100);
    }
}
