//! Pain-span extraction from question text.

use qaplus_core::{Question, SpanConfig, DEFAULT_SENTIMENT};

use crate::text::{round3, split_sentences, truncate_chars, word_count, TokenizedText};
use crate::types::Span;

/// Pain taxonomy. Each entry is a category name and its trigger keywords.
pub(crate) const PAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "error",
        &["error", "exception", "fail", "crash", "bug", "issue", "problem", "broken"],
    ),
    (
        "performance",
        &["slow", "lag", "timeout", "hang", "freeze", "performance", "latency", "throughput"],
    ),
    (
        "usability",
        &["confusing", "unclear", "hard", "difficult", "complex", "complicated", "unintuitive"],
    ),
    (
        "compatibility",
        &["incompatible", "not working", "doesn't work", "conflict", "compatibility"],
    ),
    (
        "cost",
        &["expensive", "costly", "price", "billing", "overcharge", "fee", "subscription"],
    ),
];

/// Praise words that mark a sentence as promotional rather than a complaint.
const PROMOTIONAL_TERMS: &[&str] = &[
    "love",
    "amazing",
    "great",
    "awesome",
    "wonderful",
    "excellent",
    "perfect",
];

/// Sentiments a question may carry and still yield spans.
const SPAN_SENTIMENTS: &[&str] = &["negative", "neutral"];

pub struct PainSpanExtractor {
    max_span_length: usize,
    max_spans: usize,
    min_span_words: usize,
}

impl PainSpanExtractor {
    #[must_use]
    pub fn new(config: &SpanConfig) -> Self {
        Self {
            max_span_length: config.max_span_length,
            max_spans: config.max_spans_per_question,
            min_span_words: config.min_span_words,
        }
    }

    /// Extract up to `max_spans_per_question` pain spans from a question.
    ///
    /// Questions with positive (or any non-negative, non-neutral) sentiment
    /// yield nothing. Within a question, sentences are dropped when they are
    /// too short, contain praise, or contain no pain keyword. A question
    /// sentence is kept only when it names a pain keyword.
    #[must_use]
    pub fn extract_spans(&self, question: &Question) -> Vec<Span> {
        let sentiment = match question.sentiment.trim() {
            "" => DEFAULT_SENTIMENT.to_string(),
            s => s.to_lowercase(),
        };
        if !SPAN_SENTIMENTS.contains(&sentiment.as_str()) {
            return Vec::new();
        }

        let mut spans = Vec::new();
        for sentence in split_sentences(question.span_source()) {
            if spans.len() >= self.max_spans {
                break;
            }
            let words = word_count(sentence);
            if words < self.min_span_words {
                continue;
            }
            let tokens = TokenizedText::new(sentence);
            if is_promotional(&tokens) {
                continue;
            }
            let keywords = find_pain_keywords(&tokens);
            if keywords.is_empty() {
                continue;
            }
            spans.push(Span {
                text: truncate_chars(sentence, self.max_span_length),
                sentence: sentence.to_string(),
                confidence: span_confidence(words, keywords.len()),
                pain_keywords: keywords,
                post_id: question.post_id.clone(),
                post_url: question.post_url.clone(),
            });
        }
        spans
    }
}

fn is_promotional(tokens: &TokenizedText) -> bool {
    PROMOTIONAL_TERMS.iter().any(|term| tokens.contains(term))
}

/// Distinct pain keywords in taxonomy order.
fn find_pain_keywords(tokens: &TokenizedText) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (_, keywords) in PAIN_KEYWORDS {
        for kw in tokens.matching(keywords) {
            if !found.iter().any(|f| f == kw) {
                found.push(kw.to_string());
            }
        }
    }
    found
}

/// Keyword density: one keyword per ten words saturates at 1.0.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn span_confidence(words: usize, keywords: usize) -> f32 {
    if words == 0 {
        return 0.0;
    }
    let density = keywords as f32 / (words as f32 / 10.0);
    round3(density.min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(body: &str, sentiment: &str) -> Question {
        Question {
            id: Some("q1".into()),
            title: "Title".into(),
            body: body.into(),
            upvotes: 10,
            created_at: None,
            post_id: Some("p1".into()),
            post_url: Some("https://example.com/p1".into()),
            sentiment: sentiment.into(),
            category: "Question".into(),
        }
    }

    fn extractor() -> PainSpanExtractor {
        PainSpanExtractor::new(&SpanConfig::default())
    }

    #[test]
    fn crash_and_error_sentence_yields_one_confident_span() {
        let q = question(
            "The app crashes constantly and the error messages are useless.",
            "negative",
        );
        let spans = extractor().extract_spans(&q);
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.pain_keywords, vec!["error", "crash"]);
        assert!((span.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(span.post_id.as_deref(), Some("p1"));
        assert_eq!(span.post_url.as_deref(), Some("https://example.com/p1"));
    }

    #[test]
    fn positive_questions_yield_no_spans() {
        let q = question("The app crashes constantly and the error messages are useless.", "positive");
        assert!(extractor().extract_spans(&q).is_empty());
    }

    #[test]
    fn promotional_and_bare_question_sentences_are_skipped() {
        let q = question(
            "I love this tool even though it has a bug sometimes. \
             How do I point the deploy step at staging? \
             Deploys are slow and the dashboard is confusing to use.",
            "neutral",
        );
        let spans = extractor().extract_spans(&q);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.starts_with("Deploys are slow"));
        assert_eq!(spans[0].pain_keywords, vec!["slow", "confusing"]);
    }

    #[test]
    fn question_sentences_with_pain_keywords_become_spans() {
        let q = question(
            "Why does the build keep failing with this error every single time?",
            "negative",
        );
        let spans = extractor().extract_spans(&q);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.ends_with('?'));
        assert_eq!(spans[0].pain_keywords, vec!["error", "fail"]);
    }

    #[test]
    fn short_sentences_are_skipped() {
        let q = question("Crash again. Error again.", "negative");
        assert!(extractor().extract_spans(&q).is_empty());
    }

    #[test]
    fn spans_respect_count_and_length_limits() {
        let long_sentence = format!("The sync job keeps failing with a timeout {}.", "again ".repeat(60));
        let body = std::iter::repeat_n(long_sentence.as_str(), 6)
            .collect::<Vec<_>>()
            .join(" ");
        let q = question(&body, "negative");
        let config = SpanConfig {
            max_span_length: 80,
            max_spans_per_question: 2,
            min_span_words: 5,
        };
        let spans = PainSpanExtractor::new(&config).extract_spans(&q);
        assert_eq!(spans.len(), 2);
        for span in &spans {
            assert!(span.text.chars().count() <= 80);
            assert!((0.0..=1.0).contains(&span.confidence));
            assert!(!span.pain_keywords.is_empty());
        }
    }

    #[test]
    fn confidence_is_keyword_density() {
        assert!((span_confidence(20, 1) - 0.5).abs() < f32::EPSILON);
        assert!((span_confidence(30, 1) - 0.333).abs() < f32::EPSILON);
        assert!((span_confidence(5, 4) - 1.0).abs() < f32::EPSILON);
    }
}
