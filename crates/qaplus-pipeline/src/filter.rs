//! Quality gate applied before any extraction.

use std::borrow::Cow;

use qaplus_core::{Comment, Conversation, FilterConfig, Question, DEFAULT_SENTIMENT};
use serde::Serialize;

use crate::text::word_count;

/// Anything the input filter can score.
pub trait FilterRecord {
    fn upvotes(&self) -> i64;
    fn text(&self) -> Cow<'_, str>;
    fn sentiment(&self) -> &str;
    fn category(&self) -> &str;
}

impl FilterRecord for Question {
    fn upvotes(&self) -> i64 {
        self.upvotes
    }

    fn text(&self) -> Cow<'_, str> {
        Cow::Owned(self.full_text())
    }

    fn sentiment(&self) -> &str {
        &self.sentiment
    }

    fn category(&self) -> &str {
        &self.category
    }
}

impl FilterRecord for Comment {
    fn upvotes(&self) -> i64 {
        self.upvotes
    }

    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.body)
    }

    fn sentiment(&self) -> &str {
        &self.sentiment
    }

    fn category(&self) -> &str {
        &self.category
    }
}

/// A conversation is judged by its question.
impl FilterRecord for Conversation {
    fn upvotes(&self) -> i64 {
        self.question.upvotes()
    }

    fn text(&self) -> Cow<'_, str> {
        self.question.text()
    }

    fn sentiment(&self) -> &str {
        self.question.sentiment()
    }

    fn category(&self) -> &str {
        self.question.category()
    }
}

impl<T: FilterRecord + ?Sized> FilterRecord for &T {
    fn upvotes(&self) -> i64 {
        (**self).upvotes()
    }

    fn text(&self) -> Cow<'_, str> {
        (**self).text()
    }

    fn sentiment(&self) -> &str {
        (**self).sentiment()
    }

    fn category(&self) -> &str {
        (**self).category()
    }
}

/// Which checks a record passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterMetadata {
    pub passed_upvotes: bool,
    pub passed_word_count: bool,
    pub passed_sentiment: bool,
    pub passed_category: bool,
    pub passed_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filtered<T> {
    pub record: T,
    pub filter: FilterMetadata,
}

pub struct InputFilter {
    min_upvotes: i64,
    min_word_count: usize,
    allowed_sentiments: Vec<String>,
    allowed_categories: Vec<String>,
}

impl InputFilter {
    #[must_use]
    pub fn new(config: &FilterConfig) -> Self {
        let lower = |values: &[String]| values.iter().map(|v| v.trim().to_lowercase()).collect();
        Self {
            min_upvotes: config.min_upvotes,
            min_word_count: config.min_word_count,
            allowed_sentiments: lower(&config.allowed_sentiments),
            allowed_categories: lower(&config.allowed_categories),
        }
    }

    /// Score one record. Missing sentiment counts as neutral; sentiment and
    /// category compare case-insensitively.
    #[must_use]
    pub fn evaluate<R: FilterRecord + ?Sized>(&self, record: &R) -> FilterMetadata {
        let sentiment = match record.sentiment().trim() {
            "" => DEFAULT_SENTIMENT.to_string(),
            s => s.to_lowercase(),
        };
        let category = record.category().trim().to_lowercase();

        let passed_upvotes = record.upvotes() >= self.min_upvotes;
        let passed_word_count = word_count(&record.text()) >= self.min_word_count;
        let passed_sentiment = self.allowed_sentiments.contains(&sentiment);
        let passed_category = self.allowed_categories.contains(&category);

        FilterMetadata {
            passed_upvotes,
            passed_word_count,
            passed_sentiment,
            passed_category,
            passed_all: passed_upvotes && passed_word_count && passed_sentiment && passed_category,
        }
    }

    /// Annotate every record; nothing is dropped.
    pub fn annotate<R: FilterRecord>(&self, records: impl IntoIterator<Item = R>) -> Vec<Filtered<R>> {
        records
            .into_iter()
            .map(|record| {
                let filter = self.evaluate(&record);
                Filtered { record, filter }
            })
            .collect()
    }

    /// Records that passed every check, in input order.
    pub fn filter_records<R: FilterRecord>(&self, records: impl IntoIterator<Item = R>) -> Vec<R> {
        let mut rejected = 0usize;
        let passed: Vec<R> = self
            .annotate(records)
            .into_iter()
            .filter_map(|f| {
                if f.filter.passed_all {
                    Some(f.record)
                } else {
                    rejected += 1;
                    None
                }
            })
            .collect();
        tracing::debug!(passed = passed.len(), rejected, "input filter applied");
        passed
    }
}
