use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::de::{lenient_i64, lenient_opt_string, null_as_default};

/// Sentiment assumed when a record carries none.
pub const DEFAULT_SENTIMENT: &str = "neutral";
/// Category assumed for questions that carry none.
pub const DEFAULT_CATEGORY: &str = "Question";
/// Category assumed for comments that carry none.
pub const DEFAULT_COMMENT_CATEGORY: &str = "Comment";

/// A single post or comment as exported by the scraper.
///
/// Both the nested `{question, comments}` shape and the flat record list use
/// this type. Flat lists distinguish posts from comments via `data_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub body: Option<String>,
    #[serde(default, alias = "upVotes", deserialize_with = "lenient_i64")]
    pub upvotes: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<Value>,
    #[serde(default, alias = "postId", deserialize_with = "lenient_opt_string")]
    pub post_id: Option<String>,
    #[serde(
        default,
        alias = "postUrl",
        alias = "url",
        deserialize_with = "lenient_opt_string"
    )]
    pub post_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub category: Option<String>,
    #[serde(default, alias = "dataType", deserialize_with = "lenient_opt_string")]
    pub data_type: Option<String>,
    /// Analyzer output attached by the enrichment step in flat exports.
    #[serde(default)]
    pub analysis: Option<RecordAnalysis>,
}

impl RawRecord {
    /// Top-level sentiment, falling back to the analyzer's.
    #[must_use]
    pub fn effective_sentiment(&self) -> Option<&str> {
        self.sentiment
            .as_deref()
            .or_else(|| self.analysis.as_ref()?.sentiment.as_deref())
    }

    /// Top-level category, falling back to the analyzer's.
    #[must_use]
    pub fn effective_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .or_else(|| self.analysis.as_ref()?.category.as_deref())
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.data_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("comment"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordAnalysis {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub category: Option<String>,
}

/// A question with its comments, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConversation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: RawRecord,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub upvotes: i64,
    pub created_at: Option<Value>,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub sentiment: String,
    pub category: String,
}

impl Question {
    /// Title and body joined, used for word counts and solution mining.
    #[must_use]
    pub fn full_text(&self) -> String {
        match (self.title.trim(), self.body.trim()) {
            ("", body) => body.to_string(),
            (title, "") => title.to_string(),
            (title, body) => format!("{title}\n{body}"),
        }
    }

    /// Text that pain spans are cut from: the body, or the title when the body is empty.
    #[must_use]
    pub fn span_source(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<String>,
    pub body: String,
    pub upvotes: i64,
    pub created_at: Option<Value>,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub sentiment: String,
    pub category: String,
    /// Category exactly as the source labelled it, before defaulting.
    pub original_category: String,
}

/// Normalized question plus comments. Comments always carry the question's
/// `post_id`/`post_url` when they had none of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub question: Question,
    pub comments: Vec<Comment>,
}
