//! Solution mining over every conversation turn.
//!
//! Records only what was observed: the text, where it came from, and its raw
//! upvote count. No effectiveness or success score is ever derived.

use qaplus_core::Conversation;

use crate::text::TokenizedText;
use crate::types::{Solution, SolutionSource, SolutionType};

/// Texts shorter than this (in characters, trimmed) are never solutions.
const MIN_SOLUTION_CHARS: usize = 20;

const SOLUTION_KEYWORDS: &[(SolutionType, &[&str])] = &[
    (
        SolutionType::Workaround,
        &["workaround", "work around", "temporary", "interim", "for now"],
    ),
    (
        SolutionType::Implementation,
        &["implement", "implementation", "solution", "approach", "method"],
    ),
    (
        SolutionType::Configuration,
        &["configure", "configuration", "setting", "parameter", "option"],
    ),
    (
        SolutionType::ExternalTool,
        &["tool", "library", "plugin", "package", "extension", "service"],
    ),
    (
        SolutionType::BestPractice,
        &["best practice", "recommendation", "practice", "should", "recommend"],
    ),
];

/// Phrases that read like advice even without a category keyword.
const SOLUTION_INDICATORS: &[&str] = &[
    "you can",
    "you could",
    "try this",
    "try using",
    "the issue is",
    "the problem is",
    "the fix is",
    "fixed it",
    "fixed by",
    "solved it",
    "what worked",
    "worked for me",
    "make sure",
    "you need to",
    "i ended up",
    "switch to",
    "upgrade to",
    "downgrade to",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SolutionExtractorV2;

impl SolutionExtractorV2 {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scan the question and every comment, in that order.
    #[must_use]
    pub fn extract_solutions(&self, conversation: &Conversation) -> Vec<Solution> {
        let question = &conversation.question;
        let mut solutions = Vec::new();

        let question_text = question.full_text();
        if let Some(solution_type) = classify_solution(&question_text) {
            solutions.push(Solution {
                text: question_text.trim().to_string(),
                source: SolutionSource::Question,
                post_id: question.post_id.clone(),
                post_url: question.post_url.clone(),
                upvotes: question.upvotes,
                solution_type,
            });
        }

        for comment in &conversation.comments {
            if let Some(solution_type) = classify_solution(&comment.body) {
                solutions.push(Solution {
                    text: comment.body.trim().to_string(),
                    source: SolutionSource::Comment,
                    post_id: comment.post_id.clone(),
                    post_url: comment.post_url.clone(),
                    upvotes: comment.upvotes,
                    solution_type,
                });
            }
        }
        solutions
    }
}

/// First category whose keywords appear; indicator phrases alone yield
/// [`SolutionType::GeneralSolution`].
fn classify_solution(text: &str) -> Option<SolutionType> {
    if text.trim().chars().count() < MIN_SOLUTION_CHARS {
        return None;
    }
    let tokens = TokenizedText::new(text);
    SOLUTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| tokens.contains(kw)))
        .map(|(solution_type, _)| *solution_type)
        .or_else(|| {
            SOLUTION_INDICATORS
                .iter()
                .any(|phrase| tokens.contains(phrase))
                .then_some(SolutionType::GeneralSolution)
        })
}
