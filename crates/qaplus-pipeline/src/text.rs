//! Tokenizing and keyword matching shared by every keyword table.
//!
//! Keywords match whole tokens, so `fee` never fires on `feel`. A token also
//! matches when it is a common inflection of the keyword (`crash` matches
//! `crashes`, `crashed`, `crashing`; `ship` matches `shipped`). Multi-word
//! keywords match consecutive tokens.

use std::sync::LazyLock;

use regex::Regex;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence pattern is valid"));

const SUFFIXES: &[&str] = &["s", "es", "ed", "d", "ing", "er", "ers", "y", "ure", "ures"];

/// Lowercased word tokens. Curly apostrophes are folded to `'`.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sentences with their terminal punctuation, trimmed, empties dropped.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max` characters, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].trim_end().to_string(),
        None => text.to_string(),
    }
}

pub(crate) fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn token_matches(token: &str, word: &str) -> bool {
    if token == word {
        return true;
    }
    if let Some(rest) = token.strip_prefix(word) {
        if SUFFIXES.contains(&rest) {
            return true;
        }
        let mut chars = rest.chars();
        return match (word.chars().last(), chars.next()) {
            (Some(last), Some(first))
                if last == first && last.is_ascii_alphabetic() && !"aeiou".contains(last) =>
            {
                matches!(chars.as_str(), "ed" | "ing" | "er" | "y")
            }
            _ => false,
        };
    }
    word.strip_suffix('e')
        .and_then(|stem| token.strip_prefix(stem))
        .is_some_and(|rest| rest == "ing")
}

/// A text tokenized once for repeated keyword lookups.
pub(crate) struct TokenizedText {
    tokens: Vec<String>,
}

impl TokenizedText {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            tokens: tokenize(text),
        }
    }

    /// Position of the first token where `keyword` matches.
    pub(crate) fn position(&self, keyword: &str) -> Option<usize> {
        let words: Vec<&str> = keyword.split_whitespace().collect();
        if words.is_empty() || words.len() > self.tokens.len() {
            return None;
        }
        (0..=self.tokens.len() - words.len()).find(|&start| {
            words
                .iter()
                .enumerate()
                .all(|(offset, word)| token_matches(&self.tokens[start + offset], word))
        })
    }

    pub(crate) fn contains(&self, keyword: &str) -> bool {
        self.position(keyword).is_some()
    }

    /// Tokens `start..end`, clamped to the text.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.tokens.len());
        Self {
            tokens: self.tokens[start.min(end)..end].to_vec(),
        }
    }

    /// Keywords from `keywords` present in the text, in table order.
    pub(crate) fn matching<'k>(&self, keywords: &[&'k str]) -> Vec<&'k str> {
        keywords
            .iter()
            .copied()
            .filter(|kw| self.contains(kw))
            .collect()
    }

    pub(crate) fn count_matches(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|kw| self.contains(kw)).count()
    }
}
