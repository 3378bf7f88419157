//! Reading scraper exports from disk.
//!
//! A file holds either grouped `{question, comments}` objects or a flat list
//! of posts and comments; the shape is detected per file. An element that
//! does not deserialize is logged and skipped. Directories are read one
//! `*.json` file at a time in name order, and a file that fails to parse is
//! logged and skipped.

use std::path::{Path, PathBuf};

use anyhow::Context;
use qaplus_core::{Conversation, RawConversation, RawRecord};
use qaplus_pipeline::EvidencePreservingGrouper;
use serde::de::DeserializeOwned;
use serde_json::Value;

const FALLBACK_COMMUNITY: &str = "community";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputShape {
    Grouped,
    Flat,
}

/// Grouped when any element carries a `question` object.
pub(crate) fn detect_shape(items: &[Value]) -> InputShape {
    if items.iter().any(|item| item.get("question").is_some()) {
        InputShape::Grouped
    } else {
        InputShape::Flat
    }
}

/// Parse one export's text into conversations.
///
/// # Errors
///
/// Returns an error if the text is not a JSON array.
pub(crate) fn parse_conversations(
    text: &str,
    grouper: &EvidencePreservingGrouper,
) -> anyhow::Result<Vec<Conversation>> {
    let items: Vec<Value> = serde_json::from_str(text).context("expected a JSON array")?;
    let conversations = match detect_shape(&items) {
        InputShape::Grouped => {
            grouper.group_conversations(decode_each::<RawConversation>(items, "conversation"))
        }
        InputShape::Flat => grouper.group_flat_records(decode_each::<RawRecord>(items, "record")),
    };
    Ok(conversations)
}

fn decode_each<T: DeserializeOwned>(items: Vec<Value>, kind: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(kind, index, error = %e, "skipping malformed input element");
                None
            }
        })
        .collect()
}

/// Load every conversation under `path`.
///
/// # Errors
///
/// Returns an error if `path` cannot be read, if a single input file does not
/// parse, or if a directory holds no JSON files.
pub(crate) fn load_conversations(path: &Path) -> anyhow::Result<Vec<Conversation>> {
    let grouper = EvidencePreservingGrouper::new();
    if !path.is_dir() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return parse_conversations(&text, &grouper)
            .with_context(|| format!("failed to parse {}", path.display()));
    }

    let files = json_files(path)?;
    if files.is_empty() {
        anyhow::bail!("no .json files found in {}", path.display());
    }

    let mut all = Vec::new();
    for file in files {
        let loaded = std::fs::read_to_string(&file)
            .map_err(anyhow::Error::from)
            .and_then(|text| parse_conversations(&text, &grouper));
        match loaded {
            Ok(conversations) => {
                tracing::info!(file = %file.display(), conversations = conversations.len(), "loaded input file");
                all.extend(conversations);
            }
            Err(e) => tracing::warn!(file = %file.display(), error = %e, "skipping unreadable input file"),
        }
    }
    Ok(all)
}

fn json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Artifact name for an input: the file stem, or the directory name.
pub(crate) fn community_name(path: &Path) -> String {
    let name = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    name.and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_COMMUNITY)
        .to_string()
}
