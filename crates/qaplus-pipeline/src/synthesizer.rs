//! Mode C: LLM-written cluster labels, business context, and open questions.
//!
//! Every generation step is best-effort. A failed or empty completion yields
//! `None` (or no questions) for that field and the card keeps its template
//! label.

use std::future::Future;
use std::time::Duration;

use qaplus_core::SynthesisConfig;
use serde::{Deserialize, Serialize};

use crate::embeddings::read_json;
use crate::error::PipelineError;
use crate::retry::retry_with_backoff;
use crate::text::truncate_chars;

const MAX_LABEL_CHARS: usize = 100;
const MAX_OPEN_QUESTIONS: usize = 3;
/// Member texts quoted in prompts, and the characters kept from each.
const PROMPT_EXAMPLES: usize = 3;
const PROMPT_EXAMPLE_CHARS: usize = 100;

/// A text-completion backend.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, PipelineError>> + Send;

    fn model_name(&self) -> &str;
}

/// Non-streaming completions from Ollama's `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    const SERVICE: &'static str = "Ollama generate";

    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &SynthesisConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!(
                "{}/api/generate",
                config.ollama_base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                },
            })
            .send()
            .await?;
        let body: GenerateResponse = read_json(Self::SERVICE, response).await?;
        Ok(body.response.trim().to_string())
    }
}

impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        retry_with_backoff(
            Self::SERVICE,
            self.max_retries,
            self.retry_backoff_ms,
            || self.generate_once(prompt),
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// What the LLM contributed to one cluster card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSynthesis {
    pub label: Option<String>,
    pub why_it_matters: Option<String>,
    pub open_questions: Vec<String>,
}

pub struct LlmSynthesizer<G> {
    generator: G,
    max_clusters: usize,
}

impl<G: TextGenerator> LlmSynthesizer<G> {
    pub fn new(generator: G, max_clusters: usize) -> Self {
        Self {
            generator,
            max_clusters,
        }
    }

    /// How many clusters per run may receive LLM calls.
    pub fn max_clusters(&self) -> usize {
        self.max_clusters
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    async fn complete(&self, prompt: &str, what: &'static str) -> Option<String> {
        match self.generator.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                tracing::debug!(what, "LLM returned an empty completion");
                None
            }
            Err(e) => {
                tracing::warn!(what, error = %e, "LLM call failed, keeping fallback");
                None
            }
        }
    }

    pub async fn generate_cluster_label(&self, texts: &[&str]) -> Option<String> {
        if texts.is_empty() {
            return None;
        }
        let prompt = format!(
            "Generate a concise 3-5 word label for this cluster of related pain points:\n{}\n\nLabel (just the label, no explanation):",
            prompt_examples(texts).join("\n")
        );
        let raw = self.complete(&prompt, "label").await?;
        clean_label(&raw)
    }

    pub async fn generate_why_it_matters(
        &self,
        label: &str,
        cluster_size: usize,
        context: &str,
    ) -> Option<String> {
        let prompt = format!(
            "Why does this pain point matter for the business?\nPain point: {label}\nFrequency: {cluster_size} mentions\nContext: {context}\n\nExplanation (1-2 sentences):"
        );
        let raw = self.complete(&prompt, "why_it_matters").await?;
        let text = raw.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    pub async fn generate_open_questions(&self, label: &str) -> Vec<String> {
        let prompt = format!(
            "What are 2-3 important questions to investigate about: {label}?\n\nQuestions (one per line):"
        );
        match self.complete(&prompt, "open_questions").await {
            Some(raw) => clean_questions(&raw),
            None => Vec::new(),
        }
    }

    /// Run all three generation steps for one cluster. Prompts after the
    /// label use the LLM label when one came back, else `fallback_label`.
    pub async fn synthesize(&self, texts: &[&str], fallback_label: &str) -> ClusterSynthesis {
        let label = self.generate_cluster_label(texts).await;
        let subject = label.as_deref().unwrap_or(fallback_label);
        let context = prompt_examples(texts).join("; ");
        let why_it_matters = self
            .generate_why_it_matters(subject, texts.len(), &context)
            .await;
        let open_questions = self.generate_open_questions(subject).await;
        ClusterSynthesis {
            label,
            why_it_matters,
            open_questions,
        }
    }
}

fn prompt_examples(texts: &[&str]) -> Vec<String> {
    texts
        .iter()
        .take(PROMPT_EXAMPLES)
        .map(|t| truncate_chars(t, PROMPT_EXAMPLE_CHARS))
        .collect()
}

/// First non-empty line, without a `Label:` prefix or surrounding quotes.
fn clean_label(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = strip_prefix_ignore_case(line, "label:").trim();
    let line = line.trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`')).trim();
    if line.is_empty() {
        return None;
    }
    Some(truncate_chars(line, MAX_LABEL_CHARS))
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> &'a str {
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
        _ => text,
    }
}

/// Non-empty lines with list markers removed, at most three.
fn clean_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(strip_list_marker)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .take(MAX_OPEN_QUESTIONS)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim();
        }
    }
    line.trim()
}
