//! Embedding backends behind one plugin interface.
//!
//! [`SentenceEmbedder`] talks to a Text Embeddings Inference server hosting a
//! sentence-transformers model; [`OllamaEmbedder`] uses Ollama's `/api/embed`.
//! Both batch their inputs and check the count and dimension of every batch.

use std::future::Future;
use std::time::Duration;

use qaplus_core::{EmbeddingBackend, EmbeddingConfig};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::retry::retry_with_backoff;

/// Anything that turns texts into fixed-dimension vectors.
pub trait EmbeddingPlugin {
    /// One vector per input text, in input order. Empty input makes no request.
    fn encode(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, PipelineError>> + Send;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Request settings shared by the HTTP embedders.
#[derive(Debug, Clone)]
struct HttpSettings {
    client: reqwest::Client,
    batch_size: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl HttpSettings {
    fn from_config(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }
}

fn check_batch(
    service: &'static str,
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
) -> Result<(), PipelineError> {
    if vectors.len() != expected_count {
        return Err(PipelineError::CountMismatch {
            service,
            expected: expected_count,
            got: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(PipelineError::DimensionMismatch {
            expected: dimension,
            got: bad.len(),
        });
    }
    Ok(())
}

pub(crate) async fn read_json<T: for<'de> Deserialize<'de>>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, PipelineError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::UpstreamStatus {
            service,
            status: status.as_u16(),
        });
    }
    response.json::<T>().await.map_err(|e| PipelineError::Decode {
        service,
        reason: e.to_string(),
    })
}

/// Sentence-transformers model served by text-embeddings-inference.
#[derive(Debug, Clone)]
pub struct SentenceEmbedder {
    http: HttpSettings,
    url: String,
    model_name: String,
    dimension: usize,
}

#[derive(Serialize)]
struct TeiRequest<'a> {
    inputs: &'a [String],
}

impl SentenceEmbedder {
    const SERVICE: &'static str = "TEI";

    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let settings = &config.sentence_transformers;
        Ok(Self {
            http: HttpSettings::from_config(config)?,
            url: format!("{}/embed", settings.url.trim_end_matches('/')),
            model_name: settings.model_name.clone(),
            dimension: settings.dimension,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let response = self
            .http
            .client
            .post(&self.url)
            .json(&TeiRequest { inputs: batch })
            .send()
            .await?;
        read_json(Self::SERVICE, response).await
    }
}

impl EmbeddingPlugin for SentenceEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            let vectors = retry_with_backoff(
                Self::SERVICE,
                self.http.max_retries,
                self.http.retry_backoff_ms,
                || self.embed_batch(batch),
            )
            .await?;
            check_batch(Self::SERVICE, &vectors, batch.len(), self.dimension)?;
            all.extend(vectors);
        }
        tracing::debug!(texts = texts.len(), model = %self.model_name, "encoded texts");
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Embedding model served by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: HttpSettings,
    url: String,
    model_name: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    const SERVICE: &'static str = "Ollama embed";

    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let settings = &config.ollama;
        Ok(Self {
            http: HttpSettings::from_config(config)?,
            url: format!("{}/api/embed", settings.base_url.trim_end_matches('/')),
            model_name: settings.model_name.clone(),
            dimension: settings.dimension,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let response = self
            .http
            .client
            .post(&self.url)
            .json(&OllamaEmbedRequest {
                model: &self.model_name,
                input: batch,
            })
            .send()
            .await?;
        let body: OllamaEmbedResponse = read_json(Self::SERVICE, response).await?;
        Ok(body.embeddings)
    }
}

impl EmbeddingPlugin for OllamaEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.http.batch_size) {
            let vectors = retry_with_backoff(
                Self::SERVICE,
                self.http.max_retries,
                self.http.retry_backoff_ms,
                || self.embed_batch(batch),
            )
            .await?;
            check_batch(Self::SERVICE, &vectors, batch.len(), self.dimension)?;
            all.extend(vectors);
        }
        tracing::debug!(texts = texts.len(), model = %self.model_name, "encoded texts");
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// The configured backend, selected once at startup.
#[derive(Debug, Clone)]
pub enum EmbeddingWrapper {
    SentenceTransformers(SentenceEmbedder),
    Ollama(OllamaEmbedder),
}

impl EmbeddingWrapper {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let wrapper = match config.backend {
            EmbeddingBackend::SentenceTransformers => {
                Self::SentenceTransformers(SentenceEmbedder::from_config(config)?)
            }
            EmbeddingBackend::Ollama => Self::Ollama(OllamaEmbedder::from_config(config)?),
        };
        tracing::info!(
            model = wrapper.model_name(),
            dimension = wrapper.dimension(),
            "embedding backend ready"
        );
        Ok(wrapper)
    }
}

impl EmbeddingPlugin for EmbeddingWrapper {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        match self {
            Self::SentenceTransformers(e) => e.encode(texts).await,
            Self::Ollama(e) => e.encode(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            Self::SentenceTransformers(e) => e.dimension(),
            Self::Ollama(e) => e.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Self::SentenceTransformers(e) => e.model_name(),
            Self::Ollama(e) => e.model_name(),
        }
    }
}
