//! Qdrant HTTP client backing one collection per run table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::vector_store::{SearchHit, SpanPayload, VectorRecord};

/// Points per upsert or scroll request.
const PAGE_SIZE: usize = 256;

#[derive(Debug)]
pub(crate) struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Serialize, Deserialize)]
struct VectorsConfig {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPointsRequest<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: u64,
    vector: &'a [f32],
    payload: &'a SpanPayload,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Serialize)]
struct ScrollRequest {
    limit: usize,
    with_payload: bool,
    with_vector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: u64,
    score: f32,
    payload: SpanPayload,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<StoredPoint>,
    next_page_offset: Option<u64>,
}

#[derive(Deserialize)]
struct StoredPoint {
    id: u64,
    vector: Vec<f32>,
    payload: SpanPayload,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorsConfig,
}

impl QdrantStore {
    pub(crate) fn new(qdrant_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: qdrant_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{name}", self.base_url)
    }

    async fn check(
        resp: reqwest::Response,
        what: &str,
        name: &str,
    ) -> Result<reqwest::Response, PipelineError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::TableNotFound(name.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Qdrant(format!(
                "{what} returned status {status}: {body}"
            )));
        }
        Ok(resp)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, PipelineError> {
        resp.json::<QdrantResponse<T>>()
            .await
            .map(|r| r.result)
            .map_err(|e| PipelineError::Qdrant(format!("{what} response parse error: {e}")))
    }

    /// Create a cosine-distance collection. Fails if it already exists.
    pub(crate) async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<(), PipelineError> {
        let body = CreateCollectionRequest {
            vectors: VectorsConfig {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };
        let resp = self
            .client
            .put(self.collection_url(name))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Qdrant(format!("collection create request failed: {e}")))?;
        Self::check(resp, "collection create", name).await?;
        Ok(())
    }

    /// Delete a collection. A missing collection yields [`PipelineError::TableNotFound`].
    pub(crate) async fn delete_collection(&self, name: &str) -> Result<(), PipelineError> {
        let resp = self
            .client
            .delete(self.collection_url(name))
            .send()
            .await
            .map_err(|e| PipelineError::Qdrant(format!("collection delete request failed: {e}")))?;
        Self::check(resp, "collection delete", name).await?;
        Ok(())
    }

    pub(crate) async fn upsert_points(
        &self,
        name: &str,
        records: &[VectorRecord],
    ) -> Result<(), PipelineError> {
        let url = format!("{}/points?wait=true", self.collection_url(name));
        for chunk in records.chunks(PAGE_SIZE) {
            let body = UpsertPointsRequest {
                points: chunk
                    .iter()
                    .map(|r| Point {
                        id: r.id,
                        vector: &r.vector,
                        payload: &r.payload,
                    })
                    .collect(),
            };
            let resp = self
                .client
                .put(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| PipelineError::Qdrant(format!("upsert request failed: {e}")))?;
            Self::check(resp, "upsert", name).await?;
        }
        Ok(())
    }

    pub(crate) async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let url = format!("{}/points/search", self.collection_url(name));
        let resp = self
            .client
            .post(&url)
            .json(&SearchRequest {
                vector,
                limit,
                with_payload: true,
            })
            .send()
            .await
            .map_err(|e| PipelineError::Qdrant(format!("search request failed: {e}")))?;
        let resp = Self::check(resp, "search", name).await?;
        let points: Vec<ScoredPoint> = Self::decode(resp, "search").await?;
        Ok(points
            .into_iter()
            .map(|p| SearchHit {
                id: p.id,
                score: p.score,
                payload: p.payload,
            })
            .collect())
    }

    /// Every point in the collection, following scroll pages to the end.
    pub(crate) async fn scroll_all(&self, name: &str) -> Result<Vec<VectorRecord>, PipelineError> {
        let url = format!("{}/points/scroll", self.collection_url(name));
        let mut records = Vec::new();
        let mut offset = None;
        loop {
            let resp = self
                .client
                .post(&url)
                .json(&ScrollRequest {
                    limit: PAGE_SIZE,
                    with_payload: true,
                    with_vector: true,
                    offset,
                })
                .send()
                .await
                .map_err(|e| PipelineError::Qdrant(format!("scroll request failed: {e}")))?;
            let resp = Self::check(resp, "scroll", name).await?;
            let page: ScrollPage = Self::decode(resp, "scroll").await?;
            records.extend(page.points.into_iter().map(|p| VectorRecord {
                id: p.id,
                vector: p.vector,
                payload: p.payload,
            }));
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    pub(crate) async fn vector_size(&self, name: &str) -> Result<usize, PipelineError> {
        let resp = self
            .client
            .get(self.collection_url(name))
            .send()
            .await
            .map_err(|e| PipelineError::Qdrant(format!("collection info request failed: {e}")))?;
        let resp = Self::check(resp, "collection info", name).await?;
        let info: CollectionInfo = Self::decode(resp, "collection info").await?;
        Ok(info.config.params.vectors.size)
    }
}
