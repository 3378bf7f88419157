//! Per-run vector tables.
//!
//! Each run writes its span embeddings to a table named
//! `{prefix}_{run_id}` and gets back an [`EphemeralTable`] handle. Clustering
//! reads through the handle; [`EphemeralTable::cleanup`] consumes it and drops
//! the table. Creation overwrites any table of the same name.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use qaplus_core::{VectorStoreBackend, VectorStoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::qdrant::QdrantStore;
use crate::similarity::cosine_similarity;

/// What is stored next to each span vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanPayload {
    /// Index of the span in the run's span list.
    pub span_index: usize,
    pub text: String,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: SpanPayload,
}

/// Which model filled a table, so later reads can detect a model swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMeta {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    /// Cosine similarity to the query.
    pub score: f32,
    pub payload: SpanPayload,
}

#[derive(Debug)]
struct MemoryTable {
    meta: TableMeta,
    records: Vec<VectorRecord>,
}

/// In-process backend; tables live as long as the store.
#[derive(Debug, Default)]
struct MemoryStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryStore {
    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, MemoryTable>) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables)
    }
}

#[derive(Debug)]
enum Backend {
    Memory(MemoryStore),
    Qdrant(QdrantStore),
}

#[derive(Debug)]
pub struct VectorStore {
    backend: Backend,
    table_prefix: String,
}

impl VectorStore {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the Qdrant client cannot be built.
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self, PipelineError> {
        let backend = match config.backend {
            VectorStoreBackend::Memory => Backend::Memory(MemoryStore::default()),
            VectorStoreBackend::Qdrant => {
                Backend::Qdrant(QdrantStore::new(&config.qdrant_url, config.timeout_secs)?)
            }
        };
        Ok(Self {
            backend,
            table_prefix: config.table_prefix.clone(),
        })
    }

    /// An in-memory store with the default table prefix.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::default()),
            table_prefix: VectorStoreConfig::default().table_prefix,
        }
    }

    #[must_use]
    pub fn table_name(&self, run_id: &str) -> String {
        format!("{}_{run_id}", self.table_prefix)
    }

    /// Create (or replace) the run's table and load `records` into it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] for no records,
    /// [`PipelineError::DimensionMismatch`] when a vector does not match
    /// `meta.embedding_dimension`, or a backend error.
    pub async fn create_table(
        &self,
        run_id: &str,
        records: Vec<VectorRecord>,
        meta: TableMeta,
    ) -> Result<EphemeralTable<'_>, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != meta.embedding_dimension)
        {
            return Err(PipelineError::DimensionMismatch {
                expected: meta.embedding_dimension,
                got: bad.vector.len(),
            });
        }

        let name = self.table_name(run_id);
        match self.drop_table(&name).await {
            Ok(()) => tracing::debug!(table = %name, "replaced existing table"),
            Err(PipelineError::TableNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let len = records.len();
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| {
                tables.insert(
                    name.clone(),
                    MemoryTable {
                        meta: meta.clone(),
                        records,
                    },
                );
            }),
            Backend::Qdrant(store) => {
                store
                    .create_collection(&name, meta.embedding_dimension)
                    .await?;
                store.upsert_points(&name, &records).await?;
            }
        }
        tracing::info!(table = %name, rows = len, model = %meta.embedding_model, "created vector table");

        Ok(EphemeralTable {
            store: self,
            name,
            meta,
            len,
        })
    }

    /// Drop a table by name.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TableNotFound`] if it does not exist.
    pub async fn drop_table(&self, name: &str) -> Result<(), PipelineError> {
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| {
                tables
                    .remove(name)
                    .map(|_| ())
                    .ok_or_else(|| PipelineError::TableNotFound(name.to_string()))
            }),
            Backend::Qdrant(store) => store.delete_collection(name).await,
        }
    }

    /// Whether a table exists. Backend errors count as absent.
    pub async fn table_exists(&self, name: &str) -> bool {
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| tables.contains_key(name)),
            Backend::Qdrant(store) => store.vector_size(name).await.is_ok(),
        }
    }

    async fn search_table(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| {
                let table = tables
                    .get(name)
                    .ok_or_else(|| PipelineError::TableNotFound(name.to_string()))?;
                let mut hits: Vec<SearchHit> = table
                    .records
                    .iter()
                    .map(|r| SearchHit {
                        id: r.id,
                        score: cosine_similarity(query, &r.vector),
                        payload: r.payload.clone(),
                    })
                    .collect();
                hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
                hits.truncate(limit);
                Ok(hits)
            }),
            Backend::Qdrant(store) => store.search(name, query, limit).await,
        }
    }

    async fn fetch_all(&self, name: &str) -> Result<Vec<VectorRecord>, PipelineError> {
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| {
                tables
                    .get(name)
                    .map(|t| t.records.clone())
                    .ok_or_else(|| PipelineError::TableNotFound(name.to_string()))
            }),
            Backend::Qdrant(store) => store.scroll_all(name).await,
        }
    }

    async fn stored_dimension(&self, name: &str) -> Result<usize, PipelineError> {
        match &self.backend {
            Backend::Memory(store) => store.with_tables(|tables| {
                tables
                    .get(name)
                    .map(|t| t.meta.embedding_dimension)
                    .ok_or_else(|| PipelineError::TableNotFound(name.to_string()))
            }),
            Backend::Qdrant(store) => store.vector_size(name).await,
        }
    }
}

/// Handle to one run's table. Dropping the handle does not drop the table;
/// call [`EphemeralTable::cleanup`].
#[derive(Debug)]
pub struct EphemeralTable<'a> {
    store: &'a VectorStore,
    name: String,
    meta: TableMeta,
    len: usize,
}

impl EphemeralTable<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nearest rows to `query` by cosine similarity, best first.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`PipelineError::TableNotFound`].
    pub async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>, PipelineError> {
        self.store.search_table(&self.name, query, limit).await
    }

    /// All rows ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`PipelineError::TableNotFound`].
    pub async fn get_all_vectors(&self) -> Result<Vec<VectorRecord>, PipelineError> {
        self.store.fetch_all(&self.name).await
    }

    /// Confirm the stored vectors still have the dimension the caller expects.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] when the model's dimension
    /// and the table's differ.
    pub async fn validate_dimension(&self, expected: usize) -> Result<(), PipelineError> {
        let stored = self.store.stored_dimension(&self.name).await?;
        if stored != expected {
            tracing::error!(table = %self.name, stored, expected, "vector table dimension mismatch");
            return Err(PipelineError::DimensionMismatch {
                expected,
                got: stored,
            });
        }
        Ok(())
    }

    /// Drop the table. Failures are logged, never returned.
    pub async fn cleanup(self) {
        match self.store.drop_table(&self.name).await {
            Ok(()) => tracing::debug!(table = %self.name, "dropped vector table"),
            Err(PipelineError::TableNotFound(_)) => {}
            Err(e) => tracing::warn!(table = %self.name, error = %e, "failed to drop vector table"),
        }
    }
}
