use qaplus_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    UpstreamStatus { service: &'static str, status: u16 },

    #[error("{service} response parse error: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned {got} results for {expected} inputs")]
    CountMismatch {
        service: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("vector table not found: {0}")]
    TableNotFound(String),

    #[error("cannot create a vector table from zero records")]
    EmptyInput,

    #[error("{0} backend is not configured")]
    Unavailable(&'static str),

    #[error("clustering input error: {0}")]
    Clustering(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Fatal errors abort the run instead of degrading to a lower mode.
    ///
    /// A dimension mismatch means the vector table no longer matches the
    /// embedding model; clustering such data would silently produce nonsense.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::Config(_) | Self::Clustering(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_fatal() {
        let err = PipelineError::DimensionMismatch {
            expected: 384,
            got: 768,
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn backend_outages_degrade() {
        assert!(!PipelineError::UpstreamStatus {
            service: "TEI",
            status: 503
        }
        .is_fatal());
        assert!(!PipelineError::Unavailable("embedding").is_fatal());
        assert!(!PipelineError::Qdrant("down".into()).is_fatal());
    }

    #[test]
    fn config_errors_are_fatal() {
        let err = PipelineError::from(ConfigError::UnknownEmbeddingBackend("x".into()));
        assert!(err.is_fatal());
    }
}
