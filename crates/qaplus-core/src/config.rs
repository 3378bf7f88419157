use std::env::VarError;
use std::path::Path;
use std::str::FromStr;

use crate::pipeline_config::{EmbeddingBackend, PipelineConfig, PipelineMode, VectorStoreBackend};
use crate::ConfigError;

/// Load the pipeline configuration from an optional YAML file plus env overrides.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
/// Without a path, the built-in defaults are the base.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, an override is
/// malformed, or the merged config fails validation.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_pipeline_config_from_env(path)
}

/// Same as [`load_pipeline_config`] but without touching `.env` files.
///
/// # Errors
///
/// See [`load_pipeline_config`].
pub fn load_pipeline_config_from_env(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let base = match path {
        Some(path) => read_pipeline_config(path)?,
        None => PipelineConfig::default(),
    };
    let config = apply_env_overrides(base, |key| std::env::var(key))?;
    config.validate()?;
    Ok(config)
}

/// Read and parse a YAML pipeline config file. Does not validate.
///
/// # Errors
///
/// Returns [`ConfigError::ConfigFileIo`] or [`ConfigError::ConfigFileParse`].
pub fn read_pipeline_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pipeline_config(&contents)
}

/// Parse YAML text into a [`PipelineConfig`]. Blank input yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError::ConfigFileParse`] on malformed YAML or unknown enum values.
pub fn parse_pipeline_config(yaml: &str) -> Result<PipelineConfig, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Apply `QAPLUS_*` overrides using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can feed a `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` when an override is present but cannot be parsed.
pub fn apply_env_overrides<F>(
    mut config: PipelineConfig,
    lookup: F,
) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let get = |var: &str| lookup(var).ok().filter(|v| !v.trim().is_empty());

    let parse_usize = |var: &str, raw: &str| -> Result<usize, ConfigError> {
        raw.trim()
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_enum = |var: &str, raw: &str, err: ConfigError| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: format!("{err} ({raw})"),
    };

    if let Some(raw) = get("QAPLUS_MODE") {
        config.mode = PipelineMode::from_str(&raw).map_err(|e| parse_enum("QAPLUS_MODE", &raw, e))?;
    }
    if let Some(raw) = get("QAPLUS_LOG_LEVEL") {
        config.log_level = raw;
    }
    if let Some(raw) = get("QAPLUS_EMBEDDING_BACKEND") {
        config.embedding.backend = EmbeddingBackend::from_str(&raw)
            .map_err(|e| parse_enum("QAPLUS_EMBEDDING_BACKEND", &raw, e))?;
    }
    if let Some(raw) = get("QAPLUS_TEI_URL") {
        config.embedding.sentence_transformers.url = raw;
    }
    if let Some(raw) = get("QAPLUS_OLLAMA_URL") {
        config.embedding.ollama.base_url.clone_from(&raw);
        config.synthesis.ollama_base_url = raw;
    }
    if let Some(raw) = get("QAPLUS_LLM_MODEL") {
        config.synthesis.model = raw;
    }
    if let Some(raw) = get("QAPLUS_VECTOR_STORE") {
        config.vector_store.backend = VectorStoreBackend::from_str(&raw)
            .map_err(|e| parse_enum("QAPLUS_VECTOR_STORE", &raw, e))?;
    }
    if let Some(raw) = get("QAPLUS_QDRANT_URL") {
        config.vector_store.qdrant_url = raw;
    }
    if let Some(raw) = get("QAPLUS_MAX_CLUSTERS_TO_SYNTHESIZE") {
        config.synthesis.max_clusters_to_synthesize =
            parse_usize("QAPLUS_MAX_CLUSTERS_TO_SYNTHESIZE", &raw)?;
    }

    Ok(config)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
