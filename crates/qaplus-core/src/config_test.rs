use std::collections::HashMap;
use std::env::VarError;

use super::*;
use crate::pipeline_config::NoiseHandling;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn empty_yaml_yields_defaults() {
    let config = parse_pipeline_config("").unwrap();
    assert_eq!(config, PipelineConfig::default());
    assert_eq!(config.mode, PipelineMode::TemplateOnly);
    assert_eq!(config.filter.min_upvotes, 5);
    assert_eq!(config.span_extraction.max_spans_per_question, 3);
    assert_eq!(config.clustering.min_cluster_size, 3);
    assert_eq!(config.synthesis.max_clusters_to_synthesize, 20);
    config.validate().unwrap();
}

#[test]
fn partial_yaml_keeps_unnamed_defaults() {
    let yaml = r"
mode: clustering
filter:
  min_upvotes: 0
clustering:
  cluster_selection_epsilon: 0.0
  noise_handling: discard
";
    let config = parse_pipeline_config(yaml).unwrap();
    assert_eq!(config.mode, PipelineMode::Clustering);
    assert_eq!(config.filter.min_upvotes, 0);
    assert_eq!(config.filter.min_word_count, 10);
    assert!(config.clustering.cluster_selection_epsilon.abs() < f64::EPSILON);
    assert!((config.clustering.max_member_distance - 0.8).abs() < f64::EPSILON);
    assert_eq!(config.clustering.noise_handling, NoiseHandling::Discard);
    assert_eq!(config.clustering.min_samples, 2);
}

#[test]
fn mode_accepts_single_letters() {
    let config = parse_pipeline_config("mode: C").unwrap();
    assert_eq!(config.mode, PipelineMode::Synthesis);
    assert_eq!("b".parse::<PipelineMode>().unwrap(), PipelineMode::Clustering);
}

#[test]
fn unknown_embedding_backend_is_a_parse_error() {
    let yaml = "embedding:\n  backend: word2vec\n";
    let err = parse_pipeline_config(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigFileParse(_)), "got: {err:?}");
}

#[test]
fn env_overrides_replace_file_values() {
    let mut map = HashMap::new();
    map.insert("QAPLUS_MODE", "synthesis");
    map.insert("QAPLUS_EMBEDDING_BACKEND", "ollama");
    map.insert("QAPLUS_OLLAMA_URL", "http://ollama:11434");
    map.insert("QAPLUS_LLM_MODEL", "llama3.2:1b");
    map.insert("QAPLUS_VECTOR_STORE", "qdrant");
    map.insert("QAPLUS_QDRANT_URL", "http://qdrant:6333");
    map.insert("QAPLUS_MAX_CLUSTERS_TO_SYNTHESIZE", "4");

    let config = apply_env_overrides(PipelineConfig::default(), lookup_from_map(&map)).unwrap();
    assert_eq!(config.mode, PipelineMode::Synthesis);
    assert_eq!(config.embedding.backend, EmbeddingBackend::Ollama);
    assert_eq!(config.embedding.ollama.base_url, "http://ollama:11434");
    assert_eq!(config.synthesis.ollama_base_url, "http://ollama:11434");
    assert_eq!(config.synthesis.model, "llama3.2:1b");
    assert_eq!(config.vector_store.backend, VectorStoreBackend::Qdrant);
    assert_eq!(config.vector_store.qdrant_url, "http://qdrant:6333");
    assert_eq!(config.synthesis.max_clusters_to_synthesize, 4);
}

#[test]
fn blank_env_values_are_ignored() {
    let mut map = HashMap::new();
    map.insert("QAPLUS_MODE", "   ");
    let config = apply_env_overrides(PipelineConfig::default(), lookup_from_map(&map)).unwrap();
    assert_eq!(config.mode, PipelineMode::TemplateOnly);
}

#[test]
fn unknown_backend_override_names_the_variable() {
    let mut map = HashMap::new();
    map.insert("QAPLUS_EMBEDDING_BACKEND", "openai");
    let err = apply_env_overrides(PipelineConfig::default(), lookup_from_map(&map)).unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "QAPLUS_EMBEDDING_BACKEND"),
        "got: {err:?}"
    );
}

#[test]
fn non_numeric_synthesis_cap_is_rejected() {
    let mut map = HashMap::new();
    map.insert("QAPLUS_MAX_CLUSTERS_TO_SYNTHESIZE", "many");
    let err = apply_env_overrides(PipelineConfig::default(), lookup_from_map(&map)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
}

#[test]
fn validate_rejects_tiny_clusters() {
    let mut config = PipelineConfig::default();
    config.clustering.min_cluster_size = 1;
    let err = config.validate().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("min_cluster_size")),
        "got: {err:?}"
    );
}

#[test]
fn validate_rejects_out_of_range_thresholds() {
    let mut config = PipelineConfig::default();
    config.classification.min_journey_stage_confidence = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn missing_config_file_reports_path() {
    let path = std::path::Path::new("/nonexistent/qaplus/pipeline.yaml");
    let err = read_pipeline_config(path).unwrap_err();
    assert!(
        matches!(err, ConfigError::ConfigFileIo { ref path, .. } if path.ends_with("pipeline.yaml")),
        "got: {err:?}"
    );
}

#[test]
fn validate_rejects_non_positive_member_distance() {
    let mut config = PipelineConfig::default();
    config.clustering.max_member_distance = 0.0;
    let err = config.validate().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("max_member_distance")),
        "got: {err:?}"
    );
}

#[test]
fn validate_rejects_min_samples_above_cluster_size() {
    let mut config = PipelineConfig::default();
    config.clustering.min_samples = 4;
    assert!(config.validate().is_err());
}
