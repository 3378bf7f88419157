//! HTTP backends exercised against wiremock servers.

use qaplus_core::{
    EmbeddingBackend, EmbeddingConfig, SynthesisConfig, VectorStoreBackend, VectorStoreConfig,
};
use qaplus_pipeline::{
    EmbeddingPlugin, EmbeddingWrapper, LlmSynthesizer, OllamaGenerator, PipelineError, SpanPayload,
    TableMeta, TextGenerator, VectorRecord, VectorStore,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedding_config(server: &MockServer, backend: EmbeddingBackend) -> EmbeddingConfig {
    let mut config = EmbeddingConfig {
        backend,
        batch_size: 2,
        max_retries: 1,
        retry_backoff_ms: 1,
        ..EmbeddingConfig::default()
    };
    config.sentence_transformers.url = server.uri();
    config.sentence_transformers.dimension = 3;
    config.ollama.base_url = server.uri();
    config.ollama.dimension = 3;
    config
}

fn synthesis_config(server: &MockServer) -> SynthesisConfig {
    SynthesisConfig {
        ollama_base_url: server.uri(),
        max_retries: 0,
        retry_backoff_ms: 1,
        ..SynthesisConfig::default()
    }
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn tei_embeddings_are_batched_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(json!({ "inputs": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(json!({ "inputs": ["c"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.0, 0.0, 1.0]])))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::SentenceTransformers))
            .unwrap();
    let vectors = embedder.encode(&texts(&["a", "b", "c"])).await.unwrap();

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]
    );
}

#[tokio::test]
async fn tei_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.5, 0.5, 0.0]])))
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::SentenceTransformers))
            .unwrap();
    let vectors = embedder.encode(&texts(&["only"])).await.unwrap();
    assert_eq!(vectors, vec![vec![0.5, 0.5, 0.0]]);
}

#[tokio::test]
async fn tei_wrong_dimension_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.5, 0.5]])))
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::SentenceTransformers))
            .unwrap();
    let err = embedder.encode(&texts(&["only"])).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DimensionMismatch {
            expected: 3,
            got: 2
        }
    ));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn tei_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(413))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::SentenceTransformers))
            .unwrap();
    let err = embedder.encode(&texts(&["only"])).await.unwrap_err();
    assert!(matches!(err, PipelineError::UpstreamStatus { status: 413, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn ollama_embeddings_send_the_model_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text", "input": ["x"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.0, 1.0, 0.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::Ollama)).unwrap();
    assert_eq!(embedder.model_name(), "nomic-embed-text");
    let vectors = embedder.encode(&texts(&["x"])).await.unwrap();
    assert_eq!(vectors, vec![vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn ollama_missing_embeddings_is_a_count_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let embedder =
        EmbeddingWrapper::from_config(&embedding_config(&server, EmbeddingBackend::Ollama)).unwrap();
    let err = embedder.encode(&texts(&["x", "y"])).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::CountMismatch {
            expected: 2,
            got: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn ollama_generate_returns_trimmed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "smollm2:360m", "stream": false })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": "  Slow deploys \n", "done": true })),
        )
        .mount(&server)
        .await;

    let generator = OllamaGenerator::from_config(&synthesis_config(&server)).unwrap();
    assert_eq!(generator.model_name(), "smollm2:360m");
    assert_eq!(generator.generate("prompt").await.unwrap(), "Slow deploys");
}

#[tokio::test]
async fn synthesis_survives_a_failing_llm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::from_config(&synthesis_config(&server)).unwrap();
    let synthesizer = LlmSynthesizer::new(generator, 20);
    let out = synthesizer
        .synthesize(&["deploys time out", "deploy timeout again"], "Deployment — timeout")
        .await;
    assert_eq!(out.label, None);
    assert_eq!(out.why_it_matters, None);
    assert!(out.open_questions.is_empty());
}

fn record(id: u64, vector: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id,
        vector,
        payload: SpanPayload {
            span_index: usize::try_from(id).unwrap(),
            text: format!("span {id}"),
            post_id: Some("p1".into()),
            post_url: None,
            confidence: 0.5,
        },
    }
}

fn payload_json(id: u64) -> serde_json::Value {
    json!({
        "span_index": id,
        "text": format!("span {id}"),
        "post_id": "p1",
        "post_url": null,
        "confidence": 0.5
    })
}

#[tokio::test]
async fn qdrant_table_lifecycle() {
    let server = MockServer::start().await;
    let collection = "/collections/pain_spans_r1";

    // The overwrite check finds nothing; the final cleanup succeeds.
    Mock::given(method("DELETE"))
        .and(path(collection))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(collection))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(collection))
        .and(body_json(json!({ "vectors": { "size": 3, "distance": "Cosine" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{collection}/points")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "status": "completed" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(collection))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "config": { "params": { "vectors": { "size": 3, "distance": "Cosine" } } } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{collection}/points/search")))
        .and(body_partial_json(json!({ "limit": 1, "with_payload": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{ "id": 1, "score": 0.98, "payload": payload_json(1) }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{collection}/points/scroll")))
        .and(body_partial_json(json!({ "offset": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points": [{ "id": 1, "vector": [0.0, 1.0, 0.0], "payload": payload_json(1) }],
                "next_page_offset": null
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{collection}/points/scroll")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points": [{ "id": 0, "vector": [1.0, 0.0, 0.0], "payload": payload_json(0) }],
                "next_page_offset": 1
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let store = VectorStore::from_config(&VectorStoreConfig {
        backend: VectorStoreBackend::Qdrant,
        qdrant_url: server.uri(),
        ..VectorStoreConfig::default()
    })
    .unwrap();
    let table = store
        .create_table(
            "r1",
            vec![record(0, vec![1.0, 0.0, 0.0]), record(1, vec![0.0, 1.0, 0.0])],
            TableMeta {
                embedding_model: "fake".into(),
                embedding_dimension: 3,
                created_at: "2024-05-01T00:00:00Z".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(table.name(), "pain_spans_r1");
    assert_eq!(table.len(), 2);

    table.validate_dimension(3).await.unwrap();
    let err = table.validate_dimension(768).await.unwrap_err();
    assert!(matches!(err, PipelineError::DimensionMismatch { expected: 768, got: 3 }));

    let hits = table.search(&[0.0, 1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.span_index, 1);

    let rows = table.get_all_vectors().await.unwrap();
    let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 1]);

    table.cleanup().await;
}

#[tokio::test]
async fn qdrant_missing_collection_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/collections/pain_spans_gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = VectorStore::from_config(&VectorStoreConfig {
        backend: VectorStoreBackend::Qdrant,
        qdrant_url: server.uri(),
        ..VectorStoreConfig::default()
    })
    .unwrap();
    let err = store.drop_table("pain_spans_gone").await.unwrap_err();
    assert!(matches!(err, PipelineError::TableNotFound(_)));
    assert!(!store.table_exists("pain_spans_gone").await);
}
