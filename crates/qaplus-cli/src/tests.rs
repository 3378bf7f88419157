use std::path::Path;

use qaplus_core::{PipelineConfig, PipelineMode};
use qaplus_pipeline::{EvidencePreservingGrouper, QaProcessorPlus};
use serde_json::{json, Value};

use super::*;
use crate::input::{community_name, detect_shape, load_conversations, parse_conversations, InputShape};

#[test]
fn parses_process_with_defaults() {
    let cli = Cli::try_parse_from(["qaplus", "process", "data/devops.json"]).expect("valid cli args");

    match cli.command {
        Some(Commands::Process {
            input,
            output,
            mode,
            community,
            run_id,
        }) => {
            assert_eq!(input, PathBuf::from("data/devops.json"));
            assert_eq!(output, PathBuf::from("output"));
            assert!(mode.is_none() && community.is_none() && run_id.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_process_overrides() {
    let cli = Cli::try_parse_from([
        "qaplus",
        "process",
        "in",
        "-o",
        "out",
        "--mode",
        "clustering",
        "--community",
        "devops",
        "--config",
        "qaplus.yaml",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("qaplus.yaml")));
    assert!(matches!(
        cli.command,
        Some(Commands::Process {
            mode: Some(ref m),
            community: Some(ref c),
            ..
        }) if m == "clustering" && c == "devops"
    ));
}

#[test]
fn parses_config_command() {
    let cli = Cli::try_parse_from(["qaplus", "config"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Config)));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["qaplus"]).expect("valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn shape_is_detected_from_question_objects() {
    assert_eq!(
        detect_shape(&[json!({"question": {"title": "t"}, "comments": []})]),
        InputShape::Grouped
    );
    assert_eq!(
        detect_shape(&[json!({"id": "p1", "data_type": "post"})]),
        InputShape::Flat
    );
    assert_eq!(detect_shape(&[]), InputShape::Flat);
}

#[test]
fn grouped_and_flat_inputs_parse() {
    let grouper = EvidencePreservingGrouper::new();
    let grouped = json!([{
        "question": {"id": 1, "title": "Builds", "body": "Builds are slow", "post_id": "p1"},
        "comments": [{"body": "Use a cache"}]
    }])
    .to_string();
    let conversations = parse_conversations(&grouped, &grouper).unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].comments[0].post_id.as_deref(), Some("p1"));

    let flat = json!([
        {"id": "p1", "data_type": "post", "title": "Builds", "body": "Slow"},
        {"id": "c1", "data_type": "comment", "post_id": "p1", "body": "Use a cache"}
    ])
    .to_string();
    let conversations = parse_conversations(&flat, &grouper).unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].comments.len(), 1);
}

#[test]
fn null_fields_and_bad_elements_do_not_sink_the_file() {
    let grouper = EvidencePreservingGrouper::new();
    let grouped = json!([
        {"question": {"title": "First", "body": "Builds are slow"}, "comments": null},
        {"question": null, "comments": [{"body": "orphaned"}]},
        "not an object",
        {"question": {"title": "Second", "body": "Deploys fail"}, "comments": [{"body": "Retry"}]}
    ])
    .to_string();
    let conversations = parse_conversations(&grouped, &grouper).unwrap();
    let titles: Vec<&str> = conversations.iter().map(|c| c.question.title.as_str()).collect();
    assert!(titles.contains(&"First"));
    assert!(titles.contains(&"Second"));
    let first = conversations.iter().find(|c| c.question.title == "First").unwrap();
    assert!(first.comments.is_empty());

    let flat = json!([
        42,
        {"id": "p1", "data_type": "post", "title": "Builds", "body": "Slow"}
    ])
    .to_string();
    assert_eq!(parse_conversations(&flat, &grouper).unwrap().len(), 1);
}

#[test]
fn non_array_input_is_rejected() {
    let grouper = EvidencePreservingGrouper::new();
    assert!(parse_conversations(r#"{"question": {}}"#, &grouper).is_err());
}

#[test]
fn directory_input_skips_unparseable_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.json"),
        json!([{"question": {"title": "One"}, "comments": []}]).to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("b.json"), "not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let conversations = load_conversations(dir.path()).unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].question.title, "One");
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_conversations(dir.path()).is_err());
}

#[test]
fn community_defaults_to_file_stem() {
    assert_eq!(community_name(Path::new("exports/devops.json")), "devops");
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("rust");
    std::fs::create_dir(&sub).unwrap();
    assert_eq!(community_name(&sub), "rust");
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn artifacts_use_report_envelopes() {
    let grouper = EvidencePreservingGrouper::new();
    let input = json!([{
        "question": {
            "id": "q1",
            "title": "Crash on launch",
            "body": "The app crashes every time I open the settings page after the update.",
            "upvotes": 14,
            "post_id": "q1",
            "sentiment": "negative",
            "category": "Question"
        },
        "comments": [{"body": "As a workaround you can clear the cache before opening settings.", "upvotes": 4}]
    }])
    .to_string();
    let conversations = parse_conversations(&input, &grouper).unwrap();

    let config = PipelineConfig {
        mode: PipelineMode::TemplateOnly,
        ..PipelineConfig::default()
    };
    let processor = QaProcessorPlus::from_config(config).unwrap();
    let run = processor.run(&conversations, "test_run").await.unwrap();
    assert!(!run.insight_cards.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let written = output::write_artifacts(&out, "mobile", &run).unwrap();
    assert_eq!(written.len(), 4);

    let cards = read_json(&out.join("insight_cards_mobile.json"));
    assert_eq!(cards["format"], "insight_cards");
    assert_eq!(cards["community"], "mobile");
    assert_eq!(cards["total_insights"], json!(run.insight_cards.len()));

    let legacy = read_json(&out.join("pain_points_mobile.json"));
    assert_eq!(legacy["format"], "legacy");
    assert_eq!(legacy["total_count"], json!(run.insight_cards.len()));

    let metrics = read_json(&out.join("cluster_metrics_mobile.json"));
    assert_eq!(metrics["community"], "mobile");
    assert!(metrics["metrics"].is_null());

    let solutions = read_json(&out.join("solutions_mobile.json"));
    assert_eq!(solutions["total_solutions"], json!(run.solutions.len()));
}
