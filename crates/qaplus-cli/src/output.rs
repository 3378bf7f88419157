//! JSON artifacts written after a run.

use std::path::{Path, PathBuf};

use anyhow::Context;
use qaplus_pipeline::{ClusterMetrics, InsightCard, PipelineOutput, Solution};
use serde::Serialize;

#[derive(Serialize)]
struct InsightCardsFile<'a> {
    format: &'static str,
    community: &'a str,
    insights: &'a [InsightCard],
    total_insights: usize,
}

#[derive(Serialize)]
struct SolutionsFile<'a> {
    community: &'a str,
    solutions: &'a [Solution],
    total_solutions: usize,
}

/// `metrics` is null when the run never reached clustering.
#[derive(Serialize)]
struct ClusterMetricsFile<'a> {
    community: &'a str,
    metrics: Option<&'a ClusterMetrics>,
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> anyhow::Result<PathBuf> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Write the four per-community artifacts into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or a file cannot be
/// written.
pub(crate) fn write_artifacts(
    dir: &Path,
    community: &str,
    run: &PipelineOutput,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let written = vec![
        write_json(
            dir.join(format!("insight_cards_{community}.json")),
            &InsightCardsFile {
                format: "insight_cards",
                community,
                insights: &run.insight_cards,
                total_insights: run.insight_cards.len(),
            },
        )?,
        write_json(dir.join(format!("pain_points_{community}.json")), &run.legacy)?,
        write_json(
            dir.join(format!("cluster_metrics_{community}.json")),
            &ClusterMetricsFile {
                community,
                metrics: run.cluster_metrics.as_ref(),
            },
        )?,
        write_json(
            dir.join(format!("solutions_{community}.json")),
            &SolutionsFile {
                community,
                solutions: &run.solutions,
                total_solutions: run.solutions.len(),
            },
        )?,
    ];
    tracing::info!(run_id = %run.run_id, dir = %dir.display(), files = written.len(), "wrote artifacts");
    Ok(written)
}
