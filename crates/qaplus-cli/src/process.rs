//! The `process` command: load, run, write.

use std::path::PathBuf;

use qaplus_core::{PipelineConfig, PipelineMode};
use qaplus_pipeline::{new_run_id, QaProcessorPlus};

use crate::{input, output};

#[derive(Debug)]
pub(crate) struct ProcessArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: Option<String>,
    pub community: Option<String>,
    pub run_id: Option<String>,
}

/// Run the pipeline once and write its artifacts.
///
/// Ctrl-C abandons the run and drops its vector table before returning an
/// error, so an interrupted run leaves nothing behind in the store.
///
/// # Errors
///
/// Returns an error for unreadable input, an invalid mode, a fatal pipeline
/// error, cancellation, or a failed artifact write.
pub(crate) async fn run_process(mut config: PipelineConfig, args: ProcessArgs) -> anyhow::Result<()> {
    if let Some(mode) = &args.mode {
        config.mode = mode.parse::<PipelineMode>()?;
    }

    let conversations = input::load_conversations(&args.input)?;
    let community = args
        .community
        .clone()
        .unwrap_or_else(|| input::community_name(&args.input));
    let run_id = args.run_id.clone().unwrap_or_else(new_run_id);

    let processor = QaProcessorPlus::from_config(config)?;
    let result = tokio::select! {
        result = processor.run(&conversations, &run_id) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(run_id = %run_id, "interrupted, dropping run table");
            processor.cleanup_run(&run_id).await;
            anyhow::bail!("run {run_id} cancelled");
        }
    };
    let run = result?;

    let written = output::write_artifacts(&args.output, &community, &run)?;
    for path in &written {
        println!("wrote {}", path.display());
    }
    println!(
        "{} insight cards from {} of {} conversations (mode {}, requested {})",
        run.insight_cards.len(),
        run.stats.conversations_passed,
        run.stats.conversations_in,
        run.effective_mode.as_str(),
        run.requested_mode.as_str(),
    );
    Ok(())
}
