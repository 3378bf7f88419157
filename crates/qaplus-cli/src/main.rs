mod input;
mod output;
mod process;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::process::ProcessArgs;

#[derive(Debug, Parser)]
#[command(name = "qaplus")]
#[command(about = "Turn community Q&A threads into evidence-backed insight cards")]
struct Cli {
    /// Pipeline config file (YAML). Built-in defaults apply when omitted.
    #[arg(long, short, global = true, env = "QAPLUS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline over a JSON file or a directory of JSON files
    Process {
        /// Conversations file, or a directory whose `*.json` files are all read
        input: PathBuf,

        /// Directory the artifacts are written to
        #[arg(long, short, default_value = "output")]
        output: PathBuf,

        /// Override the configured mode (`template_only`, `clustering`, `synthesis`)
        #[arg(long)]
        mode: Option<String>,

        /// Name used in artifact file names; defaults to the input's file stem
        #[arg(long)]
        community: Option<String>,

        /// Reuse a run id instead of generating one
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Print the effective configuration as YAML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = qaplus_core::load_pipeline_config_from_env(cli.config.as_deref())?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Process {
            input,
            output,
            mode,
            community,
            run_id,
        }) => {
            process::run_process(
                config,
                ProcessArgs {
                    input,
                    output,
                    mode,
                    community,
                    run_id,
                },
            )
            .await?;
        }
        Some(Commands::Config) => print!("{}", serde_yaml::to_string(&config)?),
        None => Cli::command().print_help()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
