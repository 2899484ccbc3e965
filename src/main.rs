use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

use transpile_stage::pipeline::Pipeline;

#[derive(Debug, Parser)]
#[command(name = "tstage", version, about = "Runs an external code transformer over a source tree")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transform every source file and write the results to the destination.
    Build {
        /// Directory containing stage.toml.
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Keep going after a file fails to transform.
        #[arg(long)]
        keep_going: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build { root, keep_going } => {
            let mut pipeline = Pipeline::load(root)?;
            if keep_going {
                pipeline.keep_going();
            }

            let summary = pipeline.run().await?;
            tracing::info!(written = summary.written, failed = summary.failed, "build finished");

            if summary.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
