//! Tandem CLI entry point.
//!
//! Commands:
//! - `run`: Run a workflow file
//! - `validate`: Check a workflow file without calling any model
//! - `init`: Write the story-refinement example workflow
//! - `doctor`: Diagnose config and provider health

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "tandem",
    about = "Tandem: composable agent workflows",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    Run {
        /// Path to the workflow TOML file
        workflow: PathBuf,

        /// Input handed to every agent as the user message
        #[arg(short, long, default_value = "")]
        input: String,

        /// Seed a state key before the run (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Print the final state and response as JSON
        #[arg(long)]
        json: bool,

        /// Print every workflow event to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to the workflow TOML file
        workflow: PathBuf,
    },

    /// Write the example story workflow
    Init {
        /// Where to write it
        #[arg(default_value = "workflow.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so `--json` output stays clean
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run {
            workflow,
            input,
            set,
            json,
            trace,
        } => {
            commands::run::run(commands::run::RunArgs {
                workflow,
                input,
                set,
                json,
                trace,
            })
            .await?
        }
        Commands::Validate { workflow } => commands::validate::run(&workflow)?,
        Commands::Init { path, force } => commands::init::run(&path, force)?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
