use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "foundry")]
#[command(version, about = "Signal-driven plan → develop → audit → package pipeline")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new foundry project
    Init {
        /// Application description to copy into docs/app_description.md
        #[arg(long)]
        description: Option<PathBuf>,

        /// Skip git repository initialization
        #[arg(long)]
        no_git: bool,
    },
    /// Run the pipeline until it completes or needs assistance
    Run {
        /// Attempts per stage before escalating (overrides foundry.toml)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay between attempts in milliseconds (overrides foundry.toml)
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Do not write JSON logs to .foundry/logs/foundry.log
        #[arg(long)]
        no_json_log: bool,
    },
    /// Show pipeline progress
    Status,
    /// Clear persisted state, signals and work items
    Reset {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init {
            description,
            no_git,
        } => cmd::cmd_init(&project_dir, &cli, description.clone(), !*no_git)?,
        Commands::Run {
            max_attempts,
            retry_delay_ms,
            no_json_log,
        } => {
            let overrides = cmd::RunOverrides {
                max_attempts: *max_attempts,
                retry_delay_ms: *retry_delay_ms,
                json_log: !*no_json_log,
            };
            cmd::cmd_run(&cli, project_dir, overrides).await?;
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, &cli, *force)?,
    }

    Ok(())
}
