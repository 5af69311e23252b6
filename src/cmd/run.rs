//! Pipeline execution: `foundry run`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::super::Cli;

/// CLI flags layered over foundry.toml for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunOverrides {
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub json_log: bool,
}

pub fn check_run_prerequisites(project_dir: &Path) -> Result<()> {
    use foundry::init::is_initialized;

    if !project_dir.is_dir() {
        anyhow::bail!("Project directory not found: {}", project_dir.display());
    }
    if !is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'foundry init' first.");
    }
    Ok(())
}

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, overrides: RunOverrides) -> Result<()> {
    use foundry::config::Config;
    use foundry::orchestrator::Orchestrator;

    check_run_prerequisites(&project_dir)?;

    let config = Config::new(project_dir, cli.verbose)?
        .with_retry_overrides(overrides.max_attempts, overrides.retry_delay_ms);
    config.validate()?;
    config.ensure_directories()?;

    let json_file = overrides.json_log && config.toml.logging.json_file;
    let _guard = foundry::logging::init(&config.log_dir, config.verbose, json_file)?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "run",
        %run_id,
        project = %config.project_name()
    );

    let mut orchestrator = Orchestrator::from_config(&config)
        .context("Failed to set up orchestrator")?
        .with_span(span);

    println!(
        "{} {}",
        console::style("Foundry").bold().cyan(),
        console::style(config.project_dir.display()).dim()
    );

    match orchestrator.run().await {
        Ok(summary) => {
            if summary.stages_run.is_empty() {
                println!("Pipeline already complete, nothing to run.");
            } else {
                let stages: Vec<&str> = summary.stages_run.iter().map(|s| s.as_str()).collect();
                println!("Stages run: {}", stages.join(" → "));
            }
            if let Some(archive) = &summary.archive {
                println!(
                    "{} {}",
                    console::style("Packaged:").green().bold(),
                    archive.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", console::style("Error:").red().bold(), e);
            if e.is_escalation() {
                println!(
                    "Assistance required, see {}",
                    orchestrator.store().escalation_path().display()
                );
            }
            Err(e.into())
        }
    }
}
