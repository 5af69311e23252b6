//! Progress inspection and reset: `foundry status`, `foundry reset`.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use foundry::config::Config;
    use foundry::init::is_initialized;
    use foundry::orchestrator::{Orchestrator, Stage, StateManager};
    use foundry::package::TarGzPackager;
    use foundry::signals::{Signal, SignalStore};

    println!();
    println!("Foundry Project Status");
    println!("======================");
    println!();

    if !is_initialized(project_dir) {
        println!("Project: Not initialized");
        println!();
        println!("Run 'foundry init' to initialize the project.");
        println!();
        return Ok(());
    }

    let config = Config::new(project_dir.to_path_buf(), false)?;
    println!("Project: {}", config.project_name());

    let mut state = StateManager::new(config.state_file.clone());
    let snapshot = state.load_readonly().clone();
    println!("Phase:   {}", snapshot.current_phase);

    let completed: Vec<&str> = Stage::ALL
        .iter()
        .map(|s| s.as_str())
        .filter(|s| snapshot.is_task_complete(s))
        .collect();
    if completed.is_empty() {
        println!("Completed stages: none");
    } else {
        println!("Completed stages: {}", completed.join(", "));
    }

    if let Some(error) = &snapshot.last_error {
        println!(
            "{} {}",
            console::style("Last error:").red().bold(),
            error.lines().next().unwrap_or_default()
        );
    }

    let orchestrator = Orchestrator::new(
        &config.project_dir,
        state,
        Box::new(TarGzPackager::new(config.archive_path())),
    );
    let store = orchestrator.store();

    println!();
    println!("Signals:");
    for signal in Signal::PRECEDENCE {
        let mark = if store.signal_exists(signal) {
            console::style("✓").green()
        } else {
            console::style("·").dim()
        };
        println!("  {} {}", mark, signal.file_name());
    }
    let items = store.list_work_items()?;
    println!("Pending work items: {}", items.len());
    for item in items.iter().take(5) {
        println!("  - {}", item.description);
    }

    println!();
    match orchestrator.next_stage()? {
        Some(stage) => println!("Next stage: {}", stage),
        None => println!("Next stage: none (pipeline complete)"),
    }
    if store.escalation_exists() {
        println!(
            "{} {}",
            console::style("Needs assistance:").yellow().bold(),
            store.escalation_path().display()
        );
    }
    println!();
    Ok(())
}

pub fn cmd_reset(project_dir: &Path, cli: &Cli, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use foundry::config::Config;
    use foundry::orchestrator::StateManager;
    use foundry::signals::{FsSignalStore, Signal};

    let config = Config::new(project_dir.to_path_buf(), cli.verbose)?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will reset all progress, signals and work items. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let mut state = StateManager::new(config.state_file.clone());
    state.reset()?;

    let store = FsSignalStore::new(config.signals_dir.clone(), config.work_items_dir.clone());
    let removed = store.remove_signals(&Signal::PRECEDENCE)?;
    store.remove_escalation()?;
    let cleared = store.clear_work_items()?;

    println!(
        "Reset complete ({} signal(s), {} work item(s) removed)",
        removed.len(),
        cleared
    );
    Ok(())
}
