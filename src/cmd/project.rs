//! Project setup: `foundry init`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::super::Cli;

pub fn cmd_init(
    project_dir: &Path,
    cli: &Cli,
    description: Option<PathBuf>,
    git: bool,
) -> Result<()> {
    use foundry::init::{InitOptions, init_project};

    std::fs::create_dir_all(project_dir)?;
    let _guard =
        foundry::logging::init(&project_dir.join(".foundry/logs"), cli.verbose, false)?;

    let options = InitOptions { description, git };
    let result = init_project(project_dir, &options)?;

    if result.created {
        println!("Initialized foundry project at {}", project_dir.display());
        println!();
        println!("Created directory structure:");
        println!("  foundry.toml   # Project configuration");
        println!("  docs/          # Application description");
        println!("  rules/         # Optional rules-<planner|developer|auditor>.md");
        println!("  signals/       # Stage completion markers");
        println!("  work_items/    # Pending remediation tasks");
        println!("  .foundry/      # State and logs");
    } else {
        println!(
            "Foundry project already initialized at {}",
            project_dir.display()
        );
        println!("Directory structure verified.");
    }

    if let Some(path) = &result.description {
        println!("Description copied to {}", path.display());
    }
    if git && !result.git_initialized {
        println!(
            "{} git repository could not be initialized",
            console::style("Warning:").yellow().bold()
        );
    }

    if result.created {
        println!();
        println!("Next steps:");
        println!("  1. Add rules under rules/ (optional)");
        println!("  2. Configure stage commands in foundry.toml (optional)");
        println!("  3. Run `foundry run`");
    }

    Ok(())
}
