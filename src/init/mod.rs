//! Initialization of foundry projects.
//!
//! `foundry init` lays out the project directory:
//!
//! ```text
//! <project>/
//! ├── foundry.toml        # Project configuration
//! ├── docs/
//! │   └── app_description.md   # Copied from --description, if given
//! ├── rules/              # Optional rules-<planner|developer|auditor>.md
//! ├── signals/            # Stage completion markers
//! ├── work_items/         # Pending remediation tasks
//! └── .foundry/
//!     ├── project_state.json
//!     └── logs/
//! ```

use anyhow::{Context, Result, bail};
use git2::Repository;
use std::path::{Path, PathBuf};

use crate::config::dir_name;
use crate::foundry_config::{CONFIG_FILE_NAME, default_toml};

/// The name of the orchestrator's private directory.
pub const FOUNDRY_DIR: &str = ".foundry";

pub const DESCRIPTION_FILE: &str = "app_description.md";

const PROJECT_DIRS: &[&str] = &["docs", "rules", "signals", "work_items", ".foundry/logs"];

const GITIGNORE: &str = ".foundry/\noutput/\n";

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Application description copied to `docs/app_description.md`
    pub description: Option<PathBuf>,
    pub git: bool,
}

/// Result of initializing a foundry project.
#[derive(Debug)]
pub struct InitResult {
    pub foundry_dir: PathBuf,
    /// Whether the project was newly created (false if it already existed)
    pub created: bool,
    pub config_written: bool,
    pub description: Option<PathBuf>,
    pub git_initialized: bool,
}

/// Initialize a foundry project in `project_dir`. Safe to run again on an
/// existing project: missing pieces are added, existing files are kept.
pub fn init_project(project_dir: &Path, options: &InitOptions) -> Result<InitResult> {
    if let Some(description) = &options.description
        && !description.is_file()
    {
        bail!("Description file not found: {}", description.display());
    }

    let created = !is_initialized(project_dir);
    ensure_directory_structure(project_dir)?;

    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let config_written = if config_path.exists() {
        false
    } else {
        std::fs::write(&config_path, default_toml(&dir_name(project_dir)))
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        true
    };

    let description = match &options.description {
        Some(source) => {
            let target = project_dir.join("docs").join(DESCRIPTION_FILE);
            std::fs::copy(source, &target).with_context(|| {
                format!(
                    "Failed to copy description {} to {}",
                    source.display(),
                    target.display()
                )
            })?;
            Some(target)
        }
        None => None,
    };

    let git_initialized = options.git && init_git_repository(project_dir);

    tracing::info!(
        project = %project_dir.display(),
        created,
        git_initialized,
        "Project initialized"
    );

    Ok(InitResult {
        foundry_dir: project_dir.join(FOUNDRY_DIR),
        created,
        config_written,
        description,
        git_initialized,
    })
}

fn ensure_directory_structure(project_dir: &Path) -> Result<()> {
    for dir in PROJECT_DIRS {
        let path = project_dir.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Create a git repository unless one already exists. Failure is reported
/// and otherwise ignored.
fn init_git_repository(project_dir: &Path) -> bool {
    if Repository::open(project_dir).is_ok() {
        tracing::debug!("Git repository already present");
        return true;
    }

    match Repository::init(project_dir) {
        Ok(_) => {
            let gitignore = project_dir.join(".gitignore");
            if !gitignore.exists()
                && let Err(e) = std::fs::write(&gitignore, GITIGNORE)
            {
                tracing::warn!(error = %e, "Failed to write .gitignore");
            }
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize git repository, continuing without one");
            false
        }
    }
}

/// Check if a project is already initialized with foundry.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(FOUNDRY_DIR).is_dir()
}
