use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundry_config::FoundryToml;
use crate::orchestrator::{RetryPolicy, Stage};

/// Runtime configuration for Foundry.
///
/// Resolves every on-disk location of a project and layers CLI overrides on
/// top of the parsed `foundry.toml`.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub foundry_dir: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub signals_dir: PathBuf,
    pub work_items_dir: PathBuf,
    pub rules_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub verbose: bool,
    /// The parsed foundry.toml (defaults when absent)
    pub toml: FoundryToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let toml = FoundryToml::load_or_default(&project_dir)?;
        Ok(Self::from_parts(project_dir, verbose, toml))
    }

    fn from_parts(project_dir: PathBuf, verbose: bool, toml: FoundryToml) -> Self {
        let foundry_dir = project_dir.join(".foundry");
        Self {
            state_file: foundry_dir.join("project_state.json"),
            log_dir: foundry_dir.join("logs"),
            signals_dir: project_dir.join("signals"),
            work_items_dir: project_dir.join("work_items"),
            rules_dir: project_dir.join("rules"),
            docs_dir: project_dir.join("docs"),
            foundry_dir,
            project_dir,
            verbose,
            toml,
        }
    }

    /// Apply `--max-attempts` / `--retry-delay-ms` on top of the file values.
    pub fn with_retry_overrides(
        mut self,
        max_attempts: Option<u32>,
        retry_delay_ms: Option<u64>,
    ) -> Self {
        if let Some(attempts) = max_attempts {
            self.toml.retry.max_attempts = attempts;
        }
        if let Some(delay) = retry_delay_ms {
            self.toml.retry.delay_ms = delay;
        }
        self
    }

    /// Fail on any configuration problem.
    pub fn validate(&self) -> Result<()> {
        let errors = self.toml.validate();
        if !errors.is_empty() {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.toml.retry.max_attempts,
            Duration::from_millis(self.toml.retry.delay_ms),
        )
    }

    pub fn max_stage_runs(&self) -> u32 {
        self.toml.orchestrator.max_stage_runs
    }

    pub fn stage_timeout(&self, stage: Stage) -> Option<Duration> {
        self.toml.stage_timeout(stage)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.packaging.output_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir().join(&self.toml.packaging.archive_name)
    }

    /// The application description copied in by `foundry init`, if present.
    pub fn description_file(&self) -> Option<PathBuf> {
        let path = self.docs_dir.join("app_description.md");
        path.is_file().then_some(path)
    }

    pub fn project_name(&self) -> String {
        self.toml
            .project
            .name
            .clone()
            .unwrap_or_else(|| dir_name(&self.project_dir))
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.foundry_dir,
            &self.log_dir,
            &self.signals_dir,
            &self.work_items_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}
