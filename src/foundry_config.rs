//! Project configuration read from `foundry.toml`.
//!
//! The file may live at the project root or inside `.foundry/`; the root copy
//! wins when both exist. Every section is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "demo"
//!
//! [retry]
//! max_attempts = 3
//! delay_ms = 1000
//!
//! [orchestrator]
//! max_stage_runs = 20
//!
//! [stages.developing]
//! command = "./scripts/develop.sh"
//! timeout_secs = 600
//!
//! [packaging]
//! output_dir = "output"
//! archive_name = "project.tar.gz"
//! exclude = ["node_modules"]
//!
//! [logging]
//! json_file = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::orchestrator::runner::DEFAULT_MAX_STAGE_RUNS;
use crate::orchestrator::Stage;

pub const CONFIG_FILE_NAME: &str = "foundry.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    /// Upper bound on stage executions in a single run
    #[serde(default = "default_max_stage_runs")]
    pub max_stage_runs: u32,
}

fn default_max_stage_runs() -> u32 {
    DEFAULT_MAX_STAGE_RUNS
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_stage_runs: default_max_stage_runs(),
        }
    }
}

/// Per-stage settings under `[stages.<name>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    /// Shell command replacing the built-in worker
    #[serde(default)]
    pub command: Option<String>,
    /// Per-attempt timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StageConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    /// Entry names excluded in addition to the built-in list
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_archive_name() -> String {
    "project.tar.gz".to_string()
}

impl Default for PackagingSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            archive_name: default_archive_name(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Write JSON-lines logs to `.foundry/logs/foundry.log`
    #[serde(default = "default_json_file")]
    pub json_file: bool,
}

fn default_json_file() -> bool {
    true
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            json_file: default_json_file(),
        }
    }
}

/// The complete foundry.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FoundryToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    /// Stage overrides keyed by stage name (`planning`) or slug (`planner`)
    #[serde(default)]
    pub stages: HashMap<String, StageConfig>,
    #[serde(default)]
    pub packaging: PackagingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl FoundryToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse foundry.toml")
    }

    /// Where the config file of a project lives, if it has one.
    pub fn locate(project_dir: &Path) -> Option<PathBuf> {
        [
            project_dir.join(CONFIG_FILE_NAME),
            project_dir.join(".foundry").join(CONFIG_FILE_NAME),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }

    /// Load the project's configuration, or defaults if it has none.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        match Self::locate(project_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize foundry.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Settings for a stage, looked up by name or slug.
    pub fn stage(&self, stage: Stage) -> Option<&StageConfig> {
        self.stages
            .get(stage.as_str())
            .or_else(|| self.stages.get(stage.slug()))
    }

    pub fn stage_timeout(&self, stage: Stage) -> Option<Duration> {
        self.stage(stage).and_then(StageConfig::timeout)
    }

    /// Validate the configuration and return every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.retry.max_attempts < 1 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.orchestrator.max_stage_runs < 1 {
            errors.push("orchestrator.max_stage_runs must be at least 1".to_string());
        }
        for (name, settings) in &self.stages {
            if name.parse::<Stage>().is_err() {
                errors.push(format!(
                    "Unknown stage '{}' in [stages]. Valid stages: planning, developing, auditing",
                    name
                ));
            }
            if settings.timeout_secs == Some(0) {
                errors.push(format!("stages.{}.timeout_secs must be at least 1", name));
            }
            if settings.command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                errors.push(format!("stages.{}.command is empty", name));
            }
        }
        if self.packaging.archive_name.trim().is_empty() {
            errors.push("packaging.archive_name must not be empty".to_string());
        }

        errors
    }
}

/// Commented template written by `foundry init`.
pub fn default_toml(project_name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"

[retry]
max_attempts = {attempts}
delay_ms = {delay}

[orchestrator]
max_stage_runs = {runs}

# Replace a built-in stage worker with a shell command:
# [stages.developing]
# command = "./scripts/develop.sh"
# timeout_secs = 600

[packaging]
output_dir = "output"
archive_name = "project.tar.gz"
exclude = []

[logging]
json_file = true
"#,
        name = project_name,
        attempts = default_max_attempts(),
        delay = default_delay_ms(),
        runs = default_max_stage_runs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FoundryToml::parse("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.orchestrator.max_stage_runs, DEFAULT_MAX_STAGE_RUNS);
        assert_eq!(config.packaging.output_dir, "output");
        assert_eq!(config.packaging.archive_name, "project.tar.gz");
        assert!(config.logging.json_file);
        assert!(config.stages.is_empty());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config = FoundryToml::parse(
            r#"
            [project]
            name = "demo"
            [retry]
            max_attempts = 5
            delay_ms = 10
            [orchestrator]
            max_stage_runs = 7
            [stages.developing]
            command = "make build"
            timeout_secs = 30
            [stages.auditor]
            command = "make test"
            [packaging]
            exclude = ["node_modules"]
            [logging]
            json_file = false
            "#,
        )
        .unwrap();

        assert_eq!(config.project.name.as_deref(), Some("demo"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.orchestrator.max_stage_runs, 7);
        assert_eq!(
            config.stage_timeout(Stage::Developing),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            config.stage(Stage::Auditing).unwrap().command.as_deref(),
            Some("make test")
        );
        assert!(config.stage(Stage::Planning).is_none());
        assert_eq!(config.packaging.exclude, vec!["node_modules".to_string()]);
        assert!(!config.logging.json_file);
    }

    #[test]
    fn test_validate_rejects_zero_attempts_and_runs() {
        let config =
            FoundryToml::parse("[retry]\nmax_attempts = 0\n[orchestrator]\nmax_stage_runs = 0\n")
                .unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("max_attempts"));
        assert!(errors[1].contains("max_stage_runs"));
    }

    #[test]
    fn test_validate_rejects_unknown_stage() {
        let config = FoundryToml::parse("[stages.deploying]\ncommand = \"true\"\n").unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Unknown stage 'deploying'"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = FoundryToml::parse("[retry\nmax_attempts = ").unwrap_err();
        assert!(err.to_string().contains("Failed to parse foundry.toml"));
    }

    #[test]
    fn test_load_or_default_prefers_root_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".foundry")).unwrap();
        std::fs::write(
            dir.path().join(".foundry/foundry.toml"),
            "[retry]\nmax_attempts = 9\n",
        )
        .unwrap();
        let config = FoundryToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 9);

        std::fs::write(dir.path().join("foundry.toml"), "[retry]\nmax_attempts = 4\n").unwrap();
        let config = FoundryToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = FoundryToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_default_template_parses() {
        let config = FoundryToml::parse(&default_toml("demo")).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("demo"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foundry.toml");
        let mut config = FoundryToml::default();
        config.retry.max_attempts = 6;
        config.save(&path).unwrap();
        assert_eq!(FoundryToml::load(&path).unwrap().retry.max_attempts, 6);
    }
}
