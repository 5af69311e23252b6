//! Stage workers: the collaborators the orchestrator invokes.
//!
//! A worker is invoked with a [`StageContext`], signals completion by mutating
//! the artifact store before returning `Ok(())`, and signals failure by
//! returning a [`StageError`]. What a worker does internally is its own business.
//!
//! | Worker          | Selected when                                   |
//! |-----------------|-------------------------------------------------|
//! | `MarkerWorker`  | default for every stage                         |
//! | `CommandWorker` | `[stages.<name>] command = "..."` in foundry.toml |

mod command;
mod marker;
mod rules;

pub use command::CommandWorker;
pub use marker::MarkerWorker;
pub use rules::{load_stage_rules, rules_path};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Instrument;

use crate::errors::{OrchestratorError, StageError};
use crate::foundry_config::StageConfig;
use crate::orchestrator::Stage;
use crate::signals::FsSignalStore;

/// Everything a worker gets to see for one invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub stage: Stage,
    pub project_dir: PathBuf,
    pub store: FsSignalStore,
    /// Contents of `rules/rules-<slug>.md`, if present
    pub rules: Option<String>,
    pub rules_file: Option<PathBuf>,
    /// Application description the pipeline is building, if provided
    pub description_file: Option<PathBuf>,
    /// Logging context for this invocation
    pub span: tracing::Span,
}

#[async_trait]
pub trait StageWorker: Send + Sync {
    async fn execute(&self, ctx: &StageContext) -> Result<(), StageError>;
}

/// Run one attempt of `worker` inside the context span, bounded by `timeout`.
pub async fn run_stage(
    worker: &dyn StageWorker,
    ctx: &StageContext,
    timeout: Option<Duration>,
) -> Result<(), StageError> {
    let attempt = worker.execute(ctx).instrument(ctx.span.clone());
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(StageError::TimedOut { timeout: limit }),
        },
        None => attempt.await,
    }
}

pub type WorkerFactory = Box<dyn Fn() -> Box<dyn StageWorker> + Send + Sync>;

/// Name → constructor table for stage workers.
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<String, WorkerFactory>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in marker worker for every stage.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for stage in Stage::ALL {
            registry.register(stage.as_str(), move || {
                Box::new(MarkerWorker::new(stage)) as Box<dyn StageWorker>
            });
        }
        registry
    }

    /// Built-in workers, replaced by a `CommandWorker` wherever a command is configured.
    pub fn from_config(stages: &HashMap<String, StageConfig>) -> Result<Self, OrchestratorError> {
        let mut registry = Self::builtin();
        for (name, settings) in stages {
            let stage: Stage = name.parse()?;
            if let Some(command) = settings.command.clone() {
                registry.register(stage.as_str(), move || {
                    Box::new(CommandWorker::new(command.clone())) as Box<dyn StageWorker>
                });
            }
        }
        Ok(registry)
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn StageWorker> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn StageWorker>, OrchestratorError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| OrchestratorError::UnknownStage(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct SlowWorker;

    #[async_trait]
    impl StageWorker for SlowWorker {
        async fn execute(&self, _ctx: &StageContext) -> Result<(), StageError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    pub(crate) fn context_for(stage: Stage, project_dir: &std::path::Path) -> StageContext {
        StageContext {
            stage,
            project_dir: project_dir.to_path_buf(),
            store: FsSignalStore::for_project(project_dir),
            rules: None,
            rules_file: None,
            description_file: None,
            span: tracing::Span::none(),
        }
    }

    #[test]
    fn test_builtin_registry_covers_every_stage() {
        let registry = StageRegistry::builtin();
        for stage in Stage::ALL {
            assert!(registry.contains(stage.as_str()));
            assert!(registry.create(stage.as_str()).is_ok());
        }
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let registry = StageRegistry::builtin();
        let err = registry.create("deploying").err().unwrap();
        assert!(matches!(err, OrchestratorError::UnknownStage(ref s) if s == "deploying"));
    }

    #[test]
    fn test_from_config_rejects_unknown_stage_names() {
        let mut stages = HashMap::new();
        stages.insert("deploying".to_string(), StageConfig::default());
        assert!(matches!(
            StageRegistry::from_config(&stages),
            Err(OrchestratorError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_from_config_accepts_slugs() {
        let mut stages = HashMap::new();
        stages.insert(
            "developer".to_string(),
            StageConfig {
                command: Some("true".to_string()),
                timeout_secs: None,
            },
        );
        let registry = StageRegistry::from_config(&stages).unwrap();
        assert!(registry.contains("developing"));
    }

    #[tokio::test]
    async fn test_run_stage_times_out() {
        let dir = tempdir().unwrap();
        let ctx = context_for(Stage::Developing, dir.path());
        let err = run_stage(&SlowWorker, &ctx, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_run_stage_without_timeout_runs_worker() {
        let dir = tempdir().unwrap();
        let ctx = context_for(Stage::Developing, dir.path());
        run_stage(&MarkerWorker::new(Stage::Developing), &ctx, None)
            .await
            .unwrap();
        assert!(dir.path().join("signals/IMPLEMENTATION_COMPLETE.md").exists());
    }
}
