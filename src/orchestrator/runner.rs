//! The top-level control loop.
//!
//! Each iteration re-derives the next stage from durable artifacts, runs its
//! worker under the retry policy, and records progress in `ProjectState`. A
//! finished pipeline is packaged once; an unrecoverable stage failure leaves
//! an escalation artifact and halts the loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::Instrument;

use super::dispatcher::{Dispatcher, Stage};
use super::retry::{RetryExecutor, RetryPolicy, Retryable};
use super::state::{PHASE_COMPLETED, ProjectState, StateManager};
use crate::config::Config;
use crate::errors::{OrchestratorError, StageError, StoreError};
use crate::package::{Packager, TarGzPackager};
use crate::signals::{FsSignalStore, Signal, SignalStore};
use crate::stages::{StageContext, StageRegistry, load_stage_rules, run_stage};

pub const DEFAULT_MAX_STAGE_RUNS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Escalated,
    Completed,
}

/// Outcome of a run that reached the end of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Stages executed by this run, in order
    pub stages_run: Vec<Stage>,
    pub archive: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on stage executions in one run
    pub max_stage_runs: u32,
    pub stage_timeouts: HashMap<Stage, Duration>,
    pub rules_dir: PathBuf,
    pub description_file: Option<PathBuf>,
}

impl OrchestratorSettings {
    pub fn for_project(project_dir: &Path) -> Self {
        Self {
            max_stage_runs: DEFAULT_MAX_STAGE_RUNS,
            stage_timeouts: HashMap::new(),
            rules_dir: project_dir.join("rules"),
            description_file: None,
        }
    }
}

pub struct Orchestrator {
    project_dir: PathBuf,
    store: FsSignalStore,
    state: StateManager,
    retry: RetryExecutor,
    registry: StageRegistry,
    packager: Box<dyn Packager>,
    settings: OrchestratorSettings,
    status: RunStatus,
    span: tracing::Span,
}

impl Orchestrator {
    /// Orchestrator over `project_dir` with built-in workers and the default retry policy.
    pub fn new(project_dir: &Path, state: StateManager, packager: Box<dyn Packager>) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            store: FsSignalStore::for_project(project_dir),
            state,
            retry: RetryExecutor::new(RetryPolicy::default()),
            registry: StageRegistry::builtin(),
            packager,
            settings: OrchestratorSettings::for_project(project_dir),
            status: RunStatus::Running,
            span: tracing::Span::none(),
        }
    }

    /// Wire an orchestrator from resolved project configuration.
    pub fn from_config(config: &Config) -> Result<Self, OrchestratorError> {
        let registry = StageRegistry::from_config(&config.toml.stages)?;
        let packager = TarGzPackager::new(config.archive_path())
            .with_excludes(config.toml.packaging.exclude.iter().cloned());

        let mut settings = OrchestratorSettings::for_project(&config.project_dir);
        settings.max_stage_runs = config.max_stage_runs();
        settings.rules_dir = config.rules_dir.clone();
        settings.description_file = config.description_file();
        for stage in Stage::ALL {
            if let Some(timeout) = config.stage_timeout(stage) {
                settings.stage_timeouts.insert(stage, timeout);
            }
        }

        Ok(Self::new(
            &config.project_dir,
            StateManager::new(config.state_file.clone()),
            Box::new(packager),
        )
        .with_registry(registry)
        .with_retry_policy(config.retry_policy())
        .with_settings(settings))
    }

    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Logging context the run executes in. Stage spans are its children.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn state(&self) -> &ProjectState {
        self.state.state()
    }

    pub fn store(&self) -> &FsSignalStore {
        &self.store
    }

    /// Next stage to run, or `None` when the pipeline is finished.
    ///
    /// The dispatcher cannot tell "never started" from "finished" on an empty
    /// store; the persisted phase and `AUDIT_PASSED` settle it here.
    pub fn next_stage(&self) -> Result<Option<Stage>, StoreError> {
        if let Some(stage) = Dispatcher::next_stage(&self.store)? {
            return Ok(Some(stage));
        }
        if self.store.signal_exists(Signal::AuditPassed) || self.state.state().is_completed() {
            Ok(None)
        } else {
            Ok(Some(Stage::Planning))
        }
    }

    /// Drive the pipeline until it completes or halts.
    pub async fn run(&mut self) -> Result<RunSummary, OrchestratorError> {
        let span = self.span.clone();
        self.drive().instrument(span).await
    }

    async fn drive(&mut self) -> Result<RunSummary, OrchestratorError> {
        self.status = RunStatus::Running;
        self.state.load();
        self.state.stamp("run_started_at")?;
        tracing::info!(
            project = %self.project_dir.display(),
            phase = %self.state.state().current_phase,
            "Starting pipeline run"
        );

        let mut summary = RunSummary::default();
        let mut runs = 0u32;

        loop {
            let Some(stage) = self.next_stage()? else {
                return self.complete(summary);
            };

            if runs >= self.settings.max_stage_runs {
                let err = OrchestratorError::Stalled {
                    stage: stage.to_string(),
                    runs,
                };
                self.escalate(&err)?;
                return Err(err);
            }
            runs += 1;

            self.execute_stage(stage).await?;
            summary.stages_run.push(stage);
        }
    }

    async fn execute_stage(&mut self, stage: Stage) -> Result<(), OrchestratorError> {
        if stage == Stage::Planning && self.store.has_pending_work_items()? {
            let revoked = self.store.remove_signals(&stage.downstream_signals())?;
            if !revoked.is_empty() {
                tracing::info!(?revoked, "Work items pending, reopening pipeline");
            }
        }

        self.state.set_phase(stage.executing_phase())?;

        let worker = match self.registry.create(stage.as_str()) {
            Ok(worker) => worker,
            Err(err) => {
                self.state.record_error(err.to_string())?;
                return Err(err);
            }
        };

        let ctx = match self.context_for(stage) {
            Ok(ctx) => ctx,
            Err(source) => {
                let err = OrchestratorError::StageFailed {
                    stage: stage.to_string(),
                    source,
                };
                self.escalate(&err)?;
                return Err(err);
            }
        };

        let timeout = self.settings.stage_timeouts.get(&stage).copied();
        let max_attempts = self.retry.policy().max_attempts;
        let attempts = AtomicU32::new(0);

        let result = {
            let worker = worker.as_ref();
            let ctx = &ctx;
            let attempts = &attempts;
            self.retry
                .execute(move || {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        tracing::info!(parent: &ctx.span, attempt, max_attempts, "Running stage");
                        run_stage(worker, ctx, timeout).await
                    }
                })
                .await
        };

        match result {
            Ok(()) => {
                self.state.mark_task_complete(stage.as_str())?;
                tracing::info!(parent: &ctx.span, "Stage complete");
                Ok(())
            }
            Err(source) => {
                let err = if source.is_retryable() {
                    OrchestratorError::RetriesExhausted {
                        stage: stage.to_string(),
                        attempts: attempts.load(Ordering::SeqCst),
                        source,
                    }
                } else {
                    OrchestratorError::StageFailed {
                        stage: stage.to_string(),
                        source,
                    }
                };
                self.escalate(&err)?;
                Err(err)
            }
        }
    }

    fn context_for(&self, stage: Stage) -> Result<StageContext, StageError> {
        let (rules_file, rules) = match load_stage_rules(&self.settings.rules_dir, stage)
            .map_err(StageError::fatal)?
        {
            Some((path, content)) => (Some(path), Some(content)),
            None => (None, None),
        };

        Ok(StageContext {
            stage,
            project_dir: self.project_dir.clone(),
            store: self.store.clone(),
            rules,
            rules_file,
            description_file: self.settings.description_file.clone(),
            span: tracing::info_span!(parent: &self.span, "stage", stage = %stage),
        })
    }

    fn complete(&mut self, mut summary: RunSummary) -> Result<RunSummary, OrchestratorError> {
        // Must go before packaging so the archive never carries it.
        if self.store.remove_escalation()? {
            tracing::info!("Cleared escalation left by an earlier run");
        }
        tracing::info!("Pipeline finished, packaging project");

        let archive = match self.packager.package(&self.project_dir) {
            Ok(path) => path,
            Err(source) => {
                let err = OrchestratorError::Packaging(source);
                self.state.record_error(err.to_string())?;
                return Err(err);
            }
        };

        self.state.set_phase(PHASE_COMPLETED)?;
        self.state
            .add_metadata("archive", archive.display().to_string())?;
        self.status = RunStatus::Completed;

        tracing::info!(
            archive = %archive.display(),
            stages_run = summary.stages_run.len(),
            "Pipeline complete"
        );
        summary.archive = Some(archive);
        Ok(summary)
    }

    /// Record the failure and write the escalation artifact, at most once per run.
    fn escalate(&mut self, err: &OrchestratorError) -> Result<(), OrchestratorError> {
        self.state.record_error(err.to_string())?;
        if self.status == RunStatus::Escalated {
            return Ok(());
        }

        self.state.stamp("escalated_at")?;
        let detail = format!(
            "{}\n\nPhase: {}\n",
            err,
            self.state.state().current_phase
        );
        let path = self.store.write_escalation(&detail)?;
        self.status = RunStatus::Escalated;

        tracing::error!(
            error = %err,
            path = %path.display(),
            "Escalated to human assistance"
        );
        Ok(())
    }
}
