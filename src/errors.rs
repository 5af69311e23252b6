//! Typed error hierarchy for the Foundry orchestrator.
//!
//! Four enums cover the four subsystems:
//! - `StageError`: a single stage-worker attempt failed
//! - `OrchestratorError`: the control loop halted
//! - `StateError`: the project state could not be persisted
//! - `StoreError`: the signal / work-item store could not be read or written

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::retry::Retryable;

/// Failure of one stage-worker attempt.
#[derive(Debug, Error)]
pub enum StageError {
    /// Any ordinary worker failure. Retried up to the attempt budget.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),

    /// A failure no retry can fix (missing binary, bad configuration).
    #[error("{0:#}")]
    Fatal(anyhow::Error),

    #[error("Stage attempt timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
}

impl StageError {
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        StageError::Fatal(err.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StageError::Transient(anyhow::anyhow!(message.into()))
    }
}

impl Retryable for StageError {
    fn is_retryable(&self) -> bool {
        !matches!(self, StageError::Fatal(_))
    }
}

/// Errors that halt the orchestrator loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{stage} stage failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        stage: String,
        attempts: u32,
        #[source]
        source: StageError,
    },

    #[error("{stage} stage failed with a non-retryable error: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Pipeline stalled: {runs} stage runs without finishing (last stage: {stage})")]
    Stalled { stage: String, runs: u32 },

    #[error("No worker registered for stage '{0}'")]
    UnknownStage(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Packaging failed: {0:#}")]
    Packaging(#[source] anyhow::Error),
}

impl OrchestratorError {
    /// Whether this failure produced (or should produce) an escalation artifact.
    pub fn is_escalation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::RetriesExhausted { .. }
                | OrchestratorError::StageFailed { .. }
                | OrchestratorError::Stalled { .. }
        )
    }
}

/// Failure to durably persist `ProjectState`. Always fatal.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to write state file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize project state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the directory-backed signal store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Signal store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed work item at {path}: {source}")]
    MalformedWorkItem {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
