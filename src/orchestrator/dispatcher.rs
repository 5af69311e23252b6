//! Stage dispatch derived purely from durable artifacts.
//!
//! Precedence, first match wins:
//!
//! | Artifacts present                    | Next stage   |
//! |--------------------------------------|--------------|
//! | any work item                        | `Planning`   |
//! | `AUDIT_PASSED`                       | none (done)  |
//! | `IMPLEMENTATION_COMPLETE`            | `Auditing`   |
//! | `PLANNING_COMPLETE`                  | `Developing` |
//! | nothing                              | none         |
//!
//! The dispatcher keeps no state, so calling it twice against the same storage
//! always yields the same answer.

use serde::{Deserialize, Serialize};

use crate::errors::{OrchestratorError, StoreError};
use crate::signals::{Signal, SignalStore};

/// One phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Developing,
    Auditing,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Planning, Stage::Developing, Stage::Auditing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Developing => "developing",
            Stage::Auditing => "auditing",
        }
    }

    /// Worker slug, used for rules files (`rules/rules-<slug>.md`).
    pub fn slug(&self) -> &'static str {
        match self {
            Stage::Planning => "planner",
            Stage::Developing => "developer",
            Stage::Auditing => "auditor",
        }
    }

    /// The signal this stage's worker writes when it finishes.
    pub fn completion_signal(&self) -> Signal {
        match self {
            Stage::Planning => Signal::PlanningComplete,
            Stage::Developing => Signal::ImplementationComplete,
            Stage::Auditing => Signal::AuditPassed,
        }
    }

    /// Completion signals of this stage and every later one.
    pub fn downstream_signals(&self) -> Vec<Signal> {
        Stage::ALL
            .iter()
            .filter(|s| *s >= self)
            .map(|s| s.completion_signal())
            .collect()
    }

    /// Persisted phase name while this stage runs.
    pub fn executing_phase(&self) -> String {
        format!("executing_{}", self.as_str())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planning" | "planner" => Ok(Stage::Planning),
            "developing" | "developer" => Ok(Stage::Developing),
            "auditing" | "auditor" => Ok(Stage::Auditing),
            _ => Err(OrchestratorError::UnknownStage(s.to_string())),
        }
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Decide the next stage from the store contents, or `None` when no stage applies.
    pub fn next_stage(store: &impl SignalStore) -> Result<Option<Stage>, StoreError> {
        if store.has_pending_work_items()? {
            return Ok(Some(Stage::Planning));
        }

        for signal in Signal::PRECEDENCE {
            if store.signal_exists(signal) {
                return Ok(match signal {
                    Signal::AuditPassed => None,
                    Signal::ImplementationComplete => Some(Stage::Auditing),
                    Signal::PlanningComplete => Some(Stage::Developing),
                });
            }
        }

        Ok(None)
    }
}
