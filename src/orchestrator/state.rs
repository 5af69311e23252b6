use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::StateError;

/// Phase of a project that has never run.
pub const PHASE_INITIALIZED: &str = "initialized";
/// Phase persisted once the pipeline finished and was packaged.
pub const PHASE_COMPLETED: &str = "completed";

/// Durable record of pipeline progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default = "default_phase")]
    pub current_phase: String,
    #[serde(default)]
    pub completed_tasks: BTreeMap<String, bool>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_phase() -> String {
    PHASE_INITIALIZED.to_string()
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            current_phase: default_phase(),
            completed_tasks: BTreeMap::new(),
            last_error: None,
            metadata: BTreeMap::new(),
        }
    }
}

impl ProjectState {
    pub fn is_completed(&self) -> bool {
        self.current_phase == PHASE_COMPLETED
    }

    pub fn is_task_complete(&self, task: &str) -> bool {
        self.completed_tasks.get(task).copied().unwrap_or(false)
    }
}

/// Owns the single `ProjectState` of a project. Every mutator persists before returning.
pub struct StateManager {
    state_file: PathBuf,
    state: ProjectState,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        Self {
            state_file,
            state: ProjectState::default(),
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    /// Load the persisted state.
    ///
    /// A missing file yields the default state without creating anything. An
    /// unreadable or corrupt file is reported, moved aside to `<file>.corrupt`,
    /// and the default state is used instead.
    pub fn load(&mut self) -> &ProjectState {
        self.state = match self.read_state() {
            Ok(Some(state)) => state,
            Ok(None) => ProjectState::default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.state_file.display(),
                    error = %e,
                    "Failed to load project state, starting from defaults"
                );
                self.quarantine_corrupt_file();
                ProjectState::default()
            }
        };
        &self.state
    }

    /// Like [`load`](Self::load), but leaves an unreadable file where it is.
    pub fn load_readonly(&mut self) -> &ProjectState {
        self.state = match self.read_state() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.state_file.display(),
                    error = %e,
                    "Failed to read project state"
                );
                ProjectState::default()
            }
        };
        &self.state
    }

    fn read_state(&self) -> anyhow::Result<Option<ProjectState>> {
        if !self.state_file.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.state_file)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn quarantine_corrupt_file(&self) {
        let corrupt = self.state_file.with_extension("json.corrupt");
        if let Err(e) = fs::rename(&self.state_file, &corrupt) {
            tracing::warn!(error = %e, "Could not move corrupt state file aside");
        }
    }

    /// Write the full state atomically: temp file, fsync, rename.
    pub fn save(&self) -> Result<(), StateError> {
        self.write(&self.state)
    }

    fn write(&self, state: &ProjectState) -> Result<(), StateError> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: self.state_file.clone(),
            source,
        };

        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let temp_path = self.state_file.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path).map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&temp_path, &self.state_file).map_err(io_err)?;

        tracing::debug!(phase = %state.current_phase, "Project state saved");
        Ok(())
    }

    /// Apply `change` to a copy and adopt it only once it is on disk.
    fn update(&mut self, change: impl FnOnce(&mut ProjectState)) -> Result<(), StateError> {
        let mut next = self.state.clone();
        change(&mut next);
        self.write(&next)?;
        self.state = next;
        Ok(())
    }

    pub fn mark_task_complete(&mut self, task: &str) -> Result<(), StateError> {
        self.update(|state| {
            state.completed_tasks.insert(task.to_string(), true);
        })
    }

    pub fn set_phase(&mut self, phase: impl Into<String>) -> Result<(), StateError> {
        let phase = phase.into();
        self.update(|state| state.current_phase = phase)
    }

    pub fn record_error(&mut self, message: impl Into<String>) -> Result<(), StateError> {
        let message = message.into();
        self.update(|state| state.last_error = Some(message))
    }

    pub fn add_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Result<(), StateError> {
        let (key, value) = (key.into(), value.into());
        self.update(|state| {
            state.metadata.insert(key, value);
        })
    }

    /// Record the current time under `key` as RFC 3339.
    pub fn stamp(&mut self, key: &str) -> Result<(), StateError> {
        self.add_metadata(key, Utc::now().to_rfc3339())
    }

    /// Forget all progress: remove the file and return to the default state.
    pub fn reset(&mut self) -> Result<(), StateError> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).map_err(|source| StateError::Io {
                path: self.state_file.clone(),
                source,
            })?;
        }
        self.state = ProjectState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_manager() -> (StateManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".foundry/project_state.json");
        (StateManager::new(path), dir)
    }

    fn read_back(path: &Path) -> ProjectState {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_load_missing_returns_default_without_creating_file() {
        let (mut mgr, _dir) = make_manager();
        let state = mgr.load().clone();
        assert_eq!(state, ProjectState::default());
        assert_eq!(state.current_phase, "initialized");
        assert!(!mgr.state_file().exists());
    }

    #[test]
    fn test_save_creates_file_and_parent() {
        let (mut mgr, _dir) = make_manager();
        mgr.set_phase("testing").unwrap();
        assert!(mgr.state_file().exists());
        assert_eq!(read_back(mgr.state_file()).current_phase, "testing");
        assert!(!mgr.state_file().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_every_mutator_persists_immediately() {
        let (mut mgr, _dir) = make_manager();

        mgr.mark_task_complete("planning").unwrap();
        assert!(read_back(mgr.state_file()).is_task_complete("planning"));

        mgr.record_error("developer timed out").unwrap();
        assert_eq!(
            read_back(mgr.state_file()).last_error.as_deref(),
            Some("developer timed out")
        );

        mgr.add_metadata("archive", "output/project.tar.gz").unwrap();
        assert_eq!(
            read_back(mgr.state_file()).metadata["archive"],
            serde_json::json!("output/project.tar.gz")
        );
    }

    #[test]
    fn test_recovery_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project_state.json");

        {
            let mut mgr = StateManager::new(path.clone());
            mgr.load();
            mgr.mark_task_complete("planning").unwrap();
            mgr.set_phase("executing_developing").unwrap();
        }

        {
            let mut mgr = StateManager::new(path.clone());
            let state = mgr.load();
            assert_eq!(state.current_phase, "executing_developing");
            assert!(state.is_task_complete("planning"));
            assert!(!state.is_task_complete("developing"));
        }
    }

    #[test]
    fn test_corrupt_file_degrades_to_default_and_is_moved_aside() {
        let (mut mgr, _dir) = make_manager();
        fs::create_dir_all(mgr.state_file().parent().unwrap()).unwrap();
        fs::write(mgr.state_file(), "{ not json").unwrap();

        let state = mgr.load().clone();
        assert_eq!(state, ProjectState::default());
        assert!(!mgr.state_file().exists());
        assert!(mgr.state_file().with_extension("json.corrupt").exists());
    }

    #[test]
    fn test_load_readonly_leaves_corrupt_file_in_place() {
        let (mut mgr, _dir) = make_manager();
        fs::create_dir_all(mgr.state_file().parent().unwrap()).unwrap();
        fs::write(mgr.state_file(), "{ not json").unwrap();

        assert_eq!(mgr.load_readonly(), &ProjectState::default());
        assert!(mgr.state_file().exists());
        assert!(!mgr.state_file().with_extension("json.corrupt").exists());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let (mut mgr, _dir) = make_manager();
        fs::create_dir_all(mgr.state_file().parent().unwrap()).unwrap();
        fs::write(mgr.state_file(), r#"{"current_phase": "executing_auditing"}"#).unwrap();

        let state = mgr.load();
        assert_eq!(state.current_phase, "executing_auditing");
        assert!(state.completed_tasks.is_empty());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_save_failure_propagates() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file in the way").unwrap();
        let mut mgr = StateManager::new(blocker.join("project_state.json"));

        let err = mgr.set_phase("executing_planning").unwrap_err();
        assert!(matches!(err, StateError::Io { .. }));
        assert_eq!(mgr.state(), &ProjectState::default());

        mgr.record_error("planner crashed").unwrap_err();
        mgr.mark_task_complete("planning").unwrap_err();
        assert!(mgr.state().last_error.is_none());
        assert!(!mgr.state().is_task_complete("planning"));
    }

    #[test]
    fn test_reset_removes_file() {
        let (mut mgr, _dir) = make_manager();
        mgr.set_phase(PHASE_COMPLETED).unwrap();
        assert!(mgr.state().is_completed());
        mgr.reset().unwrap();
        assert!(!mgr.state_file().exists());
        assert_eq!(mgr.state(), &ProjectState::default());
    }
}
