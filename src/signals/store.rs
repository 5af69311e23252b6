//! Directory-backed signal and work-item store.
//!
//! Signals are files in `signals/`; work items are JSON files in `work_items/`.
//! The store enforces nothing beyond "a name either exists or not".

use std::fs;
use std::path::{Path, PathBuf};

use super::types::{Signal, WorkItem};
use crate::errors::StoreError;

/// File name of the human-assistance escalation artifact.
pub const ESCALATION_FILE: &str = "NEEDS_ASSISTANCE.md";

/// Read side of the artifact store. Reads have no side effects.
pub trait SignalStore {
    fn signal_exists(&self, signal: Signal) -> bool;

    /// True iff the work-item collection is non-empty.
    fn has_pending_work_items(&self) -> Result<bool, StoreError>;

    fn list_work_items(&self) -> Result<Vec<WorkItem>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct FsSignalStore {
    signals_dir: PathBuf,
    work_items_dir: PathBuf,
}

impl FsSignalStore {
    pub fn new(signals_dir: PathBuf, work_items_dir: PathBuf) -> Self {
        Self {
            signals_dir,
            work_items_dir,
        }
    }

    /// Store rooted at a project directory (`signals/` and `work_items/`).
    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join("signals"), project_dir.join("work_items"))
    }

    pub fn signals_dir(&self) -> &Path {
        &self.signals_dir
    }

    pub fn work_items_dir(&self) -> &Path {
        &self.work_items_dir
    }

    pub fn signal_path(&self, signal: Signal) -> PathBuf {
        self.signals_dir.join(signal.file_name())
    }

    pub fn escalation_path(&self) -> PathBuf {
        self.signals_dir.join(ESCALATION_FILE)
    }

    /// Create (or overwrite) a signal with a markdown body.
    pub fn write_signal(&self, signal: Signal, body: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.signals_dir)
            .map_err(|e| StoreError::io(&self.signals_dir, e))?;
        let path = self.signal_path(signal);
        let content = format!("# {}\n\n{}", signal.title(), body);
        fs::write(&path, content).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Remove a signal. Removing an absent signal is not an error.
    pub fn remove_signal(&self, signal: Signal) -> Result<bool, StoreError> {
        let path = self.signal_path(signal);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Remove several signals, returning the ones that were present.
    pub fn remove_signals(&self, signals: &[Signal]) -> Result<Vec<Signal>, StoreError> {
        let mut removed = Vec::new();
        for &signal in signals {
            if self.remove_signal(signal)? {
                removed.push(signal);
            }
        }
        Ok(removed)
    }

    pub fn add_work_item(&self, item: &WorkItem) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.work_items_dir)
            .map_err(|e| StoreError::io(&self.work_items_dir, e))?;
        let path = self.work_items_dir.join(item.file_name());
        let json = serde_json::to_string_pretty(item).map_err(|source| {
            StoreError::MalformedWorkItem {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Delete every work item, returning how many were removed.
    pub fn clear_work_items(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in self.work_item_paths()? {
            fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Write the escalation artifact, replacing any previous one.
    pub fn write_escalation(&self, detail: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.signals_dir)
            .map_err(|e| StoreError::io(&self.signals_dir, e))?;
        let path = self.escalation_path();
        let content = format!("# Assistance Required\n\n## Error Details\n{}\n", detail);
        fs::write(&path, content).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    pub fn escalation_exists(&self) -> bool {
        self.escalation_path().is_file()
    }

    pub fn remove_escalation(&self) -> Result<bool, StoreError> {
        let path = self.escalation_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Non-hidden files in the work-items directory, sorted by name.
    fn work_item_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.work_items_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.work_items_dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.work_items_dir, e))?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if path.is_file() && !hidden {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl SignalStore for FsSignalStore {
    fn signal_exists(&self, signal: Signal) -> bool {
        self.signal_path(signal).is_file()
    }

    fn has_pending_work_items(&self) -> Result<bool, StoreError> {
        Ok(!self.work_item_paths()?.is_empty())
    }

    fn list_work_items(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.work_item_paths()?
            .into_iter()
            .map(|path| {
                let content = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                serde_json::from_str(&content)
                    .map_err(|source| StoreError::MalformedWorkItem { path, source })
            })
            .collect()
    }
}
