//! Signal artifacts and work items.
//!
//! This module provides the durable artifact store the pipeline is driven by:
//!
//! - Signals: named marker files (`signals/PLANNING_COMPLETE.md`, ...) whose
//!   presence means the producing stage finished
//! - Work items: JSON remediation records in `work_items/` created by a failed audit
//! - The escalation artifact (`signals/NEEDS_ASSISTANCE.md`)
//!
//! The store holds no business logic; the dispatcher decides what the artifacts mean.

mod store;
mod types;

pub use store::{ESCALATION_FILE, FsSignalStore, SignalStore};
pub use types::{Signal, WorkItem, WorkItemStatus};
