//! Signal and work-item types.
//!
//! Defines the fixed signal vocabulary the dispatcher understands and the
//! remediation records the audit stage leaves behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named marker artifact whose presence means "prior stage finished".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    AuditPassed,
    ImplementationComplete,
    PlanningComplete,
}

impl Signal {
    /// Dispatch precedence, highest first.
    pub const PRECEDENCE: [Signal; 3] = [
        Signal::AuditPassed,
        Signal::ImplementationComplete,
        Signal::PlanningComplete,
    ];

    /// File name of this signal inside the signals directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Signal::AuditPassed => "PROJECT_AUDIT_PASSED.md",
            Signal::ImplementationComplete => "IMPLEMENTATION_COMPLETE.md",
            Signal::PlanningComplete => "PLANNING_COMPLETE.md",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Signal::AuditPassed => "Project Audit Passed",
            Signal::ImplementationComplete => "Implementation Complete",
            Signal::PlanningComplete => "Planning Complete",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::AuditPassed => write!(f, "AUDIT_PASSED"),
            Signal::ImplementationComplete => write!(f, "IMPLEMENTATION_COMPLETE"),
            Signal::PlanningComplete => write!(f, "PLANNING_COMPLETE"),
        }
    }
}

/// Lifecycle of a remediation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A discrete remediation task created when an audit fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub status: WorkItemStatus,
    #[serde(default)]
    pub retry_count: u32,
    /// When the item was recorded (absent in hand-written items)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Create a new pending work item with a fresh id.
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            status: WorkItemStatus::Pending,
            retry_count: 0,
            created_at: Some(Utc::now()),
        }
    }

    /// File name of this item inside the work-items directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert_eq!(Signal::PRECEDENCE[0], Signal::AuditPassed);
        assert_eq!(Signal::PRECEDENCE[1], Signal::ImplementationComplete);
        assert_eq!(Signal::PRECEDENCE[2], Signal::PlanningComplete);
    }

    #[test]
    fn test_signal_file_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Signal::PRECEDENCE.iter().map(|s| s.file_name()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(Signal::AuditPassed.file_name(), "PROJECT_AUDIT_PASSED.md");
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::AuditPassed.to_string(), "AUDIT_PASSED");
        assert_eq!(
            Signal::ImplementationComplete.to_string(),
            "IMPLEMENTATION_COMPLETE"
        );
    }

    #[test]
    fn test_work_item_pending_defaults() {
        let item = WorkItem::pending("fix failing test");
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert!(!item.id.is_empty());
        assert_eq!(item.file_name(), format!("{}.json", item.id));
    }

    #[test]
    fn test_work_item_parses_minimal_json() {
        let json = r#"{"id": "w1", "description": "tighten validation"}"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, "w1");
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert!(item.created_at.is_none());
    }

    #[test]
    fn test_work_item_status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkItemStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
