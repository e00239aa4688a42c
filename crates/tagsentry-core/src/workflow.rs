//! # Remediation & Exemption Workflows
//!
//! A workflow is a tracked request tied to one resource, with an auditable
//! approval lifecycle:
//!
//! ```text
//! PENDING ──approve()──▶ COMPLETED
//!    │
//!    ├──reject()───────▶ REJECTED
//!    │
//!    └──cancel()───────▶ CANCELLED
//! ```
//!
//! `PENDING` is the sole initial state; the other three are terminal.
//! There is no intermediate "approved" state: approval and application
//! happen atomically in one operation, so a workflow is either still
//! awaiting a decision or already finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::issue::IssueSet;
use crate::resource::ResourceId;
use crate::tags::Tags;

/// A workflow identifier, assigned by the workflow store on creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorkflowId(u64);

impl WorkflowId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Access the raw identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of request a workflow tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// A proposed tag fix awaiting approval.
    Remediation,
    /// A request to exempt the resource from evaluation.
    Exemption,
}

impl WorkflowType {
    /// Return the snake_case string value used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remediation => "remediation",
            Self::Exemption => "exemption",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Awaiting a human decision.
    Pending,
    /// Approved and applied (or exemption granted).
    Completed,
    /// Declined; the resource was left untouched.
    Rejected,
    /// Withdrawn before a decision, e.g. superseded by re-evaluation.
    Cancelled,
}

impl WorkflowStatus {
    /// Return the snake_case string value used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether a transition from `self` to `to` is permitted.
    pub fn can_transition_to(&self, to: WorkflowStatus) -> bool {
        matches!(self, Self::Pending) && to.is_terminal()
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload of a workflow.
///
/// The issue snapshot and suggested tags are frozen copies taken at
/// proposal time; later policy edits or deletions do not reach back into
/// an open workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetails {
    /// The findings that motivated the proposal.
    #[serde(default)]
    pub issues: IssueSet,
    /// Tag values suggested to the approver, one per flagged tag.
    #[serde(default)]
    pub suggested_tags: Tags,
    /// The tags actually applied on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_tags: Option<Tags>,
    /// Why the workflow was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Who rejected the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    /// Free-form annotation (exemption justification, supersession note).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WorkflowDetails {
    /// Details for a remediation proposal.
    pub fn remediation(issues: IssueSet, suggested_tags: Tags) -> Self {
        Self {
            issues,
            suggested_tags,
            ..Self::default()
        }
    }

    /// Details for an exemption request.
    pub fn exemption(justification: impl Into<String>) -> Self {
        Self {
            note: Some(justification.into()),
            ..Self::default()
        }
    }
}

/// A tracked remediation or exemption request tied to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Store-assigned identifier.
    pub id: WorkflowId,
    /// The resource this workflow concerns.
    pub resource_id: ResourceId,
    /// Remediation or exemption.
    pub workflow_type: WorkflowType,
    /// Current lifecycle status.
    pub status: WorkflowStatus,
    /// Structured payload.
    pub details: WorkflowDetails,
    /// Who proposed the workflow (`"system"` for evaluation-proposed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Who approved the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// When the workflow was proposed.
    pub created_at: DateTime<Utc>,
    /// When the workflow was last modified.
    pub updated_at: DateTime<Utc>,
    /// When the workflow reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Create a PENDING workflow with the current timestamp.
    pub fn new(
        id: WorkflowId,
        resource_id: ResourceId,
        workflow_type: WorkflowType,
        details: WorkflowDetails,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_id,
            workflow_type,
            status: WorkflowStatus::Pending,
            details,
            created_by,
            approved_by: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether the workflow still awaits a decision.
    pub fn is_open(&self) -> bool {
        self.status == WorkflowStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Rejected.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
    }

    #[test]
    fn transitions_only_leave_pending() {
        for terminal in [
            WorkflowStatus::Completed,
            WorkflowStatus::Rejected,
            WorkflowStatus::Cancelled,
        ] {
            assert!(WorkflowStatus::Pending.can_transition_to(terminal));
            assert!(!terminal.can_transition_to(WorkflowStatus::Pending));
            assert!(!terminal.can_transition_to(WorkflowStatus::Completed));
        }
        assert!(!WorkflowStatus::Pending.can_transition_to(WorkflowStatus::Pending));
    }

    #[test]
    fn new_workflow_is_open() {
        let wf = Workflow::new(
            WorkflowId::new(1),
            ResourceId::new("i-0abc").unwrap(),
            WorkflowType::Remediation,
            WorkflowDetails::default(),
            Some("system".to_string()),
        );
        assert!(wf.is_open());
        assert_eq!(wf.status, WorkflowStatus::Pending);
        assert!(wf.completed_at.is_none());
        assert_eq!(wf.created_at, wf.updated_at);
    }

    #[test]
    fn status_and_type_wire_values() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowType::Exemption).unwrap(),
            "\"exemption\""
        );
    }

    #[test]
    fn details_roundtrip() {
        let details = WorkflowDetails::remediation(
            IssueSet::new(),
            [("owner", "platform-team")].into_iter().collect(),
        );
        let json = serde_json::to_string(&details).unwrap();
        let back: WorkflowDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(back, details);
        assert!(back.applied_tags.is_none());
    }
}
