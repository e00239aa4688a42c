//! # Error Hierarchy
//!
//! Structured error types for the whole workspace, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Each failure class gets its own enum so that callers can match on the
//! category without string inspection: caller-fault input problems
//! ([`ValidationError`]), unknown identities ([`NotFoundError`]), workflow
//! transitions attempted from the wrong state ([`StateError`]), provider
//! API failures ([`ConnectorError`]), and backing-store failures
//! ([`StorageError`]). None of these are retried inside the core — retry
//! policy belongs to the caller or the surrounding scheduler.

use thiserror::Error;

use crate::provider::CloudProvider;

/// Top-level error type for TagSentry.
#[derive(Error, Debug)]
pub enum TagSentryError {
    /// Malformed policy or workflow input — caller's fault, no retry.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown identity — surfaced, no retry.
    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// Workflow not in the state required for the requested transition.
    #[error("invalid state: {0}")]
    InvalidState(#[from] StateError),

    /// Provider API failure.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Backing store unavailable or snapshot serialization failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Validation failures for policy and workflow inputs.
///
/// These carry the invalid input and the expected shape so that operators
/// can diagnose misconfiguration without guesswork.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A policy was submitted without any required-tag rules.
    #[error("policy must declare at least one required-tag rule")]
    NoRequiredTags,

    /// A required-tag rule has an empty name.
    #[error("required-tag rule at position {position} has an empty name")]
    EmptyRuleName {
        /// Zero-based position of the offending rule in the policy.
        position: usize,
    },

    /// `allowed_values` was present but empty.
    #[error("rule \"{rule}\" has an empty allowed_values list; omit the list to accept any value")]
    EmptyAllowedValues {
        /// Name of the offending rule.
        rule: String,
    },

    /// Resource identifier is empty or whitespace-only.
    #[error("resource ID must be non-empty")]
    EmptyResourceId,

    /// Provider string did not name a supported cloud provider.
    #[error("unknown cloud provider: \"{0}\" (expected aws, azure, or gcp)")]
    UnknownProvider(String),

    /// A second open workflow was proposed for a resource that already
    /// has one.
    #[error("resource \"{resource_id}\" already has open workflow {workflow_id}")]
    OpenWorkflowExists {
        /// The resource with the existing open workflow.
        resource_id: String,
        /// The identifier of the open workflow.
        workflow_id: u64,
    },

    /// A rejection was submitted without a reason.
    #[error("rejection reason must be non-empty")]
    EmptyRejectionReason,
}

/// Unknown-identity failures.
#[derive(Error, Debug)]
pub enum NotFoundError {
    /// No policy with the given identifier.
    #[error("no policy with ID {0}")]
    Policy(u64),

    /// No resource with the given identifier.
    #[error("no resource with ID \"{0}\"")]
    Resource(String),

    /// No workflow with the given identifier.
    #[error("no workflow with ID {0}")]
    Workflow(u64),

    /// No connector registered for the given provider.
    #[error("no connector registered for provider {0}")]
    Connector(CloudProvider),
}

/// Errors during workflow state transitions.
///
/// A transition attempted from the wrong state is never auto-resolved:
/// the workflow is left exactly as it was and the caller is told which
/// transition was refused and why.
#[derive(Error, Debug)]
pub enum StateError {
    /// The attempted transition is not valid from the current status.
    #[error("invalid transition for workflow {workflow_id}: {from} -> {to} ({reason})")]
    InvalidTransition {
        /// The workflow identifier.
        workflow_id: u64,
        /// The current status name.
        from: String,
        /// The requested target status name.
        to: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// The operation applies to a different workflow type.
    #[error("workflow {workflow_id} is a {actual} workflow; operation requires {expected}")]
    WrongWorkflowType {
        /// The workflow identifier.
        workflow_id: u64,
        /// The workflow's actual type name.
        actual: String,
        /// The type name the operation requires.
        expected: String,
    },
}

/// A provider API failure reported by a connector.
///
/// During a multi-provider scan these are logged and isolated so one
/// provider's outage never hides visibility into the others. During tag
/// application the error propagates and the workflow stays PENDING so a
/// human can retry the approval.
#[derive(Error, Debug)]
#[error("{provider} connector failed during {operation}: {message}")]
pub struct ConnectorError {
    /// The provider whose connector failed.
    pub provider: CloudProvider,
    /// The capability that failed (`list_resources` or `update_resource_tags`).
    pub operation: &'static str,
    /// Provider-reported failure detail.
    pub message: String,
}

impl ConnectorError {
    /// Create a connector error for the given provider and operation.
    pub fn new(provider: CloudProvider, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            operation,
            message: message.into(),
        }
    }
}

/// Backing-store failures.
///
/// Fatal to the current operation and propagated to the caller; the core
/// performs no implicit retries.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store could not be reached.
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot serialization or deserialization failed.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::EmptyRuleName { position: 2 };
        let msg = format!("{err}");
        assert!(msg.contains("position 2"));

        let err = ValidationError::EmptyAllowedValues {
            rule: "env".to_string(),
        };
        assert!(format!("{err}").contains("env"));
    }

    #[test]
    fn not_found_error_display() {
        assert!(format!("{}", NotFoundError::Policy(7)).contains('7'));
        assert!(format!("{}", NotFoundError::Resource("i-0abc".into())).contains("i-0abc"));
        assert!(
            format!("{}", NotFoundError::Connector(CloudProvider::Azure)).contains("azure")
        );
    }

    #[test]
    fn state_error_display() {
        let err = StateError::InvalidTransition {
            workflow_id: 4,
            from: "completed".to_string(),
            to: "rejected".to_string(),
            reason: "workflow already finished".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("completed"));
        assert!(msg.contains("rejected"));
    }

    #[test]
    fn connector_error_display() {
        let err = ConnectorError::new(CloudProvider::Aws, "list_resources", "throttled");
        let msg = format!("{err}");
        assert!(msg.contains("aws"));
        assert!(msg.contains("list_resources"));
        assert!(msg.contains("throttled"));
    }

    #[test]
    fn top_level_error_wraps_all_kinds() {
        let e1 = TagSentryError::from(ValidationError::NoRequiredTags);
        let e2 = TagSentryError::from(NotFoundError::Workflow(1));
        let e3 = TagSentryError::from(StorageError::Unavailable("connection refused".into()));
        assert!(format!("{e1}").contains("validation"));
        assert!(format!("{e2}").contains("not found"));
        assert!(format!("{e3}").contains("storage"));
    }
}
