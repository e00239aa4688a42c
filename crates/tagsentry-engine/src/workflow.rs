//! # Remediation Workflow Service
//!
//! Drives the workflow lifecycle from proposal through approval or
//! rejection to application and re-evaluation.
//!
//! Approval is atomic approval-plus-application: the provider-side tag
//! update happens first, and only if it succeeds does the workflow
//! transition — through the store's compare-and-set gate — to COMPLETED,
//! followed by the catalog merge and a mandatory single-resource
//! re-evaluation. A connector failure leaves the workflow PENDING so a
//! human can retry; a lost compare-and-set (a concurrent decision won)
//! surfaces as an invalid-state error.

use std::sync::Arc;

use chrono::Utc;

use tagsentry_core::{
    ComplianceStatus, IssueSet, NotFoundError, ResourceId, StateError, TagSentryError, Tags,
    ValidationError, Workflow, WorkflowDetails, WorkflowId, WorkflowStatus, WorkflowType,
};
use tagsentry_store::{PolicyStore, ResourceCatalog, WorkflowFilter, WorkflowStats, WorkflowStore};

use crate::connector::ConnectorMap;
use crate::evaluator;
use crate::EngineConfig;

/// Service wrapping workflow operations over the shared stores.
#[derive(Debug, Clone)]
pub struct RemediationWorkflows {
    workflows: Arc<WorkflowStore>,
    catalog: Arc<ResourceCatalog>,
    policies: Arc<PolicyStore>,
    connectors: ConnectorMap,
    config: EngineConfig,
}

impl RemediationWorkflows {
    /// Create the service over the given stores and connector map.
    pub fn new(
        workflows: Arc<WorkflowStore>,
        catalog: Arc<ResourceCatalog>,
        policies: Arc<PolicyStore>,
        connectors: ConnectorMap,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflows,
            catalog,
            policies,
            connectors,
            config,
        }
    }

    /// Propose a PENDING remediation workflow for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Resource`] if the resource is unknown to
    /// the catalog, and [`ValidationError::OpenWorkflowExists`] if the
    /// resource already has an open workflow — at most one workflow may
    /// drive a resource at a time.
    pub fn propose(
        &self,
        resource_id: &ResourceId,
        issues: IssueSet,
        suggested_tags: Tags,
        created_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        self.propose_inner(
            resource_id,
            WorkflowType::Remediation,
            WorkflowDetails::remediation(issues, suggested_tags),
            created_by,
        )
    }

    /// Request an exemption for a resource.
    ///
    /// Same guards as [`propose`](Self::propose); the justification is
    /// recorded in the workflow details.
    pub fn request_exemption(
        &self,
        resource_id: &ResourceId,
        justification: &str,
        created_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        self.propose_inner(
            resource_id,
            WorkflowType::Exemption,
            WorkflowDetails::exemption(justification),
            created_by,
        )
    }

    fn propose_inner(
        &self,
        resource_id: &ResourceId,
        workflow_type: WorkflowType,
        details: WorkflowDetails,
        created_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        if self.catalog.get(resource_id).is_none() {
            return Err(NotFoundError::Resource(resource_id.to_string()).into());
        }
        if let Some(open) = self.workflows.open_for_resource(resource_id) {
            return Err(ValidationError::OpenWorkflowExists {
                resource_id: resource_id.to_string(),
                workflow_id: open.id.as_u64(),
            }
            .into());
        }
        let created_by =
            Some(created_by.map_or_else(|| self.config.system_actor.clone(), String::from));
        let workflow =
            self.workflows
                .insert(resource_id.clone(), workflow_type, details, created_by);
        tracing::info!(
            workflow_id = %workflow.id,
            resource_id = %resource_id,
            workflow_type = %workflow_type,
            "workflow proposed"
        );
        Ok(workflow)
    }

    /// Approve a PENDING remediation workflow and apply the tags.
    ///
    /// Sequence: provider-side tag update → compare-and-set transition to
    /// COMPLETED → catalog tag merge → mandatory single-resource
    /// re-evaluation against the current active policy set. Approval
    /// without the recheck would leave a stale NON_COMPLIANT verdict on a
    /// fixed resource.
    ///
    /// # Errors
    ///
    /// - [`NotFoundError`] if the workflow, its resource, or the
    ///   provider's connector is missing.
    /// - [`StateError`] if the workflow is not a PENDING remediation —
    ///   including the case where a concurrent decision won the
    ///   compare-and-set while the connector call was in flight.
    /// - [`ConnectorError`](tagsentry_core::ConnectorError) if the provider rejects the
    ///   tag update; the workflow stays PENDING and nothing else changes.
    pub fn approve(
        &self,
        workflow_id: WorkflowId,
        approved_tags: Tags,
        approved_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        let workflow = self.get(workflow_id)?;
        self.ensure_type(&workflow, WorkflowType::Remediation)?;
        self.ensure_pending(&workflow, WorkflowStatus::Completed)?;

        let resource = self
            .catalog
            .get(&workflow.resource_id)
            .ok_or_else(|| NotFoundError::Resource(workflow.resource_id.to_string()))?;
        let connector = self.connectors.get(resource.cloud_provider)?;

        if let Err(e) = connector.update_resource_tags(&resource.resource_id, &approved_tags) {
            tracing::error!(
                workflow_id = %workflow_id,
                resource_id = %resource.resource_id,
                provider = %resource.cloud_provider,
                error = %e,
                "tag application failed; workflow stays pending"
            );
            return Err(e.into());
        }

        // Commit point: the transition proceeds only if the workflow is
        // still PENDING now that the provider call has succeeded.
        let approved_by = approved_by.map(String::from);
        let completed = self
            .workflows
            .transition(workflow_id, WorkflowStatus::Completed, |w| {
                w.details.applied_tags = Some(approved_tags.clone());
                w.approved_by = approved_by.clone();
            })?;

        self.catalog
            .merge_tags(&resource.resource_id, &approved_tags)?;

        let policies = self.policies.list(true);
        let refreshed = self
            .catalog
            .get(&resource.resource_id)
            .ok_or_else(|| NotFoundError::Resource(resource.resource_id.to_string()))?;
        let outcome = evaluator::evaluate(&refreshed, &policies);
        self.catalog.record_evaluation(
            &resource.resource_id,
            outcome.status(),
            outcome.issues,
            Utc::now(),
        )?;

        tracing::info!(
            workflow_id = %workflow_id,
            resource_id = %resource.resource_id,
            compliant = outcome.is_compliant,
            "remediation applied and resource re-evaluated"
        );
        Ok(completed)
    }

    /// Reject a PENDING remediation workflow. The resource is untouched.
    ///
    /// # Errors
    ///
    /// Same state, type, and not-found guards as [`approve`](Self::approve),
    /// plus [`ValidationError::EmptyRejectionReason`] for a blank reason.
    pub fn reject(
        &self,
        workflow_id: WorkflowId,
        reason: &str,
        rejected_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyRejectionReason.into());
        }
        let workflow = self.get(workflow_id)?;
        self.ensure_type(&workflow, WorkflowType::Remediation)?;

        let reason = reason.to_string();
        let rejected_by = rejected_by.map(String::from);
        let rejected = self
            .workflows
            .transition(workflow_id, WorkflowStatus::Rejected, |w| {
                w.details.rejection_reason = Some(reason.clone());
                w.details.rejected_by = rejected_by.clone();
            })?;
        tracing::info!(workflow_id = %workflow_id, "workflow rejected");
        Ok(rejected)
    }

    /// Withdraw a PENDING workflow of either type before a decision.
    /// The resource is untouched.
    pub fn cancel(
        &self,
        workflow_id: WorkflowId,
        cancelled_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        // Existence check first so an unknown id reads as not-found
        // rather than invalid-state.
        self.get(workflow_id)?;
        let note = cancelled_by.map(|by| format!("cancelled by {by}"));
        let cancelled = self
            .workflows
            .transition(workflow_id, WorkflowStatus::Cancelled, |w| {
                if note.is_some() {
                    w.details.note = note.clone();
                }
            })?;
        tracing::info!(workflow_id = %workflow_id, "workflow cancelled");
        Ok(cancelled)
    }

    /// Grant a PENDING exemption workflow: the workflow completes and the
    /// resource's compliance status becomes EXEMPT. Batch evaluation
    /// skips EXEMPT resources, so the exemption is sticky until the
    /// status is administratively cleared.
    ///
    /// # Errors
    ///
    /// Same guards as [`approve`](Self::approve) with the type check
    /// requiring an EXEMPTION workflow.
    pub fn grant_exemption(
        &self,
        workflow_id: WorkflowId,
        approved_by: Option<&str>,
    ) -> Result<Workflow, TagSentryError> {
        let workflow = self.get(workflow_id)?;
        self.ensure_type(&workflow, WorkflowType::Exemption)?;

        let resource = self
            .catalog
            .get(&workflow.resource_id)
            .ok_or_else(|| NotFoundError::Resource(workflow.resource_id.to_string()))?;

        let approved_by = approved_by.map(String::from);
        let completed = self
            .workflows
            .transition(workflow_id, WorkflowStatus::Completed, |w| {
                w.approved_by = approved_by.clone();
            })?;

        self.catalog.record_evaluation(
            &resource.resource_id,
            ComplianceStatus::Exempt,
            resource.compliance_details.clone(),
            Utc::now(),
        )?;
        tracing::info!(
            workflow_id = %workflow_id,
            resource_id = %resource.resource_id,
            "exemption granted"
        );
        Ok(completed)
    }

    /// Retrieve a workflow by id.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Workflow`] for an unknown id.
    pub fn get(&self, workflow_id: WorkflowId) -> Result<Workflow, TagSentryError> {
        self.workflows
            .get(workflow_id)
            .ok_or_else(|| NotFoundError::Workflow(workflow_id.as_u64()).into())
    }

    /// List workflows matching the filter, in id order.
    pub fn list(&self, filter: &WorkflowFilter) -> Vec<Workflow> {
        self.workflows.list(filter)
    }

    /// Workflow counts by status and type.
    pub fn stats(&self) -> WorkflowStats {
        self.workflows.stats()
    }

    fn ensure_type(
        &self,
        workflow: &Workflow,
        expected: WorkflowType,
    ) -> Result<(), TagSentryError> {
        if workflow.workflow_type != expected {
            return Err(StateError::WrongWorkflowType {
                workflow_id: workflow.id.as_u64(),
                actual: workflow.workflow_type.as_str().to_string(),
                expected: expected.as_str().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Pre-flight status guard so an obviously finished workflow fails
    /// before any connector I/O. The authoritative check is the
    /// compare-and-set inside the store transition.
    fn ensure_pending(
        &self,
        workflow: &Workflow,
        requested: WorkflowStatus,
    ) -> Result<(), TagSentryError> {
        if !workflow.is_open() {
            return Err(StateError::InvalidTransition {
                workflow_id: workflow.id.as_u64(),
                from: workflow.status.as_str().to_string(),
                to: requested.as_str().to_string(),
                reason: "workflow is not pending".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
