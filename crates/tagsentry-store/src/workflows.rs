//! # Workflow Store
//!
//! Persistence and the compare-and-set transition gate for remediation
//! and exemption workflows. Every status change flows through
//! [`WorkflowStore::transition`], which re-checks the observed status
//! under the write lock at commit time — concurrent `approve` and
//! `reject` calls on one workflow can never both succeed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use tagsentry_core::{
    NotFoundError, ResourceId, StateError, TagSentryError, Workflow, WorkflowDetails, WorkflowId,
    WorkflowStatus, WorkflowType,
};

use crate::store::Store;

/// Filter for workflow listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    /// Match only this status.
    pub status: Option<WorkflowStatus>,
    /// Match only this workflow type.
    pub workflow_type: Option<WorkflowType>,
    /// Match only workflows for this resource.
    pub resource_id: Option<ResourceId>,
}

impl WorkflowFilter {
    /// Builder: restrict to a status.
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder: restrict to a workflow type.
    pub fn with_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = Some(workflow_type);
        self
    }

    /// Builder: restrict to a resource.
    pub fn with_resource(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    fn matches(&self, workflow: &Workflow) -> bool {
        if let Some(status) = self.status {
            if workflow.status != status {
                return false;
            }
        }
        if let Some(workflow_type) = self.workflow_type {
            if workflow.workflow_type != workflow_type {
                return false;
            }
        }
        if let Some(resource_id) = &self.resource_id {
            if &workflow.resource_id != resource_id {
                return false;
            }
        }
        true
    }
}

/// Workflow counts by status and by type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStats {
    /// Total workflows in the store.
    pub total: usize,
    /// Counts keyed by status name.
    pub by_status: BTreeMap<String, usize>,
    /// Counts keyed by workflow type name.
    pub by_type: BTreeMap<String, usize>,
}

/// Store for workflow records.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    workflows: Store<WorkflowId, Workflow>,
    next_id: Arc<AtomicU64>,
}

impl WorkflowStore {
    /// Create an empty workflow store.
    pub fn new() -> Self {
        Self {
            workflows: Store::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Persist a new PENDING workflow and return it.
    pub fn insert(
        &self,
        resource_id: ResourceId,
        workflow_type: WorkflowType,
        details: WorkflowDetails,
        created_by: Option<String>,
    ) -> Workflow {
        let id = WorkflowId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let workflow = Workflow::new(id, resource_id, workflow_type, details, created_by);
        self.workflows.insert(id, workflow.clone());
        workflow
    }

    /// Retrieve a workflow by id.
    pub fn get(&self, id: WorkflowId) -> Option<Workflow> {
        self.workflows.get(&id)
    }

    /// List workflows matching the filter, in id order.
    pub fn list(&self, filter: &WorkflowFilter) -> Vec<Workflow> {
        self.workflows
            .list()
            .into_iter()
            .filter(|w| filter.matches(w))
            .collect()
    }

    /// The open (PENDING) workflow for a resource, if any. With the
    /// at-most-one-open invariant enforced at proposal time there is at
    /// most one; if older data violates that, the earliest wins.
    pub fn open_for_resource(&self, resource_id: &ResourceId) -> Option<Workflow> {
        self.workflows
            .list()
            .into_iter()
            .find(|w| w.is_open() && &w.resource_id == resource_id)
    }

    /// Transition a workflow to a terminal status, compare-and-set style.
    ///
    /// The status check and the mutation run under one write lock: the
    /// transition proceeds only if the observed status still permits it at
    /// commit time. `apply` runs after the status flip and may fill in
    /// decision fields (applied tags, rejection reason, approver).
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Workflow`] for an unknown id and
    /// [`StateError::InvalidTransition`] when the workflow is no longer
    /// PENDING — in that case the record is left byte-for-byte unchanged.
    pub fn transition(
        &self,
        id: WorkflowId,
        to: WorkflowStatus,
        apply: impl FnOnce(&mut Workflow),
    ) -> Result<Workflow, TagSentryError> {
        let result = self.workflows.try_update(&id, |workflow| {
            if !workflow.status.can_transition_to(to) {
                return Err(StateError::InvalidTransition {
                    workflow_id: id.as_u64(),
                    from: workflow.status.as_str().to_string(),
                    to: to.as_str().to_string(),
                    reason: "workflow is not pending".to_string(),
                });
            }
            let now = Utc::now();
            workflow.status = to;
            workflow.updated_at = now;
            workflow.completed_at = Some(now);
            apply(workflow);
            Ok(workflow.clone())
        });
        match result {
            None => Err(NotFoundError::Workflow(id.as_u64()).into()),
            Some(Err(state_err)) => Err(state_err.into()),
            Some(Ok(workflow)) => Ok(workflow),
        }
    }

    /// Counts by status and type.
    pub fn stats(&self) -> WorkflowStats {
        let workflows = self.workflows.list();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for workflow in &workflows {
            *by_status
                .entry(workflow.status.as_str().to_string())
                .or_default() += 1;
            *by_type
                .entry(workflow.workflow_type.as_str().to_string())
                .or_default() += 1;
        }
        WorkflowStats {
            total: workflows.len(),
            by_status,
            by_type,
        }
    }

    /// Number of stored workflows.
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Bulk-load records, e.g. from a [`StoreSnapshot`](crate::StoreSnapshot).
    /// Advances the id counter past the highest loaded id.
    pub fn hydrate(&self, workflows: impl IntoIterator<Item = Workflow>) {
        let mut max_id = 0;
        for workflow in workflows {
            max_id = max_id.max(workflow.id.as_u64());
            self.workflows.insert(workflow.id, workflow);
        }
        self.next_id.fetch_max(max_id + 1, Ordering::Relaxed);
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}
