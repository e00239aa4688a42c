//! # Store Snapshot
//!
//! JSON export/restore of the three record sets — the handoff seam
//! between the in-memory reference stores and whatever durable backend
//! the deployment provides. The core itself performs no file or database
//! I/O; it hands the caller a serialized snapshot and accepts one back.

use serde::{Deserialize, Serialize};

use tagsentry_core::{Policy, Resource, StorageError, Workflow};

use crate::catalog::ResourceCatalog;
use crate::policies::PolicyStore;
use crate::workflows::WorkflowStore;

/// A point-in-time copy of every record in the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// All catalog resources.
    pub resources: Vec<Resource>,
    /// All policies, active or not.
    pub policies: Vec<Policy>,
    /// All workflows in every status.
    pub workflows: Vec<Workflow>,
}

impl StoreSnapshot {
    /// Capture the current contents of the three stores.
    pub fn capture(
        catalog: &ResourceCatalog,
        policies: &PolicyStore,
        workflows: &WorkflowStore,
    ) -> Self {
        Self {
            resources: catalog.all(),
            policies: policies.list(false),
            workflows: workflows.list(&Default::default()),
        }
    }

    /// Load every record in this snapshot into the given stores.
    /// Id counters advance past the highest restored identifiers.
    pub fn restore(
        self,
        catalog: &ResourceCatalog,
        policies: &PolicyStore,
        workflows: &WorkflowStore,
    ) {
        tracing::info!(
            resources = self.resources.len(),
            policies = self.policies.len(),
            workflows = self.workflows.len(),
            "restoring store snapshot"
        );
        catalog.hydrate(self.resources);
        policies.hydrate(self.policies);
        workflows.hydrate(self.workflows);
    }

    /// Serialize the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on failure.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on failure.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }
}
