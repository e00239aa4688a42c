#![deny(missing_docs)]

//! # tagsentry-engine — Compliance Reconciliation Engine
//!
//! The component that merges freshly observed cloud resource state into a
//! catalog, evaluates each resource against the active policy set,
//! derives a compliance verdict with an itemized issue list, and drives a
//! remediation workflow from proposal through approval or rejection to
//! application and re-evaluation.
//!
//! ## Architecture
//!
//! ```text
//! connectors (external) ──▶ ScanOrchestrator ──▶ ResourceCatalog
//!                                                     │
//!                              ComplianceEvaluator ◀──┘
//!                                     │ non-compliant
//!                                     ▼
//!                            RemediationWorkflows ──▶ connector.update_resource_tags
//!                                     │                      │ success
//!                                     ▼                      ▼
//!                              approve / reject        catalog merge + re-evaluation
//! ```
//!
//! "Observe" (scan) and "judge" (evaluate) are deliberately decoupled:
//! the orchestrator never triggers evaluation, so each side can be
//! scheduled, retried, and tested independently. All operations are
//! synchronous and idempotent; the surrounding scheduler decides when and
//! how often to invoke them.

pub mod connector;
pub mod evaluator;
pub mod orchestrator;
pub mod workflow;

// Re-export primary types.
pub use connector::{Connector, ConnectorMap, StubConnector};
pub use evaluator::{evaluate, suggested_tags, ComplianceEvaluator, EvaluationOutcome, EvaluationSummary};
pub use orchestrator::ScanOrchestrator;
pub use workflow::RemediationWorkflows;

use std::sync::Arc;

use tagsentry_core::{CloudProvider, Resource, StorageError, TagSentryError};
use tagsentry_store::{
    PolicyStore, ResourceCatalog, StatusSummary, StoreSnapshot, WorkflowStore,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Actor recorded as `created_by` on system-proposed workflows.
    pub system_actor: String,
    /// Whether batch evaluation proposes remediation workflows for
    /// non-compliant resources.
    pub propose_workflows: bool,
    /// Whether batch evaluation cancels an open workflow whose issue
    /// snapshot no longer matches the current findings, replacing it
    /// with a fresh proposal.
    pub supersede_stale_workflows: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_actor: "system".to_string(),
            propose_workflows: true,
            supersede_stale_workflows: true,
        }
    }
}

/// The assembled reconciliation engine.
///
/// Wires the shared stores into the evaluator, workflow service, and
/// orchestrator. This is the object the surrounding API/CLI layer holds;
/// every exposed operation is available either directly on a component or
/// through the convenience methods here.
#[derive(Debug, Clone)]
pub struct Engine {
    /// The catalog of observed resources.
    pub catalog: Arc<ResourceCatalog>,
    /// CRUD over policy definitions.
    pub policies: Arc<PolicyStore>,
    /// The batch evaluation service.
    pub evaluator: ComplianceEvaluator,
    /// The workflow lifecycle service.
    pub workflows: RemediationWorkflows,
    /// The scan coordinator.
    pub orchestrator: ScanOrchestrator,
    workflow_store: Arc<WorkflowStore>,
}

impl Engine {
    /// Assemble an engine with the default configuration.
    pub fn new(connectors: ConnectorMap) -> Self {
        Self::with_config(connectors, EngineConfig::default())
    }

    /// Assemble an engine with the given configuration.
    pub fn with_config(connectors: ConnectorMap, config: EngineConfig) -> Self {
        let catalog = Arc::new(ResourceCatalog::new());
        let policies = Arc::new(PolicyStore::new());
        let workflow_store = Arc::new(WorkflowStore::new());

        let evaluator = ComplianceEvaluator::new(
            Arc::clone(&catalog),
            Arc::clone(&policies),
            Arc::clone(&workflow_store),
            config.clone(),
        );
        let workflows = RemediationWorkflows::new(
            Arc::clone(&workflow_store),
            Arc::clone(&catalog),
            Arc::clone(&policies),
            connectors.clone(),
            config.clone(),
        );
        let orchestrator = ScanOrchestrator::new(connectors, Arc::clone(&catalog));

        Self {
            catalog,
            policies,
            evaluator,
            workflows,
            orchestrator,
            workflow_store,
        }
    }

    /// Scan one provider or all registered providers. See
    /// [`ScanOrchestrator::scan`].
    pub fn scan(&self, provider: Option<CloudProvider>) -> Result<Vec<Resource>, TagSentryError> {
        self.orchestrator.scan(provider)
    }

    /// Evaluate every catalog resource against the active policy set.
    /// See [`ComplianceEvaluator::evaluate_all`].
    pub fn evaluate_all(&self) -> EvaluationSummary {
        self.evaluator.evaluate_all()
    }

    /// Counts of catalog resources by compliance status.
    pub fn status_summary(&self) -> StatusSummary {
        self.catalog.status_summary()
    }

    /// Export every record as a JSON snapshot for a durable backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on failure.
    pub fn snapshot(&self) -> Result<String, StorageError> {
        StoreSnapshot::capture(&self.catalog, &self.policies, &self.workflow_store).to_json()
    }

    /// Load a previously exported snapshot into the stores.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] on malformed input.
    pub fn restore(&self, json: &str) -> Result<(), StorageError> {
        StoreSnapshot::from_json(json)?.restore(
            &self.catalog,
            &self.policies,
            &self.workflow_store,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.system_actor, "system");
        assert!(config.propose_workflows);
        assert!(config.supersede_stale_workflows);
    }

    #[test]
    fn engine_assembles_with_empty_connector_map() {
        let engine = Engine::new(ConnectorMap::new());
        assert!(engine.catalog.is_empty());
        assert!(engine.policies.is_empty());
        assert_eq!(engine.status_summary().total, 0);
    }

    #[test]
    fn scan_with_no_connectors_observes_nothing() {
        let engine = Engine::new(ConnectorMap::new());
        let stored = engine.scan(None).unwrap();
        assert!(stored.is_empty());
    }
}
