//! # Scan Orchestrator
//!
//! The observing half of the engine: pulls resource lists out of the
//! registered connectors and merges them into the catalog. It never calls
//! the evaluator — observation and judgment are scheduled, retried, and
//! tested independently.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use tagsentry_core::{CloudProvider, Resource, TagSentryError};
use tagsentry_store::ResourceCatalog;

use crate::connector::ConnectorMap;

/// Coordinates connector-provided resource lists into catalog upserts.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    connectors: ConnectorMap,
    catalog: Arc<ResourceCatalog>,
}

impl ScanOrchestrator {
    /// Create an orchestrator over the given connector map and catalog.
    pub fn new(connectors: ConnectorMap, catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            connectors,
            catalog,
        }
    }

    /// Scan one provider or all registered providers.
    ///
    /// With `Some(provider)`, exactly that connector runs and its failure
    /// propagates. With `None`, every registered connector runs in
    /// provider order and a single connector's failure is logged and
    /// skipped — one misconfigured provider must not block visibility
    /// into the others.
    ///
    /// Every observed resource is stamped with the observation time and
    /// upserted; compliance verdicts are untouched until the next
    /// evaluation pass. Returns the stored records.
    ///
    /// # Errors
    ///
    /// - [`NotFoundError::Connector`](tagsentry_core::NotFoundError) when
    ///   a specific provider has no registered connector.
    /// - [`ConnectorError`](tagsentry_core::ConnectorError) when a
    ///   specifically requested provider's listing fails.
    /// - [`StorageError`](tagsentry_core::StorageError) when the catalog
    ///   backend fails; the scan aborts and the caller decides on retry.
    pub fn scan(&self, provider: Option<CloudProvider>) -> Result<Vec<Resource>, TagSentryError> {
        let scan_id = Uuid::new_v4();
        let observed = match provider {
            Some(provider) => {
                let connector = self.connectors.get(provider)?;
                connector.list_resources()?
            }
            None => {
                let mut observed = Vec::new();
                for (provider, connector) in self.connectors.iter() {
                    match connector.list_resources() {
                        Ok(resources) => {
                            tracing::debug!(
                                %scan_id,
                                provider = %provider,
                                resources = resources.len(),
                                "provider scan finished"
                            );
                            observed.extend(resources);
                        }
                        Err(e) => {
                            tracing::error!(
                                %scan_id,
                                provider = %provider,
                                error = %e,
                                "provider scan failed; continuing with remaining providers"
                            );
                        }
                    }
                }
                observed
            }
        };

        let now = Utc::now();
        let mut stored = Vec::with_capacity(observed.len());
        for mut resource in observed {
            resource.last_checked = Some(now);
            stored.push(self.catalog.upsert(resource)?);
        }

        tracing::info!(
            %scan_id,
            provider = provider.map(|p| p.as_str()).unwrap_or("all"),
            resources = stored.len(),
            "scan ingested"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tagsentry_core::{ComplianceStatus, IssueSet, NotFoundError, ResourceId, Tags};

    use crate::connector::{Connector, StubConnector};

    fn stub(provider: CloudProvider, ids: &[&str]) -> Arc<StubConnector> {
        let resources = ids.iter().map(|id| {
            Resource::new(
                ResourceId::new(*id).unwrap(),
                *id,
                "ec2",
                provider,
                "us-east-1",
            )
        });
        Arc::new(StubConnector::new(provider).with_resources(resources))
    }

    fn orchestrator(
        stubs: &[Arc<StubConnector>],
    ) -> (ScanOrchestrator, Arc<ResourceCatalog>) {
        let catalog = Arc::new(ResourceCatalog::new());
        let mut map = ConnectorMap::new();
        for s in stubs {
            map = map.with_connector(Arc::clone(s) as Arc<dyn Connector>);
        }
        (ScanOrchestrator::new(map, Arc::clone(&catalog)), catalog)
    }

    #[test]
    fn scan_all_concatenates_every_provider() {
        let aws = stub(CloudProvider::Aws, &["i-1", "i-2"]);
        let azure = stub(CloudProvider::Azure, &["vm-1"]);
        let (orchestrator, catalog) = orchestrator(&[aws, azure]);

        let stored = orchestrator.scan(None).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(catalog.len(), 3);
        assert!(stored.iter().all(|r| r.last_checked.is_some()));
        assert!(stored
            .iter()
            .all(|r| r.compliance_status == ComplianceStatus::Unknown));
    }

    #[test]
    fn scan_single_provider_touches_only_that_connector() {
        let aws = stub(CloudProvider::Aws, &["i-1"]);
        let azure = stub(CloudProvider::Azure, &["vm-1"]);
        let (orchestrator, catalog) = orchestrator(&[aws, azure]);

        let stored = orchestrator.scan(Some(CloudProvider::Azure)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].cloud_provider, CloudProvider::Azure);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn scan_all_tolerates_a_failing_provider() {
        let aws = stub(CloudProvider::Aws, &["i-1"]);
        let azure = stub(CloudProvider::Azure, &["vm-1"]);
        let gcp = stub(CloudProvider::Gcp, &["gce-1"]);
        azure.set_fail_listing(true);
        let (orchestrator, catalog) = orchestrator(&[aws, azure, gcp]);

        let stored = orchestrator.scan(None).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(catalog.get(&ResourceId::new("i-1").unwrap()).is_some());
        assert!(catalog.get(&ResourceId::new("gce-1").unwrap()).is_some());
        assert!(catalog.get(&ResourceId::new("vm-1").unwrap()).is_none());
    }

    #[test]
    fn scan_specific_provider_failure_propagates() {
        let aws = stub(CloudProvider::Aws, &["i-1"]);
        aws.set_fail_listing(true);
        let (orchestrator, catalog) = orchestrator(&[aws]);

        let err = orchestrator.scan(Some(CloudProvider::Aws)).unwrap_err();
        assert!(matches!(err, TagSentryError::Connector(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn scan_unregistered_provider_is_not_found() {
        let (orchestrator, _) = orchestrator(&[stub(CloudProvider::Aws, &[])]);
        let err = orchestrator.scan(Some(CloudProvider::Gcp)).unwrap_err();
        assert!(matches!(
            err,
            TagSentryError::NotFound(NotFoundError::Connector(CloudProvider::Gcp))
        ));
    }

    #[test]
    fn rescan_preserves_existing_verdicts() {
        let aws = stub(CloudProvider::Aws, &["i-1"]);
        let (orchestrator, catalog) = orchestrator(&[aws.clone()]);
        orchestrator.scan(None).unwrap();

        catalog
            .record_evaluation(
                &ResourceId::new("i-1").unwrap(),
                ComplianceStatus::NonCompliant,
                IssueSet::new(),
                Utc::now(),
            )
            .unwrap();

        // Provider-side tags changed; verdict must survive the re-scan.
        aws.update_resource_tags(
            &ResourceId::new("i-1").unwrap(),
            &[("owner", "alice")].into_iter().collect::<Tags>(),
        )
        .unwrap();
        let stored = orchestrator.scan(None).unwrap();
        assert_eq!(stored[0].tags.get("owner"), Some("alice"));
        assert_eq!(
            stored[0].compliance_status,
            ComplianceStatus::NonCompliant
        );
    }
}
