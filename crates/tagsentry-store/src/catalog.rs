//! # Resource Catalog
//!
//! Idempotent upsert of observed resources keyed by global resource
//! identity, plus the tag-merge and evaluation write-back paths.
//!
//! Ingestion never silently mutates compliance state: an upsert refreshes
//! what a scan can observe (name, type, region, tags, observation time)
//! and preserves the last evaluation's verdict until the next explicit
//! evaluation pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tagsentry_core::{
    ComplianceStatus, IssueSet, NotFoundError, Resource, ResourceId, StorageError, Tags,
};

use crate::store::Store;

/// Counts of catalog resources by compliance status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    /// Total resources in the catalog.
    pub total: usize,
    /// Resources whose last evaluation passed.
    pub compliant: usize,
    /// Resources whose last evaluation found issues.
    pub non_compliant: usize,
    /// Resources not yet evaluated.
    pub unknown: usize,
    /// Resources exempted from evaluation.
    pub exempt: usize,
    /// Percentage of compliant resources over the whole catalog
    /// (0.0 when the catalog is empty).
    pub compliance_rate: f64,
}

/// The catalog of observed cloud resources.
///
/// Resources are created and updated only through [`upsert`]
/// (scan ingestion), [`merge_tags`] (remediation application), and
/// [`record_evaluation`] (evaluation write-back). The core never deletes
/// a resource — removal is an external administrative action.
///
/// [`upsert`]: ResourceCatalog::upsert
/// [`merge_tags`]: ResourceCatalog::merge_tags
/// [`record_evaluation`]: ResourceCatalog::record_evaluation
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    resources: Store<ResourceId, Resource>,
}

impl ResourceCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            resources: Store::new(),
        }
    }

    /// Merge an observed resource into the catalog by identity.
    ///
    /// If the identity exists, the observation overwrites the mutable
    /// fields (name, resource type, region, tags, last_checked) but
    /// preserves `compliance_status` and `compliance_details` until the
    /// next evaluation pass. A brand-new identity is inserted as observed.
    ///
    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store is unavailable; the
    /// caller must retry or abort the whole scan. The bundled in-memory
    /// backend is infallible — the error arm exists for durable backends
    /// behind the same contract.
    pub fn upsert(&self, observed: Resource) -> Result<Resource, StorageError> {
        let stored = self.resources.upsert(
            observed.resource_id.clone(),
            observed,
            |existing, incoming| {
                existing.name = incoming.name;
                existing.resource_type = incoming.resource_type;
                existing.region = incoming.region;
                existing.tags = incoming.tags;
                existing.last_checked = incoming.last_checked;
            },
        );
        Ok(stored)
    }

    /// Merge `new_tags` into a resource's tag map, with `new_tags` taking
    /// precedence on name collisions. This is the only path through which
    /// tags change outside of a raw scan.
    ///
    /// Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Resource`] for an unknown identity.
    pub fn merge_tags(
        &self,
        resource_id: &ResourceId,
        new_tags: &Tags,
    ) -> Result<Resource, NotFoundError> {
        self.resources
            .update(resource_id, |resource| {
                resource.tags = resource.tags.merged(new_tags);
            })
            .ok_or_else(|| NotFoundError::Resource(resource_id.to_string()))
    }

    /// Write back an evaluation verdict for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Resource`] for an unknown identity.
    pub fn record_evaluation(
        &self,
        resource_id: &ResourceId,
        status: ComplianceStatus,
        issues: IssueSet,
        checked_at: DateTime<Utc>,
    ) -> Result<Resource, NotFoundError> {
        self.resources
            .update(resource_id, |resource| {
                resource.compliance_status = status;
                resource.compliance_details = issues.clone();
                resource.last_checked = Some(checked_at);
            })
            .ok_or_else(|| NotFoundError::Resource(resource_id.to_string()))
    }

    /// Retrieve a resource by identity.
    pub fn get(&self, resource_id: &ResourceId) -> Option<Resource> {
        self.resources.get(resource_id)
    }

    /// All resources, in identity order.
    pub fn all(&self) -> Vec<Resource> {
        self.resources.list()
    }

    /// Number of resources in the catalog.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Counts by compliance status plus the overall compliance rate.
    pub fn status_summary(&self) -> StatusSummary {
        let resources = self.resources.list();
        let mut summary = StatusSummary {
            total: resources.len(),
            compliant: 0,
            non_compliant: 0,
            unknown: 0,
            exempt: 0,
            compliance_rate: 0.0,
        };
        for resource in &resources {
            match resource.compliance_status {
                ComplianceStatus::Compliant => summary.compliant += 1,
                ComplianceStatus::NonCompliant => summary.non_compliant += 1,
                ComplianceStatus::Unknown => summary.unknown += 1,
                ComplianceStatus::Exempt => summary.exempt += 1,
            }
        }
        if summary.total > 0 {
            summary.compliance_rate = (summary.compliant as f64 / summary.total as f64) * 100.0;
        }
        summary
    }

    /// Bulk-load records, e.g. from a [`StoreSnapshot`](crate::StoreSnapshot).
    pub fn hydrate(&self, resources: impl IntoIterator<Item = Resource>) {
        for resource in resources {
            self.resources.insert(resource.resource_id.clone(), resource);
        }
    }
}
