//! # Resources
//!
//! A resource is a cloud-provider-managed entity (VM, bucket, managed
//! database, function) tracked for tag governance. Identity is the pair
//! `(cloud_provider, resource_id)`, with `resource_id` unique across the
//! whole catalog regardless of provider.
//!
//! Resources are created and updated only by scan ingestion and
//! remediation application; the core never deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::issue::IssueSet;
use crate::provider::CloudProvider;
use crate::tags::Tags;

/// A globally unique resource identifier (instance ID, bucket name, ARN).
///
/// # Validation
///
/// Must be a non-empty string. No further format restrictions are imposed
/// because identifier shapes vary per provider and resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource identifier, validating non-emptiness.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyResourceId`] if the string is empty
    /// or whitespace-only.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyResourceId);
        }
        Ok(Self(s))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The last-evaluated compliance verdict for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Freshly observed, not yet evaluated.
    Unknown,
    /// Every applicable policy is satisfied.
    Compliant,
    /// At least one applicable policy is violated.
    NonCompliant,
    /// Exempted from evaluation by an approved exemption workflow.
    Exempt,
}

impl ComplianceStatus {
    /// Return the snake_case string value used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Exempt => "exempt",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cloud resource tracked by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Globally unique identifier.
    pub resource_id: ResourceId,
    /// Human-readable name (often the `Name` tag, falling back to the ID).
    pub name: String,
    /// Provider-specific type label (`ec2`, `s3`, `vm`, `bucket`, ...).
    pub resource_type: String,
    /// The provider that owns this resource.
    pub cloud_provider: CloudProvider,
    /// Provider region the resource lives in.
    pub region: String,
    /// Current tag set. Never null — empty map, not absence.
    pub tags: Tags,
    /// Last-evaluated verdict. [`ComplianceStatus::Unknown`] until the
    /// first evaluation pass.
    pub compliance_status: ComplianceStatus,
    /// Itemized findings from the last evaluation. Empty when compliant
    /// or not yet evaluated.
    pub compliance_details: IssueSet,
    /// When the resource was last observed or evaluated.
    pub last_checked: Option<DateTime<Utc>>,
}

impl Resource {
    /// Create a freshly observed resource with no tags, status
    /// [`ComplianceStatus::Unknown`], and no findings.
    pub fn new(
        resource_id: ResourceId,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        cloud_provider: CloudProvider,
        region: impl Into<String>,
    ) -> Self {
        Self {
            resource_id,
            name: name.into(),
            resource_type: resource_type.into(),
            cloud_provider,
            region: region.into(),
            tags: Tags::new(),
            compliance_status: ComplianceStatus::Unknown,
            compliance_details: IssueSet::new(),
            last_checked: None,
        }
    }

    /// Builder: set the observed tag set.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_valid() {
        let id = ResourceId::new("i-0abc123").unwrap();
        assert_eq!(id.as_str(), "i-0abc123");
    }

    #[test]
    fn resource_id_rejects_empty() {
        assert!(ResourceId::new("").is_err());
        assert!(ResourceId::new("   ").is_err());
    }

    #[test]
    fn new_resource_starts_unknown_with_empty_tags() {
        let resource = Resource::new(
            ResourceId::new("vm-001").unwrap(),
            "vm-001",
            "vm",
            CloudProvider::Azure,
            "eastus",
        );
        assert_eq!(resource.compliance_status, ComplianceStatus::Unknown);
        assert!(resource.tags.is_empty());
        assert!(resource.compliance_details.is_empty());
        assert!(resource.last_checked.is_none());
    }

    #[test]
    fn status_string_values() {
        assert_eq!(ComplianceStatus::NonCompliant.as_str(), "non_compliant");
        let json = serde_json::to_string(&ComplianceStatus::Exempt).unwrap();
        assert_eq!(json, "\"exempt\"");
    }
}
