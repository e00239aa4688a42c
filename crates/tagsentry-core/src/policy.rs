//! # Policies
//!
//! A policy is a named set of required-tag rules, optionally scoped to
//! resource types and cloud providers. Policies are validated at the
//! boundary — a policy that reaches the evaluator is structurally sound,
//! so evaluation never has to defend against malformed rule lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::provider::CloudProvider;
use crate::resource::Resource;

/// A policy identifier, assigned by the policy store on creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PolicyId(u64);

impl PolicyId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Access the raw identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_true() -> bool {
    true
}

/// A single tag-name constraint within a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredTagRule {
    /// The tag name this rule constrains. Must be non-empty.
    pub name: String,
    /// Carried for the persisted rule shape; the evaluator enforces every
    /// listed rule.
    #[serde(default = "default_true")]
    pub required: bool,
    /// When present, the tag's value must be one of these. Must be
    /// non-empty when present — omit the list to accept any value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// Suggested value for remediation when the tag is missing or invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl RequiredTagRule {
    /// Create a rule requiring the named tag with no value constraint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            allowed_values: None,
            default_value: None,
        }
    }

    /// Builder: restrict the tag to the given values.
    pub fn with_allowed_values(
        mut self,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: set the remediation default.
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Whether `value` satisfies this rule's value constraint.
    pub fn accepts(&self, value: &str) -> bool {
        match &self.allowed_values {
            Some(allowed) => allowed.iter().any(|v| v == value),
            None => true,
        }
    }

    /// The value a remediation should suggest for this rule: the default
    /// value, else the first allowed value, else an empty placeholder the
    /// approver must fill in.
    pub fn suggested_value(&self) -> String {
        if let Some(default) = &self.default_value {
            return default.clone();
        }
        if let Some(allowed) = &self.allowed_values {
            if let Some(first) = allowed.first() {
                return first.clone();
            }
        }
        String::new()
    }
}

/// Validate a required-tag rule list: at least one rule, every name
/// non-empty, `allowed_values` non-empty when present.
pub fn validate_required_tags(rules: &[RequiredTagRule]) -> Result<(), ValidationError> {
    if rules.is_empty() {
        return Err(ValidationError::NoRequiredTags);
    }
    for (position, rule) in rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName { position });
        }
        if let Some(allowed) = &rule.allowed_values {
            if allowed.is_empty() {
                return Err(ValidationError::EmptyAllowedValues {
                    rule: rule.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// A stored compliance policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Store-assigned identifier.
    pub id: PolicyId,
    /// Human-readable policy name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether evaluation considers this policy.
    pub active: bool,
    /// The ordered rule list. Validated non-empty.
    pub required_tags: Vec<RequiredTagRule>,
    /// Resource-type scope. `None` applies to all resource types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    /// Provider scope. `None` applies to all providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_providers: Option<Vec<CloudProvider>>,
    /// When the policy was created.
    pub created_at: DateTime<Utc>,
    /// When the policy was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Policy {
    /// Whether this policy applies to the given resource. A policy with
    /// no resource-type scope and no provider scope applies universally.
    pub fn applies_to(&self, resource: &Resource) -> bool {
        if let Some(types) = &self.resource_types {
            if !types.iter().any(|t| t == &resource.resource_type) {
                return false;
            }
        }
        if let Some(providers) = &self.cloud_providers {
            if !providers.contains(&resource.cloud_provider) {
                return false;
            }
        }
        true
    }

    /// Look up a rule by tag name.
    pub fn rule(&self, tag_name: &str) -> Option<&RequiredTagRule> {
        self.required_tags.iter().find(|r| r.name == tag_name)
    }
}

/// Input shape for creating a policy. Identity is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft {
    /// Human-readable policy name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the policy starts active. Defaults to `true`.
    #[serde(default = "default_true")]
    pub active: bool,
    /// The ordered rule list.
    pub required_tags: Vec<RequiredTagRule>,
    /// Resource-type scope. `None` applies to all resource types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    /// Provider scope. `None` applies to all providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_providers: Option<Vec<CloudProvider>>,
}

impl PolicyDraft {
    /// Create a draft with the given name and rules, active, unscoped.
    pub fn new(name: impl Into<String>, required_tags: Vec<RequiredTagRule>) -> Self {
        Self {
            name: name.into(),
            description: None,
            active: true,
            required_tags,
            resource_types: None,
            cloud_providers: None,
        }
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: scope to the given resource types.
    pub fn with_resource_types(
        mut self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.resource_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: scope to the given providers.
    pub fn with_cloud_providers(mut self, providers: impl IntoIterator<Item = CloudProvider>) -> Self {
        self.cloud_providers = Some(providers.into_iter().collect());
        self
    }

    /// Builder: create the policy inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Validate the draft's rule list.
    ///
    /// # Errors
    ///
    /// See [`validate_required_tags`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_required_tags(&self.required_tags)
    }
}

/// Partial update for a stored policy. Fields left `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyPatch {
    /// New policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Replacement rule list. Re-validated when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tags: Option<Vec<RequiredTagRule>>,
    /// Replacement resource-type scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    /// Replacement provider scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_providers: Option<Vec<CloudProvider>>,
}
