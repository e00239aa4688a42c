//! # Policy Store
//!
//! CRUD over policy definitions. Shape validation happens before
//! acceptance, so a policy that reaches the evaluator is structurally
//! sound. Listing is in id order, which for monotonically assigned ids is
//! insertion order — test expectations stay deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use tagsentry_core::{
    validate_required_tags, NotFoundError, Policy, PolicyDraft, PolicyId, PolicyPatch,
    TagSentryError, ValidationError,
};

use crate::store::Store;

/// CRUD store for compliance policies.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    policies: Store<PolicyId, Policy>,
    next_id: Arc<AtomicU64>,
}

impl PolicyStore {
    /// Create an empty policy store.
    pub fn new() -> Self {
        Self {
            policies: Store::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Validate a draft, assign an identity, and persist the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the rule list is empty, a rule name
    /// is empty, or an `allowed_values` list is present but empty.
    pub fn create(&self, draft: PolicyDraft) -> Result<Policy, ValidationError> {
        draft.validate()?;
        let id = PolicyId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let policy = Policy {
            id,
            name: draft.name,
            description: draft.description,
            active: draft.active,
            required_tags: draft.required_tags,
            resource_types: draft.resource_types,
            cloud_providers: draft.cloud_providers,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.policies.insert(id, policy.clone());
        tracing::debug!(policy_id = %id, name = %policy.name, "policy created");
        Ok(policy)
    }

    /// Retrieve a policy by id.
    pub fn get(&self, id: PolicyId) -> Option<Policy> {
        self.policies.get(&id)
    }

    /// List policies in insertion (id) order, optionally restricted to
    /// active ones. Evaluation always reads the active-only snapshot at
    /// evaluation time — there is no caching across calls.
    pub fn list(&self, active_only: bool) -> Vec<Policy> {
        let mut policies = self.policies.list();
        if active_only {
            policies.retain(|p| p.active);
        }
        policies
    }

    /// Apply a partial update. Fields left `None` in the patch are
    /// unchanged; a replacement rule list is re-validated first.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Policy`] for an unknown id and
    /// [`ValidationError`] for a malformed replacement rule list.
    pub fn update(&self, id: PolicyId, patch: PolicyPatch) -> Result<Policy, TagSentryError> {
        if let Some(rules) = &patch.required_tags {
            validate_required_tags(rules)?;
        }
        self.policies
            .update(&id, |policy| {
                if let Some(name) = patch.name.clone() {
                    policy.name = name;
                }
                if let Some(description) = patch.description.clone() {
                    policy.description = Some(description);
                }
                if let Some(active) = patch.active {
                    policy.active = active;
                }
                if let Some(rules) = patch.required_tags.clone() {
                    policy.required_tags = rules;
                }
                if let Some(types) = patch.resource_types.clone() {
                    policy.resource_types = Some(types);
                }
                if let Some(providers) = patch.cloud_providers.clone() {
                    policy.cloud_providers = Some(providers);
                }
                policy.updated_at = Some(Utc::now());
            })
            .ok_or_else(|| NotFoundError::Policy(id.as_u64()).into())
    }

    /// Remove a policy. Workflows already proposed under it are NOT
    /// retracted — their details hold frozen snapshots of the findings.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Policy`] for an unknown id.
    pub fn delete(&self, id: PolicyId) -> Result<Policy, NotFoundError> {
        let removed = self
            .policies
            .remove(&id)
            .ok_or_else(|| NotFoundError::Policy(id.as_u64()))?;
        tracing::debug!(policy_id = %id, name = %removed.name, "policy deleted");
        Ok(removed)
    }

    /// Number of stored policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Bulk-load records, e.g. from a [`StoreSnapshot`](crate::StoreSnapshot).
    /// Advances the id counter past the highest loaded id.
    pub fn hydrate(&self, policies: impl IntoIterator<Item = Policy>) {
        let mut max_id = 0;
        for policy in policies {
            max_id = max_id.max(policy.id.as_u64());
            self.policies.insert(policy.id, policy);
        }
        self.next_id.fetch_max(max_id + 1, Ordering::Relaxed);
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
