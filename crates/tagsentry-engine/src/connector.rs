//! # Connector Capability Contract
//!
//! The narrow interface the engine holds toward per-provider resource
//! enumeration and tag mutation. Real connectors (AWS, Azure, GCP SDK
//! integrations) live outside this workspace; the engine only needs
//! "list resources" and "apply tags, success or failure".
//!
//! Connectors are injected at construction through an explicit
//! [`ConnectorMap`] keyed by [`CloudProvider`] — there is no global
//! registry and no runtime string dispatch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use tagsentry_core::{CloudProvider, ConnectorError, NotFoundError, Resource, ResourceId, Tags};

/// A per-provider adapter exposing "list resources" and "apply tags".
pub trait Connector: Send + Sync {
    /// The provider this connector serves.
    fn provider(&self) -> CloudProvider;

    /// Enumerate the provider's resources.
    ///
    /// Partial per-region or per-service failures are the connector's
    /// concern: it logs and omits the affected subset rather than failing
    /// the call. A wholesale failure (credentials, throttling, outage)
    /// returns a [`ConnectorError`], which a multi-provider scan isolates
    /// to this provider.
    ///
    /// Connector calls are expected to carry their own timeout; the engine
    /// performs no retries — retry policy belongs to the caller's
    /// scheduler.
    fn list_resources(&self) -> Result<Vec<Resource>, ConnectorError>;

    /// Merge `tags` into the provider-side tag set of the given resource
    /// (not a replace).
    fn update_resource_tags(
        &self,
        resource_id: &ResourceId,
        tags: &Tags,
    ) -> Result<(), ConnectorError>;
}

/// The capability map from provider tag to connector instance.
#[derive(Clone, Default)]
pub struct ConnectorMap {
    connectors: BTreeMap<CloudProvider, Arc<dyn Connector>>,
}

impl ConnectorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            connectors: BTreeMap::new(),
        }
    }

    /// Builder: register a connector under its own provider tag.
    /// Replaces any connector already registered for that provider.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.provider(), connector);
        self
    }

    /// Look up the connector for a provider.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Connector`] if no connector is registered.
    pub fn get(&self, provider: CloudProvider) -> Result<Arc<dyn Connector>, NotFoundError> {
        self.connectors
            .get(&provider)
            .cloned()
            .ok_or(NotFoundError::Connector(provider))
    }

    /// Iterate over `(provider, connector)` pairs in provider order.
    pub fn iter(&self) -> impl Iterator<Item = (CloudProvider, &Arc<dyn Connector>)> {
        self.connectors.iter().map(|(p, c)| (*p, c))
    }

    /// The registered providers, in scan order.
    pub fn providers(&self) -> Vec<CloudProvider> {
        self.connectors.keys().copied().collect()
    }

    /// Number of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Whether no connectors are registered.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl std::fmt::Debug for ConnectorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorMap")
            .field("providers", &self.providers())
            .finish()
    }
}

/// Deterministic in-memory connector for tests and local development.
///
/// Serves a fixed resource list, records every tag application, and can
/// inject wholesale failures on either capability. Applied tags are also
/// merged into the served resources, imitating the provider-side merge
/// a real connector performs.
pub struct StubConnector {
    provider: CloudProvider,
    resources: RwLock<Vec<Resource>>,
    applied: RwLock<Vec<(ResourceId, Tags)>>,
    fail_listing: AtomicBool,
    fail_tagging: AtomicBool,
}

impl StubConnector {
    /// Create a stub for the given provider with no resources.
    pub fn new(provider: CloudProvider) -> Self {
        Self {
            provider,
            resources: RwLock::new(Vec::new()),
            applied: RwLock::new(Vec::new()),
            fail_listing: AtomicBool::new(false),
            fail_tagging: AtomicBool::new(false),
        }
    }

    /// Builder: serve the given resources.
    pub fn with_resources(self, resources: impl IntoIterator<Item = Resource>) -> Self {
        self.resources.write().extend(resources);
        self
    }

    /// Add a resource to the served list.
    pub fn push_resource(&self, resource: Resource) {
        self.resources.write().push(resource);
    }

    /// Make `list_resources` fail wholesale until cleared.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make `update_resource_tags` fail until cleared.
    pub fn set_fail_tagging(&self, fail: bool) {
        self.fail_tagging.store(fail, Ordering::SeqCst);
    }

    /// Every `(resource_id, tags)` application recorded so far.
    pub fn applied(&self) -> Vec<(ResourceId, Tags)> {
        self.applied.read().clone()
    }
}

impl Connector for StubConnector {
    fn provider(&self) -> CloudProvider {
        self.provider
    }

    fn list_resources(&self) -> Result<Vec<Resource>, ConnectorError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ConnectorError::new(
                self.provider,
                "list_resources",
                "injected listing failure",
            ));
        }
        Ok(self.resources.read().clone())
    }

    fn update_resource_tags(
        &self,
        resource_id: &ResourceId,
        tags: &Tags,
    ) -> Result<(), ConnectorError> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(ConnectorError::new(
                self.provider,
                "update_resource_tags",
                "injected tagging failure",
            ));
        }
        let mut resources = self.resources.write();
        if let Some(resource) = resources
            .iter_mut()
            .find(|r| &r.resource_id == resource_id)
        {
            resource.tags = resource.tags.merged(tags);
        }
        self.applied
            .write()
            .push((resource_id.clone(), tags.clone()));
        Ok(())
    }
}

impl std::fmt::Debug for StubConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubConnector")
            .field("provider", &self.provider)
            .field("resources", &self.resources.read().len())
            .field("applied", &self.applied.read().len())
            .finish()
    }
}
