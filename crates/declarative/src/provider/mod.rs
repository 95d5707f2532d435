//! Providers - one per resource kind
//!
//! A provider translates a [`Resource`] into observations and mutations of
//! the host, through the backends in the [`ApplyContext`]. Every provider
//! supplies:
//! - State detection (current vs desired, in a shared vocabulary)
//! - Convergence (apply only what the diff names)
//! - Optionally, a refresh action triggered by notify edges

mod boolean;
mod exec;
mod file;
mod module;
mod package;
mod service;

pub use boolean::BooleanProvider;
pub use exec::ExecProvider;
pub use file::{FileProvider, content_digest, parse_mode};
pub use module::ModuleProvider;
pub use package::PackageProvider;
pub use service::ServiceProvider;

use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::ProviderResult;
use crate::resource::Resource;
use crate::types::{ApplyResult, RefreshOutcome, ResourceKind, ResourceState};
use std::collections::BTreeMap;

/// Core trait for resource providers
pub trait Provider: Send + Sync {
    /// The kind of resource this provider manages
    fn kind(&self) -> ResourceKind;

    /// Detect the current state of the resource on the host
    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState>;

    /// The state the resource declares, normalized to the same vocabulary
    /// as [`Provider::current_state`]
    fn desired_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState>;

    /// Apply the changes listed in `diff`, and nothing else
    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult>;

    /// Whether notify edges into this resource trigger [`Provider::refresh`]
    fn refreshable(&self) -> bool {
        false
    }

    /// React to a change of a notifying resource
    ///
    /// `own_diff` is what converging this resource changed in the same run,
    /// if anything.
    fn refresh(
        &self,
        _resource: &Resource,
        _own_diff: Option<&ResourceDiff>,
        _ctx: &ApplyContext,
    ) -> ProviderResult<RefreshOutcome> {
        Ok(RefreshOutcome::Skipped {
            reason: format!("{} resources are not refreshable", self.kind()),
        })
    }
}

/// Lookup table from resource kind to provider
pub struct ProviderRegistry {
    providers: BTreeMap<ResourceKind, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Registry with the built-in provider for every kind
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PackageProvider));
        registry.register(Box::new(ServiceProvider));
        registry.register(Box::new(FileProvider));
        registry.register(Box::new(BooleanProvider));
        registry.register(Box::new(ModuleProvider));
        registry.register(Box::new(ExecProvider));
        registry
    }

    /// Register a provider, replacing any previous one for the same kind
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&dyn Provider> {
        self.providers.get(&kind).map(AsRef::as_ref)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Name a resource refers to on the host: the `name` property, else the title
pub(crate) fn host_name(resource: &Resource) -> &str {
    resource.property("name").unwrap_or(&resource.title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = ProviderRegistry::standard();
        for kind in ResourceKind::ALL {
            let provider = registry.get(kind).expect("provider registered");
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn test_host_name_prefers_name_property() {
        let r = Resource::new(ResourceKind::Package, "web-server").with_property("name", "nginx");
        assert_eq!(host_name(&r), "nginx");
        let r = Resource::new(ResourceKind::Package, "nginx");
        assert_eq!(host_name(&r), "nginx");
    }
}
