//! Package provider

use super::{Provider, host_name};
use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, Ensure, ResourceKind, ResourceState};

/// Installs, pins and removes packages
pub struct PackageProvider;

impl PackageProvider {
    /// The version the resource pins, if any
    fn pinned_version(resource: &Resource) -> Option<&str> {
        match &resource.ensure {
            Ensure::Custom(version) if version != "latest" => Some(version),
            _ => None,
        }
    }
}

impl Provider for PackageProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Package
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        let installed = ctx.backends.packages.installed_version(host_name(resource))?;
        Ok(match installed {
            None => ResourceState::absent(),
            Some(version) if Self::pinned_version(resource).is_some() => {
                ResourceState::new(version)
            }
            Some(_) => ResourceState::new("present"),
        })
    }

    fn desired_state(
        &self,
        resource: &Resource,
        _ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        match &resource.ensure {
            Ensure::Present => Ok(ResourceState::new("present")),
            Ensure::Absent => Ok(ResourceState::absent()),
            Ensure::Custom(version) if version == "latest" => Ok(ResourceState::new("present")),
            Ensure::Custom(version) => Ok(ResourceState::new(version.clone())),
            other => Err(ProviderError::invalid(format!(
                "ensure '{other}' is not valid for a package"
            ))),
        }
    }

    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult> {
        let Some(change) = diff.get("ensure") else {
            return Ok(ApplyResult::NoChange);
        };
        let name = host_name(resource);
        let packages = &ctx.backends.packages;

        if resource.ensure.is_absent() {
            log::info!("removing package {name}");
            packages.remove(name)?;
            return Ok(ApplyResult::Removed);
        }

        let version = Self::pinned_version(resource);
        log::info!(
            "installing package {name}{}",
            version.map(|v| format!(" ({v})")).unwrap_or_default()
        );
        packages.install(name, version)?;

        if change.from.as_deref() == Some("absent") {
            Ok(ApplyResult::Created)
        } else {
            Ok(ApplyResult::Modified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Backends;
    use crate::memory::MemoryHost;
    use std::sync::Arc;

    fn converge(host: &Arc<MemoryHost>, resource: &Resource) -> (ResourceDiff, ApplyResult) {
        let backends = Backends::from_host(host.clone());
        let ctx = ApplyContext::new(&backends, false);
        let current = PackageProvider.current_state(resource, &ctx).unwrap();
        let desired = PackageProvider.desired_state(resource, &ctx).unwrap();
        let diff = ResourceDiff::compute(&current, &desired);
        let result = PackageProvider.converge(resource, &diff, &ctx).unwrap();
        (diff, result)
    }

    #[test]
    fn test_install_missing_package() {
        let host = Arc::new(MemoryHost::new());
        let (diff, result) = converge(&host, &Resource::new(ResourceKind::Package, "nginx"));
        assert!(diff.is_addition());
        assert_eq!(result, ApplyResult::Created);
        assert!(host.package_version("nginx").is_some());
    }

    #[test]
    fn test_installed_package_any_version_in_sync() {
        let host = Arc::new(MemoryHost::new().with_package("nginx", "1.18.0"));
        let (diff, _) = converge(&host, &Resource::new(ResourceKind::Package, "nginx"));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_pinned_version_upgrade() {
        let host = Arc::new(MemoryHost::new().with_package("nginx", "1.18.0"));
        let resource = Resource::new(ResourceKind::Package, "nginx").with_ensure("1.24.0");
        let (diff, result) = converge(&host, &resource);
        assert_eq!(diff.get("ensure").unwrap().from.as_deref(), Some("1.18.0"));
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(host.package_version("nginx").as_deref(), Some("1.24.0"));
    }

    #[test]
    fn test_remove_package() {
        let host = Arc::new(MemoryHost::new().with_package("apache2", "2.4"));
        let resource = Resource::new(ResourceKind::Package, "apache2").with_ensure("absent");
        let (_, result) = converge(&host, &resource);
        assert_eq!(result, ApplyResult::Removed);
        assert!(host.package_version("apache2").is_none());
    }

    #[test]
    fn test_invalid_ensure() {
        let host = Arc::new(MemoryHost::new());
        let backends = Backends::from_host(host);
        let ctx = ApplyContext::new(&backends, false);
        let resource = Resource::new(ResourceKind::Package, "nginx").with_ensure("running");
        assert!(PackageProvider.desired_state(&resource, &ctx).is_err());
    }
}
