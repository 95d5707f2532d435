//! Module provider - enable or disable a module by symlink
//!
//! An enabled module is a symlink at `path` pointing to the module's
//! configuration at `target` (the `modules-enabled` / `modules-available`
//! layout).

use super::Provider;
use super::file::resource_path;
use crate::context::{ApplyContext, FileKind};
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, Ensure, ResourceKind, ResourceState};
use std::path::Path;

pub struct ModuleProvider;

impl ModuleProvider {
    fn wants_enabled(resource: &Resource) -> ProviderResult<bool> {
        match &resource.ensure {
            Ensure::Present => Ok(true),
            Ensure::Absent => Ok(false),
            other => Err(ProviderError::invalid(format!(
                "ensure '{other}' is not valid for a module"
            ))),
        }
    }

    fn target(resource: &Resource) -> ProviderResult<&str> {
        resource
            .property("target")
            .ok_or_else(|| ProviderError::invalid(format!("{resource} has no 'target' property")))
    }
}

impl Provider for ModuleProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Module
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        let link = resource_path(resource)?;
        let files = &ctx.backends.files;
        Ok(match files.stat(&link)? {
            None => ResourceState::absent(),
            Some(stat) if stat.kind == FileKind::Symlink => {
                let points_to = files.read_link(&link)?;
                ResourceState::new("present").with("target", points_to.to_string_lossy())
            }
            Some(stat) if stat.kind == FileKind::Directory => ResourceState::new("directory"),
            Some(_) => ResourceState::new("file"),
        })
    }

    fn desired_state(
        &self,
        resource: &Resource,
        _ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        resource_path(resource)?;
        if !Self::wants_enabled(resource)? {
            return Ok(ResourceState::absent());
        }
        Ok(ResourceState::new("present").with("target", Self::target(resource)?))
    }

    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult> {
        if diff.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        let link = resource_path(resource)?;
        let files = &ctx.backends.files;
        let found = diff.get("ensure").and_then(|c| c.from.as_deref());

        if matches!(found, Some("file" | "directory")) {
            return Err(ProviderError::invalid(format!(
                "{} exists and is not a symlink",
                link.display()
            )));
        }

        if !Self::wants_enabled(resource)? {
            log::info!("disabling module {}", resource.title);
            files.remove(&link)?;
            return Ok(ApplyResult::Removed);
        }

        let target = Self::target(resource)?;
        let created = found == Some("absent");
        if !created {
            log::debug!("replacing stale module link {}", link.display());
            files.remove(&link)?;
        }
        log::info!("enabling module {} ({} -> {target})", resource.title, link.display());
        files.symlink(Path::new(target), &link)?;

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }
}
