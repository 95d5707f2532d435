//! Boolean provider - SELinux-style on/off host settings

use super::{Provider, host_name};
use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, ResourceKind, ResourceState};

/// Manages host booleans
///
/// Properties:
/// - `value`: `on`/`off` (also `true`/`false`, `1`/`0`)
/// - `persistent`: survive reboots, default `true`
pub struct BooleanProvider;

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

impl BooleanProvider {
    fn wanted(resource: &Resource) -> ProviderResult<bool> {
        match resource.property("value") {
            Some("on" | "true" | "1" | "yes") => Ok(true),
            Some("off" | "false" | "0" | "no") => Ok(false),
            Some(other) => Err(ProviderError::invalid(format!(
                "boolean value must be 'on' or 'off', got '{other}'"
            ))),
            None => Err(ProviderError::invalid(format!(
                "{resource} has no 'value' property"
            ))),
        }
    }
}

impl Provider for BooleanProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Boolean
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        let name = host_name(resource);
        match ctx.backends.booleans.get(name)? {
            Some(value) => Ok(ResourceState::new("present").with("value", on_off(value))),
            None => Err(ProviderError::invalid(format!("boolean '{name}' does not exist"))),
        }
    }

    fn desired_state(
        &self,
        resource: &Resource,
        _ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        if resource.ensure.is_absent() {
            return Err(ProviderError::invalid("booleans cannot be absent"));
        }
        Ok(ResourceState::new("present").with("value", on_off(Self::wanted(resource)?)))
    }

    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult> {
        if !diff.touches("value") {
            return Ok(ApplyResult::NoChange);
        }
        let name = host_name(resource);
        let value = Self::wanted(resource)?;
        let persistent = resource.flag("persistent", true);
        log::info!("setting boolean {name} to {}", on_off(value));
        ctx.backends.booleans.set(name, value, persistent)?;
        Ok(ApplyResult::Modified)
    }
}
