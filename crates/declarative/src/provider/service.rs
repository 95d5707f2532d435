//! Service provider - run state, boot enablement and refresh

use super::{Provider, host_name};
use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, Ensure, RefreshOutcome, ResourceKind, ResourceState};

/// How a service reacts to a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartAction {
    Restart,
    Reload,
}

/// Manages system services
///
/// Properties:
/// - `enable`: `true`/`false`, start at boot (unmanaged when absent)
/// - `restart_action`: `restart` (default) or `reload`, used on refresh
pub struct ServiceProvider;

impl ServiceProvider {
    fn wants_running(resource: &Resource) -> ProviderResult<bool> {
        match &resource.ensure {
            Ensure::Running | Ensure::Present => Ok(true),
            Ensure::Stopped | Ensure::Absent => Ok(false),
            other => Err(ProviderError::invalid(format!(
                "ensure '{other}' is not valid for a service"
            ))),
        }
    }

    fn restart_action(resource: &Resource) -> ProviderResult<RestartAction> {
        match resource.property("restart_action") {
            None | Some("restart") => Ok(RestartAction::Restart),
            Some("reload") => Ok(RestartAction::Reload),
            Some(other) => Err(ProviderError::invalid(format!(
                "restart_action must be 'restart' or 'reload', got '{other}'"
            ))),
        }
    }
}

fn run_state(running: bool) -> &'static str {
    if running { "running" } else { "stopped" }
}

impl Provider for ServiceProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        let status = ctx.backends.services.status(host_name(resource))?;
        Ok(ResourceState::new(run_state(status.running)).with("enable", status.enabled.to_string()))
    }

    fn desired_state(
        &self,
        resource: &Resource,
        _ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        Self::restart_action(resource)?;
        let mut state = ResourceState::new(run_state(Self::wants_running(resource)?));
        if resource.property("enable").is_some() {
            state = state.with("enable", resource.flag("enable", true).to_string());
        }
        Ok(state)
    }

    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult> {
        let name = host_name(resource);
        let services = &ctx.backends.services;

        if diff.touches("ensure") {
            if Self::wants_running(resource)? {
                log::info!("starting service {name}");
                services.start(name)?;
            } else {
                log::info!("stopping service {name}");
                services.stop(name)?;
            }
        }

        if diff.touches("enable") {
            if resource.flag("enable", true) {
                log::info!("enabling service {name}");
                services.enable(name)?;
            } else {
                log::info!("disabling service {name}");
                services.disable(name)?;
            }
        }

        Ok(if diff.is_empty() {
            ApplyResult::NoChange
        } else {
            ApplyResult::Modified
        })
    }

    fn refreshable(&self) -> bool {
        true
    }

    fn refresh(
        &self,
        resource: &Resource,
        own_diff: Option<&ResourceDiff>,
        ctx: &ApplyContext,
    ) -> ProviderResult<RefreshOutcome> {
        if !Self::wants_running(resource)? {
            return Ok(RefreshOutcome::Skipped {
                reason: "service is meant to be stopped".to_string(),
            });
        }
        if own_diff.is_some_and(|d| d.touches("ensure")) {
            return Ok(RefreshOutcome::Skipped {
                reason: "service was started in this run".to_string(),
            });
        }

        let name = host_name(resource);
        match Self::restart_action(resource)? {
            RestartAction::Restart => {
                log::info!("restarting service {name}");
                ctx.backends.services.restart(name)?;
                Ok(RefreshOutcome::Restarted)
            }
            RestartAction::Reload => {
                log::info!("reloading service {name}");
                ctx.backends.services.reload(name)?;
                Ok(RefreshOutcome::Reloaded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Backends, ServiceStatus};
    use crate::memory::MemoryHost;
    use std::sync::Arc;

    fn setup(host: MemoryHost) -> (Arc<MemoryHost>, Backends) {
        let host = Arc::new(host);
        let backends = Backends::from_host(host.clone());
        (host, backends)
    }

    #[test]
    fn test_start_and_enable() {
        let (host, backends) = setup(MemoryHost::new());
        let ctx = ApplyContext::new(&backends, false);
        let resource = Resource::new(ResourceKind::Service, "nginx").with_property("enable", "true");

        let current = ServiceProvider.current_state(&resource, &ctx).unwrap();
        let desired = ServiceProvider.desired_state(&resource, &ctx).unwrap();
        let diff = ResourceDiff::compute(&current, &desired);
        assert!(diff.touches("ensure"));
        assert!(diff.touches("enable"));

        let result = ServiceProvider.converge(&resource, &diff, &ctx).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(
            host.service_status("nginx"),
            ServiceStatus {
                running: true,
                enabled: true
            }
        );
    }

    #[test]
    fn test_enable_unmanaged_when_not_declared() {
        let (_, backends) = setup(MemoryHost::new().with_service("nginx", true, false));
        let ctx = ApplyContext::new(&backends, false);
        let resource = Resource::new(ResourceKind::Service, "nginx");
        let current = ServiceProvider.current_state(&resource, &ctx).unwrap();
        let desired = ServiceProvider.desired_state(&resource, &ctx).unwrap();
        assert!(ResourceDiff::compute(&current, &desired).is_empty());
    }

    #[test]
    fn test_refresh_uses_restart_action() {
        let (host, backends) = setup(MemoryHost::new().with_service("nginx", true, true));
        let ctx = ApplyContext::new(&backends, false);

        let restart = Resource::new(ResourceKind::Service, "nginx");
        assert_eq!(
            ServiceProvider.refresh(&restart, None, &ctx).unwrap(),
            RefreshOutcome::Restarted
        );

        let reload = restart.clone().with_property("restart_action", "reload");
        assert_eq!(
            ServiceProvider.refresh(&reload, None, &ctx).unwrap(),
            RefreshOutcome::Reloaded
        );
        assert_eq!(host.journal_count("restart nginx"), 1);
        assert_eq!(host.journal_count("reload nginx"), 1);
    }

    #[test]
    fn test_refresh_skipped_after_start() {
        let (host, backends) = setup(MemoryHost::new());
        let ctx = ApplyContext::new(&backends, false);
        let resource = Resource::new(ResourceKind::Service, "nginx");
        let diff = ResourceDiff::compute(
            &ResourceState::new("stopped"),
            &ResourceState::new("running"),
        );
        let outcome = ServiceProvider.refresh(&resource, Some(&diff), &ctx).unwrap();
        assert!(matches!(outcome, RefreshOutcome::Skipped { .. }));
        assert_eq!(host.journal_count("restart nginx"), 0);
    }

    #[test]
    fn test_invalid_restart_action() {
        let (_, backends) = setup(MemoryHost::new());
        let ctx = ApplyContext::new(&backends, false);
        let resource =
            Resource::new(ResourceKind::Service, "nginx").with_property("restart_action", "bounce");
        assert!(ServiceProvider.desired_state(&resource, &ctx).is_err());
    }
}
