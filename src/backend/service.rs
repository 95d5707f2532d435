use super::{checked, failed};
use crate::runner;
use declarative::{ProviderResult, ServiceBackend, ServiceStatus};

/// systemd through `systemctl`
pub struct Systemd;

impl Systemd {
    /// `systemctl is-active` / `is-enabled` exit non-zero for the negative
    /// answer, so only the printed state matters.
    fn query(verb: &str, name: &str) -> ProviderResult<String> {
        let args = [verb, name];
        runner::capture("systemctl", &args)
            .map(|captured| captured.stdout)
            .map_err(|e| failed("systemctl", &args, &e))
    }
}

fn is_enabled_state(state: &str) -> bool {
    matches!(state, "enabled" | "enabled-runtime" | "alias")
}

impl ServiceBackend for Systemd {
    fn status(&self, name: &str) -> ProviderResult<ServiceStatus> {
        Ok(ServiceStatus {
            running: Self::query("is-active", name)? == "active",
            enabled: is_enabled_state(&Self::query("is-enabled", name)?),
        })
    }

    fn start(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["start", name]).map(drop)
    }

    fn stop(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["stop", name]).map(drop)
    }

    fn enable(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["enable", name]).map(drop)
    }

    fn disable(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["disable", name]).map(drop)
    }

    fn restart(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["restart", name]).map(drop)
    }

    fn reload(&self, name: &str) -> ProviderResult<()> {
        checked("systemctl", &["reload", name]).map(drop)
    }
}
