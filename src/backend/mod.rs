//! Backends that act on the real host
//!
//! Each one implements a `declarative` backend trait by shelling out to the
//! host's own tools (`apt-get`, `dnf`, `systemctl`, `setsebool`) or through
//! `std::fs`.

mod commands;
mod filesystem;
mod package;
mod selinux;
mod service;

pub use commands::Shell;
pub use filesystem::LocalFs;
pub use package::{Apt, Rpm};
pub use selinux::SeBooleans;
pub use service::Systemd;

use crate::config::PackageManager;
use crate::runner;
use declarative::{Backends, PackageBackend, ProviderError, ProviderResult};
use std::sync::Arc;

/// Backends for this host
pub fn system(package_manager: PackageManager) -> Backends {
    let packages: Arc<dyn PackageBackend> = match package_manager {
        PackageManager::Apt => Arc::new(Apt),
        PackageManager::Dnf if !runner::command_exists("dnf") && runner::command_exists("yum") => {
            log::info!("dnf not found, using yum");
            Arc::new(Rpm::new("yum"))
        }
        PackageManager::Dnf => Arc::new(Rpm::new("dnf")),
        PackageManager::Yum => Arc::new(Rpm::new("yum")),
    };

    Backends {
        packages,
        services: Arc::new(Systemd),
        files: Arc::new(LocalFs),
        booleans: Arc::new(SeBooleans),
        commands: Arc::new(Shell),
    }
}

/// Run a command for a backend, mapping failures to [`ProviderError`]
fn checked(cmd: &str, args: &[&str]) -> ProviderResult<String> {
    runner::run_checked(cmd, args).map_err(|e| failed(cmd, args, &e))
}

fn failed(cmd: &str, args: &[&str], err: &anyhow::Error) -> ProviderError {
    ProviderError::backend(runner::describe(cmd, args), format!("{err:#}"))
}
