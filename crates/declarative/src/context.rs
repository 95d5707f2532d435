//! Apply context and backend traits
//!
//! These traits allow the declarative crate to drive a host without
//! depending on specific package managers, init systems or filesystems.
//! The binary wires in real implementations; tests use
//! [`crate::memory::MemoryHost`].

use crate::error::ProviderResult;
use crate::report::ResourceReport;
use crate::types::CommandOutput;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Package manager operations
pub trait PackageBackend: Send + Sync {
    /// Installed version of a package, or `None` if it is not installed
    fn installed_version(&self, name: &str) -> ProviderResult<Option<String>>;

    /// Install a package, optionally pinned to a version
    fn install(&self, name: &str, version: Option<&str>) -> ProviderResult<()>;

    /// Remove a package
    fn remove(&self, name: &str) -> ProviderResult<()>;
}

/// Observed state of a system service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub enabled: bool,
}

/// Init system operations
pub trait ServiceBackend: Send + Sync {
    fn status(&self, name: &str) -> ProviderResult<ServiceStatus>;
    fn start(&self, name: &str) -> ProviderResult<()>;
    fn stop(&self, name: &str) -> ProviderResult<()>;
    fn enable(&self, name: &str) -> ProviderResult<()>;
    fn disable(&self, name: &str) -> ProviderResult<()>;
    fn restart(&self, name: &str) -> ProviderResult<()>;
    fn reload(&self, name: &str) -> ProviderResult<()>;
}

/// What kind of node a path is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Metadata of a path, without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub uid: u32,
    pub gid: u32,
    /// Permission bits only (e.g. `0o644`)
    pub mode: u32,
}

/// Filesystem operations
///
/// `write_atomic` must replace the file in one step (write to a sibling
/// temporary file, then rename) and keep the owner and mode of the file it
/// replaces.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> ProviderResult<Option<FileStat>>;
    fn read(&self, path: &Path) -> ProviderResult<Vec<u8>>;
    fn write_atomic(&self, path: &Path, content: &[u8]) -> ProviderResult<()>;
    fn create_dir(&self, path: &Path) -> ProviderResult<()>;
    /// Remove a file, symlink or empty directory
    fn remove(&self, path: &Path) -> ProviderResult<()>;
    fn set_mode(&self, path: &Path, mode: u32) -> ProviderResult<()>;
    fn set_owner(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> ProviderResult<()>;
    fn read_link(&self, path: &Path) -> ProviderResult<PathBuf>;
    fn symlink(&self, target: &Path, link: &Path) -> ProviderResult<()>;
    fn user_id(&self, name: &str) -> ProviderResult<Option<u32>>;
    fn group_id(&self, name: &str) -> ProviderResult<Option<u32>>;
}

/// SELinux-style boolean settings
pub trait BooleanBackend: Send + Sync {
    /// Current value, or `None` if the boolean does not exist
    fn get(&self, name: &str) -> ProviderResult<Option<bool>>;

    /// Set a value; `persistent` makes it survive reboots
    fn set(&self, name: &str, value: bool, persistent: bool) -> ProviderResult<()>;
}

/// Shell command execution
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, cwd: Option<&Path>) -> ProviderResult<CommandOutput>;
}

/// The set of backends providers act through
#[derive(Clone)]
pub struct Backends {
    pub packages: Arc<dyn PackageBackend>,
    pub services: Arc<dyn ServiceBackend>,
    pub files: Arc<dyn FileSystem>,
    pub booleans: Arc<dyn BooleanBackend>,
    pub commands: Arc<dyn CommandRunner>,
}

impl Backends {
    /// Use one host object for every backend
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: PackageBackend + ServiceBackend + FileSystem + BooleanBackend + CommandRunner + 'static,
    {
        Self {
            packages: host.clone(),
            services: host.clone(),
            files: host.clone(),
            booleans: host.clone(),
            commands: host,
        }
    }
}

/// Context passed to provider operations
pub struct ApplyContext<'a> {
    /// Whether this is a noop run (observe only, no changes)
    pub noop: bool,
    pub backends: &'a Backends,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(backends: &'a Backends, noop: bool) -> Self {
        Self { noop, backends }
    }
}

/// Cooperative cancellation for a run
///
/// Cancelling never interrupts a resource that already started; it only
/// prevents pending resources from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback for execution operations
///
/// Called from worker threads when running with more than one job.
pub trait ProgressCallback: Send + Sync {
    /// Called once before the first resource
    fn on_run_start(&self, total: usize);

    /// Called when starting to converge a single resource
    fn on_resource_start(&self, id: &str);

    /// Called when a resource reached its final status
    fn on_resource_complete(&self, report: &ResourceReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&self, _total: usize) {}
    fn on_resource_start(&self, _id: &str) {}
    fn on_resource_complete(&self, _report: &ResourceReport) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
