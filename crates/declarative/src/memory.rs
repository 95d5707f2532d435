//! In-memory host for tests and dry experiments
//!
//! [`MemoryHost`] implements every backend trait against plain maps and
//! records each mutation in a journal (`install nginx`, `write /etc/motd`,
//! `restart nginx`, ...). Any journal entry can be made to fail with
//! [`MemoryHost::fail_on`].

use crate::context::{
    BooleanBackend, CommandRunner, FileKind, FileStat, FileSystem, PackageBackend, ServiceBackend,
    ServiceStatus,
};
use crate::error::{ProviderError, ProviderResult};
use crate::types::CommandOutput;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Version reported for packages installed without a pin
pub const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
    Symlink(PathBuf),
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    uid: u32,
    gid: u32,
    mode: u32,
}

#[derive(Debug, Default)]
struct State {
    packages: BTreeMap<String, String>,
    services: BTreeMap<String, ServiceStatus>,
    files: BTreeMap<PathBuf, Entry>,
    users: BTreeMap<String, u32>,
    groups: BTreeMap<String, u32>,
    booleans: BTreeMap<String, bool>,
    commands: BTreeMap<String, bool>,
    failures: BTreeSet<String>,
    journal: Vec<String>,
}

impl State {
    /// Record a mutation, or fail it if it was marked to fail
    fn record(&mut self, entry: String) -> ProviderResult<()> {
        if self.failures.contains(&entry) {
            return Err(ProviderError::backend(entry, "injected failure"));
        }
        self.journal.push(entry);
        Ok(())
    }

    fn entry_mut(&mut self, path: &Path) -> ProviderResult<&mut Entry> {
        self.files
            .get_mut(path)
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> ProviderError {
    ProviderError::backend(
        format!("access {}", path.display()),
        "no such file or directory",
    )
}

/// A host that lives entirely in memory
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(self, path: &str, node: Node, mode: u32) -> Self {
        self.lock().files.insert(
            PathBuf::from(path),
            Entry {
                node,
                uid: 0,
                gid: 0,
                mode,
            },
        );
        self
    }

    pub fn with_package(self, name: &str, version: &str) -> Self {
        self.lock().packages.insert(name.into(), version.into());
        self
    }

    pub fn with_service(self, name: &str, running: bool, enabled: bool) -> Self {
        self.lock()
            .services
            .insert(name.into(), ServiceStatus { running, enabled });
        self
    }

    /// A regular file owned by root with mode 0644
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, Node::File(content.as_bytes().to_vec()), 0o644)
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.insert(path, Node::Directory, 0o755)
    }

    pub fn with_symlink(self, path: &str, target: &str) -> Self {
        self.insert(path, Node::Symlink(PathBuf::from(target)), 0o777)
    }

    pub fn with_user(self, name: &str, uid: u32) -> Self {
        self.lock().users.insert(name.into(), uid);
        self
    }

    pub fn with_group(self, name: &str, gid: u32) -> Self {
        self.lock().groups.insert(name.into(), gid);
        self
    }

    pub fn with_boolean(self, name: &str, value: bool) -> Self {
        self.lock().booleans.insert(name.into(), value);
        self
    }

    /// Set whether a shell command succeeds (unknown commands succeed)
    pub fn with_command(self, command: &str, success: bool) -> Self {
        self.lock().commands.insert(command.into(), success);
        self
    }

    /// Make the mutation with this journal entry fail
    pub fn fail_on(self, entry: &str) -> Self {
        self.lock().failures.insert(entry.into());
        self
    }

    pub fn package_version(&self, name: &str) -> Option<String> {
        self.lock().packages.get(name).cloned()
    }

    pub fn service_status(&self, name: &str) -> ServiceStatus {
        self.lock().services.get(name).copied().unwrap_or_default()
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.lock().booleans.get(name).copied()
    }

    /// Content of a regular file, lossily decoded
    pub fn file_content(&self, path: &str) -> Option<String> {
        match &self.lock().files.get(Path::new(path))?.node {
            Node::File(content) => Some(String::from_utf8_lossy(content).into_owned()),
            _ => None,
        }
    }

    pub fn file_stat(&self, path: &str) -> Option<FileStat> {
        self.lock().files.get(Path::new(path)).map(stat_of)
    }

    pub fn link_target(&self, path: &str) -> Option<PathBuf> {
        match &self.lock().files.get(Path::new(path))?.node {
            Node::Symlink(target) => Some(target.clone()),
            _ => None,
        }
    }

    /// Every mutation and command so far, in order
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn journal_count(&self, entry: &str) -> usize {
        self.lock().journal.iter().filter(|e| *e == entry).count()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }
}

fn stat_of(entry: &Entry) -> FileStat {
    FileStat {
        kind: match entry.node {
            Node::File(_) => FileKind::File,
            Node::Directory => FileKind::Directory,
            Node::Symlink(_) => FileKind::Symlink,
        },
        uid: entry.uid,
        gid: entry.gid,
        mode: entry.mode,
    }
}

impl PackageBackend for MemoryHost {
    fn installed_version(&self, name: &str) -> ProviderResult<Option<String>> {
        Ok(self.package_version(name))
    }

    fn install(&self, name: &str, version: Option<&str>) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("install {name}"))?;
        state
            .packages
            .insert(name.into(), version.unwrap_or(DEFAULT_VERSION).into());
        Ok(())
    }

    fn remove(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("remove {name}"))?;
        state.packages.remove(name);
        Ok(())
    }
}

impl ServiceBackend for MemoryHost {
    fn status(&self, name: &str) -> ProviderResult<ServiceStatus> {
        Ok(self.service_status(name))
    }

    fn start(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("start {name}"))?;
        state.services.entry(name.into()).or_default().running = true;
        Ok(())
    }

    fn stop(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("stop {name}"))?;
        state.services.entry(name.into()).or_default().running = false;
        Ok(())
    }

    fn enable(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("enable {name}"))?;
        state.services.entry(name.into()).or_default().enabled = true;
        Ok(())
    }

    fn disable(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("disable {name}"))?;
        state.services.entry(name.into()).or_default().enabled = false;
        Ok(())
    }

    fn restart(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("restart {name}"))?;
        state.services.entry(name.into()).or_default().running = true;
        Ok(())
    }

    fn reload(&self, name: &str) -> ProviderResult<()> {
        self.lock().record(format!("reload {name}"))
    }
}

impl FileSystem for MemoryHost {
    fn stat(&self, path: &Path) -> ProviderResult<Option<FileStat>> {
        Ok(self.lock().files.get(path).map(stat_of))
    }

    fn read(&self, path: &Path) -> ProviderResult<Vec<u8>> {
        match self.lock().files.get(path).map(|e| &e.node) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(_) => Err(ProviderError::backend(
                format!("read {}", path.display()),
                "not a regular file",
            )),
            None => Err(not_found(path)),
        }
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("write {}", path.display()))?;
        let (uid, gid, mode) = match state.files.get(path) {
            Some(Entry {
                node: Node::Directory,
                ..
            }) => {
                return Err(ProviderError::backend(
                    format!("write {}", path.display()),
                    "is a directory",
                ));
            }
            Some(existing) => (existing.uid, existing.gid, existing.mode),
            None => (0, 0, 0o644),
        };
        state.files.insert(
            path.to_path_buf(),
            Entry {
                node: Node::File(content.to_vec()),
                uid,
                gid,
                mode,
            },
        );
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("mkdir {}", path.display()))?;
        if state.files.contains_key(path) {
            return Err(ProviderError::backend(
                format!("mkdir {}", path.display()),
                "file exists",
            ));
        }
        state.files.insert(
            path.to_path_buf(),
            Entry {
                node: Node::Directory,
                uid: 0,
                gid: 0,
                mode: 0o755,
            },
        );
        Ok(())
    }

    fn remove(&self, path: &Path) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("rm {}", path.display()))?;
        let has_children = state
            .files
            .keys()
            .any(|p| p != path && p.starts_with(path));
        if has_children {
            return Err(ProviderError::backend(
                format!("rm {}", path.display()),
                "directory not empty",
            ));
        }
        state.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("chmod {}", path.display()))?;
        state.entry_mut(path)?.mode = mode;
        Ok(())
    }

    fn set_owner(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("chown {}", path.display()))?;
        let entry = state.entry_mut(path)?;
        if let Some(uid) = uid {
            entry.uid = uid;
        }
        if let Some(gid) = gid {
            entry.gid = gid;
        }
        Ok(())
    }

    fn read_link(&self, path: &Path) -> ProviderResult<PathBuf> {
        match self.lock().files.get(path).map(|e| &e.node) {
            Some(Node::Symlink(target)) => Ok(target.clone()),
            Some(_) => Err(ProviderError::backend(
                format!("readlink {}", path.display()),
                "not a symlink",
            )),
            None => Err(not_found(path)),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> ProviderResult<()> {
        let mut state = self.lock();
        state.record(format!("symlink {}", link.display()))?;
        if state.files.contains_key(link) {
            return Err(ProviderError::backend(
                format!("symlink {}", link.display()),
                "file exists",
            ));
        }
        state.files.insert(
            link.to_path_buf(),
            Entry {
                node: Node::Symlink(target.to_path_buf()),
                uid: 0,
                gid: 0,
                mode: 0o777,
            },
        );
        Ok(())
    }

    fn user_id(&self, name: &str) -> ProviderResult<Option<u32>> {
        Ok(self.lock().users.get(name).copied())
    }

    fn group_id(&self, name: &str) -> ProviderResult<Option<u32>> {
        Ok(self.lock().groups.get(name).copied())
    }
}

impl BooleanBackend for MemoryHost {
    fn get(&self, name: &str) -> ProviderResult<Option<bool>> {
        Ok(self.boolean(name))
    }

    fn set(&self, name: &str, value: bool, persistent: bool) -> ProviderResult<()> {
        let mut state = self.lock();
        let flag = if persistent { "-P " } else { "" };
        let word = if value { "on" } else { "off" };
        state.record(format!("setsebool {flag}{name} {word}"))?;
        state.booleans.insert(name.into(), value);
        Ok(())
    }
}

impl CommandRunner for MemoryHost {
    fn run(&self, command: &str, _cwd: Option<&Path>) -> ProviderResult<CommandOutput> {
        let mut state = self.lock();
        state.record(format!("run {command}"))?;
        let success = state.commands.get(command).copied().unwrap_or(true);
        Ok(CommandOutput {
            stdout: Vec::new(),
            stderr: if success {
                Vec::new()
            } else {
                format!("{command}: exit status 1").into_bytes()
            },
            success,
        })
    }
}
