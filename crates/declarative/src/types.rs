//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::process::Output;
use std::str::FromStr;

/// Kind of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Package,
    Service,
    File,
    Boolean,
    Module,
    Exec,
}

impl ResourceKind {
    /// All kinds, in a stable order
    pub const ALL: [Self; 6] = [
        Self::Package,
        Self::Service,
        Self::File,
        Self::Boolean,
        Self::Module,
        Self::Exec,
    ];

    /// Capitalized name used in references, e.g. `Package[nginx]`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "Package",
            Self::Service => "Service",
            Self::File => "File",
            Self::Boolean => "Boolean",
            Self::Module => "Module",
            Self::Exec => "Exec",
        }
    }

    /// The `ensure` value a resource of this kind gets when none is declared
    pub fn default_ensure(&self) -> Ensure {
        match self {
            Self::Service => Ensure::Running,
            _ => Ensure::Present,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "package" => Ok(Self::Package),
            "service" => Ok(Self::Service),
            "file" => Ok(Self::File),
            "boolean" | "selboolean" => Ok(Self::Boolean),
            "module" => Ok(Self::Module),
            "exec" | "rawexec" => Ok(Self::Exec),
            other => Err(format!("unknown resource type '{other}'")),
        }
    }
}

/// Desired presence/run state of a resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Ensure {
    Present,
    Absent,
    Running,
    Stopped,
    Directory,
    /// Anything else, e.g. a package version
    Custom(String),
}

impl Ensure {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Directory => "directory",
            Self::Custom(value) => value,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Ensure {
    fn from(value: &str) -> Self {
        match value.trim() {
            "present" | "installed" | "file" => Self::Present,
            "absent" | "purged" => Self::Absent,
            "running" | "true" => Self::Running,
            "stopped" | "false" => Self::Stopped,
            "directory" => Self::Directory,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Ensure {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Ensure> for String {
    fn from(value: Ensure) -> Self {
        value.as_str().to_string()
    }
}

/// A reference to another resource, written `Kind[title]`
///
/// The title part may also be an alias of the target resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub title: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.title)
    }
}

impl FromStr for ResourceRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = s
            .split_once('[')
            .ok_or_else(|| format!("invalid reference '{s}': expected Kind[title]"))?;
        let title = rest
            .strip_suffix(']')
            .ok_or_else(|| format!("invalid reference '{s}': missing closing ']'"))?;
        if title.is_empty() {
            return Err(format!("invalid reference '{s}': empty title"));
        }
        let kind = kind.trim().parse::<ResourceKind>()?;
        Ok(Self::new(kind, title))
    }
}

impl TryFrom<String> for ResourceRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceRef> for String {
    fn from(value: ResourceRef) -> Self {
        value.to_string()
    }
}

/// Kind of a declared relationship between two resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    /// Source is applied before target
    Require,
    /// Ordering, and target is refreshed when source changed
    Notify,
    /// Inverse of notify: source subscribes to changes of target
    Subscribe,
}

/// Observed or desired state of a resource, as comparable strings
///
/// Providers normalize both sides into the same vocabulary so that the
/// diff is a plain comparison. Only properties present in the desired
/// state are managed; extra observed keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub ensure: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ResourceState {
    pub fn new(ensure: impl Into<String>) -> Self {
        Self {
            ensure: ensure.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn absent() -> Self {
        Self::new("absent")
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_absent(&self) -> bool {
        self.ensure == "absent"
    }
}

/// Result of converging a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
}

impl ApplyResult {
    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// What a refresh did to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Restarted,
    Reloaded,
    Executed,
    /// Noop run: the refresh would have happened
    WouldRefresh,
    /// Refresh was requested but had nothing to do
    Skipped { reason: String },
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub noop: bool,
    /// Number of parallel jobs; 1 means strictly sequential
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            noop: false,
            jobs: 1,
        }
    }
}

/// Output from a command run by a backend
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
