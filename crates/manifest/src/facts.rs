//! Host facts - read-only data about the target host

use crate::error::{CompileError, Result};
use crate::params::{parse_raw_value, toml_to_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const OS_FAMILY: &str = "os_family";
pub const OS_RELEASE: &str = "os_release";
pub const PROCESSOR_COUNT: &str = "processor_count";
pub const SELINUX_ENFORCING: &str = "selinux_enforcing";
pub const HOSTNAME: &str = "hostname";
pub const ARCHITECTURE: &str = "architecture";

/// Facts about the host a catalog is compiled for
///
/// Compilation only reads them; they are exposed to conditions and
/// templates as `facts.<name>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostFacts {
    values: BTreeMap<String, Value>,
}

impl HostFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fact (builder style)
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn os_family(&self) -> Option<&str> {
        self.get(OS_FAMILY).and_then(Value::as_str)
    }

    pub fn processor_count(&self) -> Option<u64> {
        self.get(PROCESSOR_COUNT).and_then(Value::as_u64)
    }

    pub fn selinux_enforcing(&self) -> bool {
        self.get(SELINUX_ENFORCING)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Apply a `name=value` override; the value is parsed as TOML, falling
    /// back to a plain string
    pub fn set_assignment(&mut self, assignment: &str) -> Result<()> {
        let (name, raw) = assignment.split_once('=').ok_or_else(|| CompileError::Parse {
            origin: "--fact".to_string(),
            message: format!("expected name=value, got '{assignment}'"),
        })?;
        let value = parse_raw_value(raw).unwrap_or_else(|| Value::String(raw.to_string()));
        self.set(name.trim(), value);
        Ok(())
    }

    /// Overlay every fact of `other`
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Read facts from a TOML file of `name = value` pairs
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn from_toml(text: &str, origin: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| CompileError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            values: table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// All facts as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
