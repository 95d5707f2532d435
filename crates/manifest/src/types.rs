//! Manifest definition types and loading

use crate::error::{CompileError, Result};
use declarative::RelationshipKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A parsed manifest: one class with parameters, resources and relationships
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub class: ClassDef,

    #[serde(default)]
    pub params: BTreeMap<String, ParamDef>,

    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,

    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipDecl>,

    /// Template bodies keyed by the path used in `template = "..."`
    #[serde(skip)]
    pub templates: BTreeMap<String, String>,

    /// File the manifest was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The `[class]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "array")]
    List,
    #[serde(alias = "hash", alias = "table")]
    Map,
    #[default]
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Bool => "a boolean",
            Self::List => "a list",
            Self::Map => "a map",
            Self::Any => "any value",
        }
    }
}

/// A `[params.NAME]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDef {
    #[serde(default, rename = "type")]
    pub ty: ParamType,

    /// Static default
    #[serde(default)]
    pub default: Option<toml::Value>,

    /// Name of a host fact supplying the default
    #[serde(default)]
    pub default_fact: Option<String>,

    /// Defaults keyed by the `os_family` fact
    #[serde(default)]
    pub by_os_family: BTreeMap<String, toml::Value>,

    /// Resolve to null instead of failing when no value is found
    #[serde(default)]
    pub optional: bool,

    /// Allowed values
    #[serde(default, rename = "enum")]
    pub allowed: Option<Vec<toml::Value>>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A `[[resource]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    /// Resource kind, e.g. `package`
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub ensure: Option<String>,
    /// Condition; the resource is omitted when false
    #[serde(default)]
    pub when: Option<String>,
    /// Name of a list or map to expand over, bound as `item`
    #[serde(default)]
    pub for_each: Option<String>,
    /// Inline content
    #[serde(default)]
    pub content: Option<String>,
    /// Template file, relative to the manifest
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub subscribe: Vec<String>,
}

/// A `[[relationship]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipDecl {
    pub source: String,
    pub target: String,
    #[serde(default = "default_relationship_kind")]
    pub kind: RelationshipKind,
    #[serde(default)]
    pub when: Option<String>,
}

fn default_relationship_kind() -> RelationshipKind {
    RelationshipKind::Require
}

impl Manifest {
    /// Parse a manifest from TOML text; templates are not loaded
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_named(text, "manifest")
    }

    fn parse_named(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CompileError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load a manifest and every template it references
    ///
    /// Template paths are resolved relative to the manifest's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::parse_named(&text, &path.display().to_string())?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let wanted: Vec<String> = manifest
            .resources
            .iter()
            .filter_map(|r| r.template.clone())
            .collect();
        for name in wanted {
            if manifest.templates.contains_key(&name) {
                continue;
            }
            let template_path = base.join(&name);
            let body = std::fs::read_to_string(&template_path).map_err(|source| {
                CompileError::Io {
                    path: template_path.clone(),
                    source,
                }
            })?;
            log::debug!("loaded template {}", template_path.display());
            manifest.templates.insert(name, body);
        }

        manifest.source = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Register a template body under the name resources refer to it by
    pub fn with_template(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(name.into(), body.into());
        self
    }

    /// Name used in error messages
    pub fn origin(&self) -> String {
        self.source
            .as_ref()
            .map_or_else(|| self.class.name.clone(), |p| p.display().to_string())
    }
}
