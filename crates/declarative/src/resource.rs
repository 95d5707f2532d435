//! Resource model for declarative state management
//!
//! A [`Resource`] is a named, typed unit of desired state. It carries no
//! behavior of its own: providers (see [`crate::provider`]) translate it into
//! observations and mutations of the host.

use crate::types::{Ensure, ResourceKind, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A declared resource
///
/// # Example
///
/// ```
/// use declarative::{Ensure, Resource, ResourceKind};
///
/// let conf = Resource::new(ResourceKind::File, "/etc/nginx/nginx.conf")
///     .with_property("content", "worker_processes 4;\n")
///     .with_property("mode", "0644")
///     .requires("Package[nginx]".parse().unwrap())
///     .notifies("Service[nginx]".parse().unwrap());
///
/// assert_eq!(conf.ensure, Ensure::Present);
/// assert_eq!(conf.to_string(), "File[/etc/nginx/nginx.conf]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub title: String,
    pub ensure: Ensure,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribe: Vec<ResourceRef>,
}

impl Resource {
    /// Create a resource with the default `ensure` for its kind
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            ensure: kind.default_ensure(),
            properties: BTreeMap::new(),
            aliases: BTreeSet::new(),
            require: Vec::new(),
            before: Vec::new(),
            notify: Vec::new(),
            subscribe: Vec::new(),
        }
    }

    pub fn with_ensure(mut self, ensure: impl Into<Ensure>) -> Self {
        self.ensure = ensure.into();
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn requires(mut self, target: ResourceRef) -> Self {
        self.require.push(target);
        self
    }

    pub fn before(mut self, target: ResourceRef) -> Self {
        self.before.push(target);
        self
    }

    pub fn notifies(mut self, target: ResourceRef) -> Self {
        self.notify.push(target);
        self
    }

    pub fn subscribes(mut self, target: ResourceRef) -> Self {
        self.subscribe.push(target);
        self
    }

    /// Reference to this resource by its title
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.title.clone())
    }

    /// Look up a property value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Interpret a property as a boolean flag
    ///
    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`. Missing or
    /// unrecognized values yield `default`.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.property(key).map(str::trim) {
            Some("true" | "yes" | "on" | "1") => true,
            Some("false" | "no" | "off" | "0") => false,
            _ => default,
        }
    }

    /// Check whether this resource answers to `name` (title or alias)
    pub fn answers_to(&self, name: &str) -> bool {
        self.title == name || self.aliases.contains(name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.title)
    }
}
