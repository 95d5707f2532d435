//! Catalog - the compiled, concrete set of resources for one run

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::types::{RelationshipKind, ResourceKind, ResourceRef};
use serde::Serialize;
use std::collections::HashMap;

/// An explicit relationship declared outside of resource attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub source: ResourceRef,
    pub target: ResourceRef,
    pub kind: RelationshipKind,
}

impl Relationship {
    pub fn new(source: ResourceRef, target: ResourceRef, kind: RelationshipKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

/// Resources plus relationships, in declaration order
///
/// Enforces that `(kind, title)` is unique and that aliases never shadow
/// another resource. Once handed to the graph builder it is not modified.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub name: String,
    resources: Vec<Resource>,
    relationships: Vec<Relationship>,
    #[serde(skip)]
    names: HashMap<(ResourceKind, String), usize>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a resource, rejecting duplicates and alias collisions
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let key = (resource.kind, resource.title.clone());
        if let Some(&existing) = self.names.get(&key) {
            if self.resources[existing].title == resource.title {
                return Err(Error::DuplicateResource(resource.to_string()));
            }
            return Err(Error::AliasCollision {
                alias: resource.title.clone(),
                resource: resource.to_string(),
                existing: self.resources[existing].to_string(),
            });
        }

        for alias in &resource.aliases {
            if alias == &resource.title {
                continue;
            }
            if let Some(&existing) = self.names.get(&(resource.kind, alias.clone())) {
                return Err(Error::AliasCollision {
                    alias: alias.clone(),
                    resource: resource.to_string(),
                    existing: self.resources[existing].to_string(),
                });
            }
        }

        let index = self.resources.len();
        self.names.insert(key, index);
        for alias in &resource.aliases {
            self.names.insert((resource.kind, alias.clone()), index);
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Add an explicit relationship
    pub fn relate(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    /// Find the index of the resource a reference points at
    pub fn resolve(&self, reference: &ResourceRef) -> Option<usize> {
        self.names
            .get(&(reference.kind, reference.title.clone()))
            .copied()
    }

    /// Look up a resource by reference
    pub fn get(&self, reference: &ResourceRef) -> Option<&Resource> {
        self.resolve(reference).map(|i| &self.resources[i])
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources of one kind, in declaration order
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(s: &str) -> ResourceRef {
        s.parse().unwrap()
    }

    #[test]
    fn test_duplicate_title_rejected() {
        let mut catalog = Catalog::new("test");
        catalog
            .add(Resource::new(ResourceKind::Package, "nginx"))
            .unwrap();
        let err = catalog
            .add(Resource::new(ResourceKind::Package, "nginx"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(ref id) if id == "Package[nginx]"));
    }

    #[test]
    fn test_same_title_different_kind_allowed() {
        let mut catalog = Catalog::new("test");
        catalog
            .add(Resource::new(ResourceKind::Package, "nginx"))
            .unwrap();
        catalog
            .add(Resource::new(ResourceKind::Service, "nginx"))
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_alias_collisions() {
        let mut catalog = Catalog::new("test");
        catalog
            .add(Resource::new(ResourceKind::Service, "nginx").with_alias("web"))
            .unwrap();

        // alias clashing with an existing alias
        let err = catalog
            .add(Resource::new(ResourceKind::Service, "httpd").with_alias("web"))
            .unwrap_err();
        assert!(matches!(err, Error::AliasCollision { .. }));

        // title clashing with an existing alias
        let err = catalog
            .add(Resource::new(ResourceKind::Service, "web"))
            .unwrap_err();
        assert!(matches!(err, Error::AliasCollision { .. }));

        // alias clashing with an existing title
        let err = catalog
            .add(Resource::new(ResourceKind::Service, "apache").with_alias("nginx"))
            .unwrap_err();
        assert!(matches!(err, Error::AliasCollision { .. }));
    }

    #[test]
    fn test_resolve_by_alias() {
        let mut catalog = Catalog::new("test");
        catalog
            .add(Resource::new(ResourceKind::Service, "nginx").with_alias("web"))
            .unwrap();
        assert_eq!(catalog.resolve(&reference("Service[web]")), Some(0));
        assert_eq!(catalog.resolve(&reference("Service[nginx]")), Some(0));
        assert_eq!(catalog.resolve(&reference("Package[web]")), None);
    }
}
