//! Diff computation between observed and desired resource state

use crate::types::ResourceState;
use serde::{Deserialize, Serialize};

/// One attribute that differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// `ensure` or a property name
    pub name: String,
    /// Observed value, `None` when the attribute does not exist
    pub from: Option<String>,
    pub to: String,
}

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub changes: Vec<PropertyChange>,
}

impl ResourceDiff {
    /// Compare two states
    ///
    /// `ensure` is compared first. Properties are only compared when the
    /// desired state is not absent, and only for keys the desired state
    /// declares.
    pub fn compute(current: &ResourceState, desired: &ResourceState) -> Self {
        let mut changes = Vec::new();

        if current.ensure != desired.ensure {
            changes.push(PropertyChange {
                name: "ensure".to_string(),
                from: Some(current.ensure.clone()),
                to: desired.ensure.clone(),
            });
        }

        if !desired.is_absent() {
            for (name, wanted) in &desired.properties {
                let actual = current.properties.get(name);
                if actual != Some(wanted) {
                    changes.push(PropertyChange {
                        name: name.clone(),
                        from: actual.cloned(),
                        to: wanted.clone(),
                    });
                }
            }
        }

        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Check whether a given attribute differs
    pub fn touches(&self, name: &str) -> bool {
        self.changes.iter().any(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyChange> {
        self.changes.iter().find(|c| c.name == name)
    }

    /// Check if this diff creates something that did not exist
    pub fn is_addition(&self) -> bool {
        self.get("ensure")
            .is_some_and(|c| c.from.as_deref() == Some("absent") && c.to != "absent")
    }

    /// Check if this diff removes something
    pub fn is_removal(&self) -> bool {
        self.get("ensure")
            .is_some_and(|c| c.to == "absent" && c.from.as_deref() != Some("absent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_states_no_diff() {
        let state = ResourceState::new("present").with("mode", "0644");
        assert!(ResourceDiff::compute(&state, &state).is_empty());
    }

    #[test]
    fn test_unmanaged_properties_ignored() {
        let current = ResourceState::new("present")
            .with("mode", "0644")
            .with("owner", "0");
        let desired = ResourceState::new("present").with("mode", "0644");
        assert!(ResourceDiff::compute(&current, &desired).is_empty());
    }

    #[test]
    fn test_property_changes_listed() {
        let current = ResourceState::new("present").with("mode", "0600");
        let desired = ResourceState::new("present")
            .with("mode", "0644")
            .with("owner", "0");
        let diff = ResourceDiff::compute(&current, &desired);
        assert_eq!(diff.changes.len(), 2);
        assert!(diff.touches("mode"));
        assert_eq!(diff.get("owner").unwrap().from, None);
        assert!(!diff.touches("ensure"));
    }

    #[test]
    fn test_addition_and_removal() {
        let absent = ResourceState::absent();
        let present = ResourceState::new("present").with("mode", "0644");

        let add = ResourceDiff::compute(&absent, &present);
        assert!(add.is_addition());
        assert!(add.touches("mode"));

        let remove = ResourceDiff::compute(&present, &ResourceState::absent());
        assert!(remove.is_removal());
        assert_eq!(remove.changes.len(), 1);
    }
}
