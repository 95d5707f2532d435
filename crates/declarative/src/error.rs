//! Error types for the declarative crate
//!
//! Catalog and graph errors are fatal: they are raised before any host
//! mutation. Provider errors are local to a single resource and end up in
//! the convergence report instead of aborting the run.

use thiserror::Error;

/// Errors that abort a run before convergence starts
#[derive(Debug, Error)]
pub enum Error {
    /// Two resources share the same kind and title
    #[error("duplicate resource {0}")]
    DuplicateResource(String),

    /// An alias collides with another resource's title or alias
    #[error("alias '{alias}' of {resource} collides with {existing}")]
    AliasCollision {
        alias: String,
        resource: String,
        existing: String,
    },

    /// A relationship names a resource that is not in the catalog
    #[error("{from} references {reference}, which is not in the catalog")]
    UnresolvedReference { from: String, reference: String },

    /// The relationship graph is not acyclic
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle {
        /// Every resource on the cycle, with the first repeated at the end
        path: Vec<String>,
    },

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Whether this is a cycle error
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

/// A failure while observing, converging or refreshing a single resource
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// A backend call failed (command exited non-zero, I/O error, ...)
    #[error("{operation} failed: {message}")]
    Backend { operation: String, message: String },

    /// The resource declaration cannot be acted upon
    #[error("invalid resource: {0}")]
    Invalid(String),

    /// No provider is registered for the resource kind
    #[error("no provider for resource type {0}")]
    NoProvider(String),
}

impl ProviderError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::backend("I/O", err.to_string())
    }
}

/// Result type for catalog and graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for provider and backend operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
