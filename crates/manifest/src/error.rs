//! Error types for the manifest crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or compiling a manifest
///
/// Every variant is fatal and raised before the host is touched.
#[derive(Error, Debug)]
pub enum CompileError {
    /// IO error reading the manifest or one of its templates
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest or a parameter file is not valid TOML
    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    /// A value was supplied for a parameter the manifest does not declare
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A required parameter has no value from any source
    #[error("parameter '{0}' has no value and no default")]
    MissingParameter(String),

    /// A parameter value does not match the declared type
    #[error("parameter '{name}' must be {expected}, got {found}")]
    ParameterType {
        name: String,
        expected: String,
        found: String,
    },

    /// A parameter value is not in its allowed set
    #[error("parameter '{name}' must be one of {allowed}, got {value}")]
    NotAllowed {
        name: String,
        value: String,
        allowed: String,
    },

    /// A parameter name clashes with a name the compiler binds itself
    #[error("parameter name '{0}' is reserved")]
    ReservedName(String),

    /// A parameter default refers to a fact that was not supplied
    #[error("parameter '{param}' defaults to unknown fact '{fact}'")]
    UnknownFact { param: String, fact: String },

    /// A `when` condition could not be parsed or evaluated
    #[error("{origin}: condition '{expression}': {message}")]
    Condition {
        origin: String,
        expression: String,
        message: String,
    },

    /// A `for_each` does not name a list or map
    #[error("{origin}: for_each '{expression}': {message}")]
    ForEach {
        origin: String,
        expression: String,
        message: String,
    },

    /// Template rendering failed (undefined variable, syntax error, ...)
    #[error("{origin}: template error: {message}")]
    Template { origin: String, message: String },

    /// A resource declaration is malformed
    #[error("{origin}: {message}")]
    InvalidResource { origin: String, message: String },

    /// A relationship reference does not have the `Kind[title]` shape
    #[error("{origin}: {message}")]
    InvalidReference { origin: String, message: String },

    /// Duplicate title or alias collision after expansion
    #[error(transparent)]
    Catalog(#[from] declarative::Error),
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, CompileError>;
