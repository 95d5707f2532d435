//! # Manifest
//!
//! Compiles parameterized TOML manifests into [`declarative::Catalog`]s.
//!
//! This crate provides functionality to:
//! - Load a manifest and the template files it references
//! - Resolve parameters from explicit values, host facts, OS-family
//!   defaults and static defaults
//! - Evaluate `when` conditions and expand `for_each` declarations
//! - Render every string attribute and template with tera
//!
//! ## Example
//!
//! ```
//! use manifest::{HostFacts, Manifest, ParamInputs, compile};
//!
//! let manifest = Manifest::parse(r#"
//! [class]
//! name = "motd"
//!
//! [params.message]
//! type = "string"
//! default = "hello"
//!
//! [[resource]]
//! type = "file"
//! title = "/etc/motd"
//! content = "{{ message }} from {{ facts.hostname }}\n"
//! "#)?;
//!
//! let facts = HostFacts::new().with("hostname", "web1");
//! let catalog = compile(&manifest, &ParamInputs::new(), &facts)?;
//! assert_eq!(
//!     catalog.resources()[0].property("content"),
//!     Some("hello from web1\n")
//! );
//! # Ok::<(), manifest::CompileError>(())
//! ```

pub mod compiler;
pub mod condition;
mod error;
pub mod facts;
pub mod params;
pub mod render;
mod types;

#[cfg(test)]
mod scenarios;

pub use compiler::compile;
pub use error::{CompileError, Result};
pub use facts::HostFacts;
pub use params::{ParamInput, ParamInputs, Params, resolve_params};
pub use types::{ClassDef, Manifest, ParamDef, ParamType, RelationshipDecl, ResourceDecl};
