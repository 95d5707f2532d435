//! # Declarative
//!
//! An engine for converging a host to a declared set of resources.
//!
//! ## Core Concepts
//!
//! - **Resource**: a typed, titled declaration of desired state (package,
//!   service, file, boolean, module, exec)
//! - **Catalog**: the resources of one run plus their relationships
//! - **Graph**: the catalog with every reference resolved, checked for
//!   cycles and ordered deterministically
//! - **Provider**: observes and converges one kind of resource through
//!   backend traits
//! - **Executor**: walks the graph, propagates failures, coalesces refresh
//!   notifications and produces a [`ConvergenceReport`]
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     Backends, CancelToken, Catalog, ExecuteOptions, NoProgress, ProviderRegistry, Resource,
//!     ResourceKind, apply, build_graph, memory::MemoryHost,
//! };
//! use std::sync::Arc;
//!
//! let mut catalog = Catalog::new("web");
//! catalog.add(Resource::new(ResourceKind::Package, "nginx"))?;
//! catalog.add(
//!     Resource::new(ResourceKind::Service, "nginx").requires("Package[nginx]".parse()?),
//! )?;
//!
//! let graph = build_graph(&catalog)?;
//! let host = Arc::new(MemoryHost::new());
//! let report = apply(
//!     &graph,
//!     &ProviderRegistry::standard(),
//!     &Backends::from_host(host.clone()),
//!     &ExecuteOptions::default(),
//!     &NoProgress,
//!     &CancelToken::new(),
//! )?;
//!
//! assert!(report.success());
//! assert_eq!(host.journal(), vec!["install nginx", "start nginx"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Backend Traits
//!
//! Providers never touch the host directly. They go through:
//!
//! - [`PackageBackend`]: package manager
//! - [`ServiceBackend`]: init system
//! - [`FileSystem`]: files, directories, symlinks and ownership
//! - [`BooleanBackend`]: SELinux-style booleans
//! - [`CommandRunner`]: shell commands
//!
//! The binary wires in real implementations; [`memory::MemoryHost`]
//! implements all of them in memory.

pub mod catalog;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod memory;
pub mod provider;
pub mod report;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use catalog::{Catalog, Relationship};
pub use context::{
    ApplyContext, Backends, BooleanBackend, CancelToken, CommandRunner, FileKind, FileStat,
    FileSystem, NoProgress, PackageBackend, ProgressCallback, ServiceBackend, ServiceStatus,
};
pub use diff::{PropertyChange, ResourceDiff};
pub use error::{Error, ProviderError, ProviderResult, Result};
pub use executor::apply;
pub use graph::{Edge, EdgeKind, Graph, build_graph};
pub use provider::{Provider, ProviderRegistry};
pub use report::{ConvergenceReport, ResourceReport, ResourceStatus, RunSummary};
pub use resource::Resource;
pub use types::{
    ApplyResult, CommandOutput, Ensure, ExecuteOptions, RefreshOutcome, RelationshipKind,
    ResourceKind, ResourceRef, ResourceState,
};
