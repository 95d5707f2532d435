pub mod apply;
pub mod compile;
pub mod facts;
pub mod graph;
pub mod history;

use anyhow::{Context as _, Result};
use declarative::Catalog;
use manifest::{HostFacts, Manifest, ParamInputs};

use crate::Context;
use crate::cli::CompileArgs;

/// A compiled catalog and the facts it was compiled against
pub struct Compiled {
    pub catalog: Catalog,
    pub facts: HostFacts,
}

/// Resolve facts and parameters, load the manifest and compile it
pub fn compile_catalog(ctx: &Context, args: &CompileArgs) -> Result<Compiled> {
    let facts = crate::facts::resolve(&ctx.config, args.facts_file.as_deref(), &args.facts)?;

    let mut inputs = match &args.params_file {
        Some(path) => ParamInputs::from_file(path)?,
        None => ParamInputs::new(),
    };
    for assignment in &args.params {
        inputs.set_assignment(assignment)?;
    }

    let class = Manifest::load(&args.manifest)?;
    let catalog = manifest::compile(&class, &inputs, &facts)
        .with_context(|| format!("Failed to compile {}", args.manifest.display()))?;
    log::info!(
        "Compiled {} resources and {} relationships from {}",
        catalog.len(),
        catalog.relationships().len(),
        args.manifest.display()
    );

    Ok(Compiled { catalog, facts })
}
