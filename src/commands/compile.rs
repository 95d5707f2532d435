use anyhow::Result;

use crate::Context;
use crate::cli::CompileArgs;

/// Print the compiled catalog as JSON
pub fn run(ctx: &Context, args: &CompileArgs) -> Result<u8> {
    let compiled = super::compile_catalog(ctx, args)?;
    println!("{}", serde_json::to_string_pretty(&compiled.catalog)?);
    Ok(0)
}
