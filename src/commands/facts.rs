use anyhow::Result;

use crate::Context;
use crate::cli::FactsArgs;
use crate::ui;

/// Print discovered facts, with overrides applied
pub fn run(ctx: &Context, args: &FactsArgs) -> Result<u8> {
    let facts = crate::facts::resolve(&ctx.config, args.facts_file.as_deref(), &args.facts)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(0);
    }

    ui::header("Host facts");
    for (name, value) in facts.iter() {
        let shown = value
            .as_str()
            .map_or_else(|| value.to_string(), str::to_string);
        ui::kv(name, &shown);
    }
    Ok(0)
}
