use anyhow::Result;
use colored::Colorize;
use declarative::{EdgeKind, Graph, build_graph};

use crate::Context;
use crate::cli::CompileArgs;
use crate::ui;

/// Print the execution order and the resolved edges
pub fn run(ctx: &Context, args: &CompileArgs) -> Result<u8> {
    let compiled = super::compile_catalog(ctx, args)?;
    let graph = build_graph(&compiled.catalog)?;

    ui::header(&format!("Execution order ({} resources)", graph.len()));
    for (position, resource) in graph.ordered().enumerate() {
        println!("  {:>3}. {}", position + 1, resource);
    }

    let edges = edge_lines(&graph);
    if !edges.is_empty() {
        ui::header(&format!("Edges ({})", edges.len()));
        for line in edges {
            println!("  {line}");
        }
    }
    Ok(0)
}

fn edge_lines(graph: &Graph) -> Vec<String> {
    graph
        .edges()
        .iter()
        .map(|edge| {
            let arrow = match edge.kind {
                EdgeKind::Require => "->".normal(),
                EdgeKind::Notify => "~>".yellow(),
            };
            format!(
                "{} {} {}",
                graph.resource(edge.source),
                arrow,
                graph.resource(edge.target)
            )
        })
        .collect()
}
