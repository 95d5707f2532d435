use anyhow::{Context as _, Result};
use chrono::Utc;
use colored::Colorize;
use declarative::{
    CancelToken, ConvergenceReport, ExecuteOptions, ProviderRegistry, ResourceReport,
    ResourceStatus, build_graph,
};
use manifest::facts::HOSTNAME;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::cli::ApplyArgs;
use crate::progress::ApplyProgress;
use crate::state::{RunHistory, RunRecord};
use crate::{Context, Fatal, backend, signal, ui};

/// JSON document written by `--report-file`
#[derive(Serialize)]
struct RunFile<'a> {
    #[serde(flatten)]
    run: &'a RunRecord,
    report: &'a ConvergenceReport,
}

/// Compile, order and converge. Returns the process exit status.
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<u8> {
    let started_at = Utc::now();

    let compiled = super::compile_catalog(ctx, &args.source).fatal()?;
    let graph = build_graph(&compiled.catalog).fatal()?;
    let jobs = args.jobs.unwrap_or(ctx.config.jobs).max(1);
    let backends = backend::system(ctx.config.package_manager_for(&compiled.facts));

    if !ctx.quiet {
        ui::header(&format!(
            "{} {} ({} resources{})",
            if args.noop { "Checking" } else { "Applying" },
            args.source.manifest.display(),
            graph.len(),
            if jobs > 1 {
                format!(", {jobs} jobs")
            } else {
                String::new()
            }
        ));
    }

    let cancel = CancelToken::new();
    signal::cancel_on_interrupt(&cancel);

    let progress = ApplyProgress::new(ctx.quiet);
    let report = declarative::apply(
        &graph,
        &ProviderRegistry::standard(),
        &backends,
        &ExecuteOptions {
            noop: args.noop,
            jobs,
        },
        &progress,
        &cancel,
    )
    .fatal()?;
    progress.finish();

    if !ctx.quiet {
        print_report(&report, ctx.verbose > 0);
    }

    let host = compiled
        .facts
        .get(HOSTNAME)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let record = RunRecord::new(started_at, &args.source.manifest, host, &report);

    if let Err(e) = save_history(ctx, &record) {
        log::warn!("Could not update run history: {e:#}");
    }
    if let Some(path) = &args.report_file {
        write_report_file(path, &record, &report)?;
        log::info!("Wrote run report to {}", path.display());
    }

    Ok(report.exit_code())
}

fn save_history(ctx: &Context, record: &RunRecord) -> Result<()> {
    let state_dir = ctx.config.state_path();
    let mut history = RunHistory::load(&state_dir)?;
    history.record(record.clone(), ctx.config.history_limit);
    history.save(&state_dir)
}

fn write_report_file(path: &Path, run: &RunRecord, report: &ConvergenceReport) -> Result<()> {
    let content = serde_json::to_string_pretty(&RunFile { run, report })?;
    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write report file: {}", path.display()))
}

// ============================================================================
// Output
// ============================================================================

fn print_report(report: &ConvergenceReport, verbose: bool) {
    println!();
    for resource in &report.resources {
        if !verbose && resource.status == ResourceStatus::Unchanged && resource.refresh.is_none()
        {
            continue;
        }
        for line in resource_lines(resource) {
            println!("{line}");
        }
    }
    println!();
    println!("{}", summary_line(report));

    if report.cancelled {
        ui::warn("Interrupted: resources that had not started were skipped");
    } else if report.noop && report.has_changes() {
        ui::info("Noop run: nothing was changed");
    } else if report.success() && !report.has_changes() {
        ui::success("Host already converged");
    }
}

fn resource_lines(resource: &ResourceReport) -> Vec<String> {
    let mut lines = vec![format!(
        "  {} {} {}",
        ui::status_symbol(resource.status),
        resource.id,
        format!("({}, {})", resource.status.as_str(), ui::format_duration(resource.duration_ms))
            .dimmed()
    )];

    for change in &resource.changes {
        let from = change.from.as_deref().unwrap_or("(absent)");
        lines.push(format!(
            "      {}: {} → {}",
            change.name,
            ui::truncate(from, 40).dimmed(),
            ui::truncate(&change.to, 40)
        ));
    }
    if let Some(refresh) = &resource.refresh {
        lines.push(format!("      {}", ui::refresh_label(refresh).cyan()));
    }
    if let Some(message) = &resource.message {
        let text = if resource.status.blocks_dependents() {
            message.red()
        } else {
            message.dimmed()
        };
        lines.push(format!("      {text}"));
    }
    lines
}

fn summary_line(report: &ConvergenceReport) -> String {
    let s = &report.summary;
    let mut parts = vec![format!("{} resources", s.total).bold().to_string()];
    if s.changed > 0 {
        parts.push(format!("{} changed", s.changed).green().to_string());
    }
    if s.would_change > 0 {
        parts.push(format!("{} would change", s.would_change).yellow().to_string());
    }
    parts.push(format!("{} unchanged", s.unchanged));
    if s.refreshed > 0 {
        parts.push(format!("{} refreshed", s.refreshed).cyan().to_string());
    }
    if s.failed > 0 {
        parts.push(format!("{} failed", s.failed).red().to_string());
    }
    if s.dependency_failed > 0 {
        parts.push(format!("{} dependency failed", s.dependency_failed).red().to_string());
    }
    if s.skipped > 0 {
        parts.push(format!("{} skipped", s.skipped).yellow().to_string());
    }
    parts.join(", ")
}
