use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::state::{RunHistory, RunRecord};
use crate::ui;

/// Show the most recent runs, newest first
pub fn run(ctx: &Context, limit: usize) -> Result<u8> {
    let state_dir = ctx.config.state_path();
    let history = RunHistory::load(&state_dir)?;

    if history.runs.is_empty() {
        ui::info("No runs recorded yet.");
        return Ok(0);
    }

    ui::header("Recent runs");
    for run in history.latest(limit) {
        println!("{}", describe(run));
    }
    if ctx.verbose > 0 {
        ui::dim(&format!("History: {}", state_dir.display()));
    }
    Ok(0)
}

fn describe(run: &RunRecord) -> String {
    let outcome = if run.cancelled {
        "cancelled".yellow()
    } else if run.exit_code != 0 {
        "failed".red()
    } else if run.noop {
        "noop".cyan()
    } else {
        "ok".green()
    };
    let s = &run.summary;
    let elapsed = (run.finished_at - run.started_at).num_milliseconds().max(0) as u64;
    format!(
        "  {}  {:<9} {} on {}: {} changed, {} unchanged, {} failed ({})",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        outcome,
        run.manifest,
        run.host,
        s.changed + s.would_change,
        s.unchanged,
        s.failed + s.dependency_failed,
        ui::format_duration(elapsed)
    )
}
