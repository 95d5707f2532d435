use colored::{ColoredString, Colorize};
use declarative::{RefreshOutcome, ResourceStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Report Formatting
// ============================================================================

/// Marker for a resource status
pub fn status_symbol(status: ResourceStatus) -> ColoredString {
    match status {
        ResourceStatus::Unchanged => "·".dimmed(),
        ResourceStatus::Changed => "✓".green(),
        ResourceStatus::WouldChange => "~".yellow(),
        ResourceStatus::Failed => "✗".red(),
        ResourceStatus::DependencyFailed => "⊘".red(),
        ResourceStatus::Skipped => "-".dimmed(),
    }
}

/// Human text for a refresh outcome
pub fn refresh_label(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Restarted => "restarted".to_string(),
        RefreshOutcome::Reloaded => "reloaded".to_string(),
        RefreshOutcome::Executed => "executed".to_string(),
        RefreshOutcome::WouldRefresh => "would refresh".to_string(),
        RefreshOutcome::Skipped { reason } => format!("refresh skipped: {reason}"),
    }
}

/// Format a duration in milliseconds
pub fn format_duration(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

/// Shorten a value for one-line display
pub fn truncate(value: &str, max_len: usize) -> String {
    let first_line = value.lines().next().unwrap_or("");
    let multiline = value.lines().nth(1).is_some();
    if first_line.chars().count() <= max_len && !multiline {
        first_line.to_string()
    } else {
        let kept: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

// ============================================================================
// Tests
// ============================================================================
