use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{ConvergenceReport, RunSummary};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// One finished `apply` run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Manifest path as given on the command line
    pub manifest: String,
    pub host: String,
    pub noop: bool,
    pub cancelled: bool,
    pub exit_code: u8,
    pub summary: RunSummary,
}

impl RunRecord {
    pub fn new(
        started_at: DateTime<Utc>,
        manifest: &Path,
        host: &str,
        report: &ConvergenceReport,
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            manifest: manifest.display().to_string(),
            host: host.to_string(),
            noop: report.noop,
            cancelled: report.cancelled,
            exit_code: report.exit_code(),
            summary: report.summary.clone(),
        }
    }
}

/// Most recent runs, oldest first
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RunHistory {
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

impl RunHistory {
    fn history_file(state_dir: &Path) -> PathBuf {
        state_dir.join("history.toml")
    }

    /// Load history from disk, or return default if file doesn't exist
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::history_file(state_dir);

        if !path.exists() {
            log::debug!("History file does not exist, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;

        let history: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))?;

        log::debug!("Loaded {} runs from {}", history.runs.len(), path.display());
        Ok(history)
    }

    /// Save history to disk
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir).with_context(|| {
            format!("Failed to create state directory: {}", state_dir.display())
        })?;

        let path = Self::history_file(state_dir);
        let content =
            toml::to_string_pretty(self).context("Failed to serialize history to TOML")?;

        fs::write(&path, &content)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;

        log::debug!("Saved history to {}", path.display());
        Ok(())
    }

    /// Append a run, dropping the oldest beyond `limit`
    pub fn record(&mut self, run: RunRecord, limit: usize) {
        self.runs.push(run);
        if self.runs.len() > limit {
            let excess = self.runs.len() - limit;
            self.runs.drain(..excess);
        }
    }

    /// The last `n` runs, newest first
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter().rev().take(n)
    }
}

// ============================================================================
// Tests
// ============================================================================
