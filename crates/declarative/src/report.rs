//! Convergence report - per-resource outcomes and the run summary

use crate::diff::PropertyChange;
use crate::types::{RefreshOutcome, ResourceKind};
use serde::{Deserialize, Serialize};

/// Final status of a single resource in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Already in the desired state
    Unchanged,
    /// Converged to the desired state
    Changed,
    /// Noop run: would have been converged
    WouldChange,
    /// Observation, convergence or refresh failed
    Failed,
    /// Not attempted because a prerequisite failed
    DependencyFailed,
    /// Not attempted because the run was cancelled
    Skipped,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::WouldChange => "would change",
            Self::Failed => "failed",
            Self::DependencyFailed => "dependency failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether dependents of this resource must not run
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, Self::Failed | Self::DependencyFailed)
    }

    /// Whether this resource triggers refresh of the resources it notifies
    pub fn triggers_refresh(&self) -> bool {
        matches!(self, Self::Changed | Self::WouldChange)
    }
}

/// What happened to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    /// `Kind[title]`
    pub id: String,
    pub kind: ResourceKind,
    pub title: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<PropertyChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshOutcome>,
    /// Error or skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub would_change: usize,
    pub failed: usize,
    pub dependency_failed: usize,
    pub skipped: usize,
    /// Refreshes that actually ran (or would have, in a noop run)
    pub refreshed: usize,
}

impl RunSummary {
    fn add(&mut self, report: &ResourceReport) {
        self.total += 1;
        match report.status {
            ResourceStatus::Unchanged => self.unchanged += 1,
            ResourceStatus::Changed => self.changed += 1,
            ResourceStatus::WouldChange => self.would_change += 1,
            ResourceStatus::Failed => self.failed += 1,
            ResourceStatus::DependencyFailed => self.dependency_failed += 1,
            ResourceStatus::Skipped => self.skipped += 1,
        }
        if matches!(
            report.refresh,
            Some(
                RefreshOutcome::Restarted
                    | RefreshOutcome::Reloaded
                    | RefreshOutcome::Executed
                    | RefreshOutcome::WouldRefresh
            )
        ) {
            self.refreshed += 1;
        }
    }
}

/// The outcome of applying a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// One entry per resource, in topological order
    pub resources: Vec<ResourceReport>,
    pub summary: RunSummary,
    pub noop: bool,
    pub cancelled: bool,
}

impl ConvergenceReport {
    /// Build a report from per-resource results
    pub fn new(resources: Vec<ResourceReport>, noop: bool, cancelled: bool) -> Self {
        let mut summary = RunSummary::default();
        for report in &resources {
            summary.add(report);
        }
        Self {
            resources,
            summary,
            noop,
            cancelled,
        }
    }

    /// True when nothing failed and the run was not cancelled
    pub fn success(&self) -> bool {
        self.summary.failed == 0 && self.summary.dependency_failed == 0 && !self.cancelled
    }

    /// Whether anything changed (or would change, in a noop run)
    pub fn has_changes(&self) -> bool {
        self.summary.changed > 0 || self.summary.would_change > 0
    }

    /// Process exit code: 0 on success, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.success() { 0 } else { 1 }
    }

    pub fn get(&self, id: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn with_status(&self, status: ResourceStatus) -> impl Iterator<Item = &ResourceReport> {
        self.resources.iter().filter(move |r| r.status == status)
    }
}
