//! Progress bar for `apply`, fed by the executor's callbacks

use declarative::{ProgressCallback, ResourceReport, ResourceStatus};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

pub struct ApplyProgress {
    bar: ProgressBar,
}

impl ApplyProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }

    /// Remove the bar before the report is printed
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_run_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_resource_start(&self, id: &str) {
        self.bar.set_message(ui::truncate(id, 50));
    }

    fn on_resource_complete(&self, report: &ResourceReport) {
        if report.status == ResourceStatus::Failed {
            self.bar.println(format!(
                "{} {}: {}",
                ui::status_symbol(report.status),
                report.id,
                report.message.as_deref().unwrap_or("failed")
            ));
        }
        self.bar.inc(1);
    }
}
