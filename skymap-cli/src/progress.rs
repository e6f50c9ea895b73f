use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use skymap_discovery::{ProgressHook, TypeOutcome, TypeReport};
use std::sync::Arc;

/// Progress bar over the resource types of one enumeration.
///
/// Cloning shares the same bar, so a clone can be handed to the worker
/// tasks through [`EnumerationProgress::hook`].
#[derive(Clone)]
pub struct EnumerationProgress {
    bar: ProgressBar,
}

impl EnumerationProgress {
    pub fn new(total_types: u64) -> Self {
        let bar = ProgressBar::new(total_types);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} types ({msg})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░"),
        );
        Self { bar }
    }

    /// A bar that draws nothing, for `--quiet` and non-terminal runs.
    pub fn hidden(total_types: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_types), ProgressDrawTarget::hidden());
        Self { bar }
    }

    pub fn record(&self, report: &TypeReport) {
        let status = match &report.outcome {
            TypeOutcome::Listed(count) => format!("{} ({count})", report.resource_type),
            TypeOutcome::Skipped(_) => format!("{} skipped", report.resource_type),
            TypeOutcome::Failed(_) => format!("{} failed", report.resource_type),
        };
        self.bar.set_message(status);
        self.bar.inc(1);
    }

    pub fn hook(&self) -> ProgressHook {
        let progress = self.clone();
        Arc::new(move |report: &TypeReport| progress.record(report))
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, interrupted: bool) {
        if interrupted {
            self.bar.abandon_with_message("Enumeration interrupted");
        } else {
            self.bar.finish_with_message("Enumeration complete");
        }
    }
}
