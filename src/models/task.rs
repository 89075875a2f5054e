use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::CatalogEntry;
use crate::utils::filename::canonical_filename;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Pending,
    Downloaded { path: PathBuf },
    Failed { reason: String },
}

/// One attempt to fetch the series of a catalog entry.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub entry: CatalogEntry,
    /// Name the downloaded file is given in the output directory.
    pub file_name: String,
    pub attempts: u32,
    pub outcome: TaskOutcome,
}

impl DownloadTask {
    pub fn new(entry: CatalogEntry) -> Self {
        Self {
            file_name: canonical_filename(&entry),
            entry,
            attempts: 0,
            outcome: TaskOutcome::Pending,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.outcome = TaskOutcome::Pending;
    }

    pub fn succeed(&mut self, path: PathBuf) {
        self.outcome = TaskOutcome::Downloaded { path };
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.outcome = TaskOutcome::Failed {
            reason: reason.into(),
        };
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Downloaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Failed { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            TaskOutcome::Downloaded { path } => Some(path),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Row of the download report CSV.
#[derive(Debug, Serialize)]
pub struct TaskReportRow<'a> {
    pub region_code: &'a str,
    pub station_name: &'a str,
    pub pollutant_code: &'a str,
    pub status: &'static str,
    pub attempts: u32,
    pub path: String,
    pub reason: &'a str,
}

impl<'a> From<&'a DownloadTask> for TaskReportRow<'a> {
    fn from(task: &'a DownloadTask) -> Self {
        let status = match task.outcome {
            TaskOutcome::Pending => "pending",
            TaskOutcome::Downloaded { .. } => "downloaded",
            TaskOutcome::Failed { .. } => "failed",
        };
        Self {
            region_code: &task.entry.region_code,
            station_name: &task.entry.station_name,
            pollutant_code: &task.entry.pollutant_code,
            status,
            attempts: task.attempts,
            path: task
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            reason: task.failure_reason().unwrap_or_default(),
        }
    }
}

/// Aggregated result of a download run.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub tasks: Vec<DownloadTask>,
}

impl DownloadSummary {
    pub fn new(mut tasks: Vec<DownloadTask>) -> Self {
        tasks.sort_by(|a, b| a.entry.key().cmp(&b.entry.key()));
        Self { tasks }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks.iter().filter(|t| t.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks.iter().filter(|t| !t.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Download Report ===\n");
        summary.push_str(&format!("Total tasks: {}\n", self.tasks.len()));
        summary.push_str(&format!("Downloaded: {}\n", self.success_count()));
        summary.push_str(&format!("Failed: {}\n", self.failure_count()));

        if self.failure_count() > 0 {
            summary.push_str("\nFailed tuples:\n");
            for task in self.failed() {
                summary.push_str(&format!(
                    "  - {} ({}): {}\n",
                    task.entry,
                    task.entry.station_key,
                    task.failure_reason().unwrap_or("not attempted")
                ));
            }
        }

        summary
    }
}
