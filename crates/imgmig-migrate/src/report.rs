//! Run reporting
//!
//! Observers see every step of a run but cannot influence it: all hooks take
//! `&self` and return nothing.

use imgmig_common::checksum::short_digest;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};
use url::Url;

use crate::driver::{MigrationError, PageReport, RowOutcome, RunSummary};

/// Hooks called by the batch driver as a run progresses
pub trait RunObserver: Send + Sync {
    fn page_started(&self, _batch: usize, _rows: usize) {}

    fn download_started(&self, _batch: usize, _identifier: &str, _url: &Url) {}

    fn row_finished(&self, _batch: usize, _outcome: &RowOutcome) {}

    fn page_finished(&self, _report: &PageReport) {}

    fn run_finished(&self, _summary: &RunSummary) {}

    fn run_aborted(&self, _summary: &RunSummary, _error: &MigrationError) {}
}

/// Writes one structured `tracing` event per step
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl RunObserver for TracingReporter {
    fn page_started(&self, batch: usize, rows: usize) {
        info!(batch, rows, "Processing batch");
    }

    fn download_started(&self, batch: usize, identifier: &str, url: &Url) {
        debug!(batch, identifier, url = %url, "Downloading image");
    }

    fn row_finished(&self, batch: usize, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Migrated {
                identifier,
                bytes,
                sha256,
            } => {
                info!(
                    batch,
                    identifier = %identifier,
                    bytes,
                    sha256 = short_digest(sha256),
                    "Image stored in database successfully"
                );
            },
            RowOutcome::FetchFailed { identifier, error } => {
                error!(
                    batch,
                    identifier = %identifier,
                    kind = error.kind(),
                    error = %error,
                    "Error downloading image"
                );
            },
            RowOutcome::InsertFailed { identifier, error } => {
                error!(
                    batch,
                    identifier = %identifier,
                    error = %error,
                    "Error storing image in database"
                );
            },
        }
    }

    fn page_finished(&self, report: &PageReport) {
        info!(
            batch = report.batch,
            migrated = report.migrated(),
            fetch_failures = report.fetch_failures(),
            insert_failures = report.insert_failures(),
            "Batch finished"
        );
    }

    fn run_finished(&self, summary: &RunSummary) {
        info!(
            pages = summary.pages,
            migrated = summary.migrated,
            fetch_failures = summary.fetch_failures,
            insert_failures = summary.insert_failures,
            "All batches processed"
        );
    }

    fn run_aborted(&self, summary: &RunSummary, err: &MigrationError) {
        error!(
            error = %err,
            pages_completed = summary.pages,
            migrated = summary.migrated,
            "Error processing batches, migration aborted"
        );
    }
}

/// What a [`RecordingObserver`] has seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorded {
    pub page_sizes: Vec<usize>,
    pub downloads: Vec<String>,
    pub migrated: Vec<String>,
    pub fetch_failures: Vec<String>,
    pub insert_failures: Vec<String>,
    pub finished: Option<RunSummary>,
    pub aborted: bool,
}

/// Keeps every event in memory, keyed by identifier
#[derive(Debug, Default)]
pub struct RecordingObserver {
    inner: Mutex<Recorded>,
}

impl RecordingObserver {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Recorded {
        self.lock().clone()
    }

    pub fn page_sizes(&self) -> Vec<usize> {
        self.lock().page_sizes.clone()
    }

    pub fn fetch_failures(&self) -> Vec<String> {
        self.lock().fetch_failures.clone()
    }

    pub fn insert_failures(&self) -> Vec<String> {
        self.lock().insert_failures.clone()
    }

    pub fn finished(&self) -> bool {
        self.lock().finished.is_some()
    }

    pub fn aborted(&self) -> bool {
        self.lock().aborted
    }
}

impl RunObserver for RecordingObserver {
    fn page_started(&self, _batch: usize, rows: usize) {
        self.lock().page_sizes.push(rows);
    }

    fn download_started(&self, _batch: usize, identifier: &str, _url: &Url) {
        self.lock().downloads.push(identifier.to_string());
    }

    fn row_finished(&self, _batch: usize, outcome: &RowOutcome) {
        let identifier = outcome.identifier().to_string();
        let mut recorded = self.lock();
        match outcome {
            RowOutcome::Migrated { .. } => recorded.migrated.push(identifier),
            RowOutcome::FetchFailed { .. } => recorded.fetch_failures.push(identifier),
            RowOutcome::InsertFailed { .. } => recorded.insert_failures.push(identifier),
        }
    }

    fn run_finished(&self, summary: &RunSummary) {
        self.lock().finished = Some(*summary);
    }

    fn run_aborted(&self, _summary: &RunSummary, _error: &MigrationError) {
        self.lock().aborted = true;
    }
}
