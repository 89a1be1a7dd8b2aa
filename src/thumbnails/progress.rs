use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source file that could not be turned into a thumbnail.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub error: String,
}

/// Final counts of a generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
}

/// Counters shared by the worker threads of one run.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    generated: AtomicUsize,
    skipped: AtomicUsize,
    failures: Mutex<Vec<FailureRecord>>,
}

impl Progress {
    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, path: PathBuf, error: String) {
        // A poisoned lock only means another worker panicked mid-push.
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        failures.push(FailureRecord { path, error });
    }

    pub fn into_report(self) -> GenerationReport {
        let mut failures = self
            .failures
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        GenerationReport {
            generated: self.generated.into_inner(),
            skipped: self.skipped.into_inner(),
            failed: failures.len(),
            failures,
        }
    }
}
