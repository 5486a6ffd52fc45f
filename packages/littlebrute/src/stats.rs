//! Shared tallies of a run.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use waitqueue::Queue;

/// Results collected over a run.
///
/// Safe to share between the retriever, the reporter, and anything else behind an `Arc`.
#[derive(Debug, Default)]
pub struct Stats {
    // items the workers reported as hits
    hits: Queue<String>,
    // items the workers reported as invalid
    rejects: Queue<String>,
    // number of classified results
    total: AtomicU64,
    // error strings workers reported alongside failed results
    errors: Mutex<Vec<String>>,
}

impl Stats {
    /// Construct with nothing collected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits not yet drained.
    pub fn hits(&self) -> &Queue<String> {
        &self.hits
    }

    /// Rejects not yet drained.
    pub fn rejects(&self) -> &Queue<String> {
        &self.rejects
    }

    /// Record error strings.
    pub fn add_errors(&self, errors: impl IntoIterator<Item = String>) {
        self.errors.lock().extend(errors);
    }

    /// Snapshot copy of every error recorded so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Count one more classified result.
    pub fn increment_total(&self) {
        self.total.fetch_add(1, Relaxed);
    }

    /// Number of classified results so far.
    pub fn total(&self) -> u64 {
        self.total.load(Relaxed)
    }
}


// ==== tests ====
