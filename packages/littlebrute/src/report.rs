//! Reporting of hits and the end-of-run summary.

use crate::{
    error::Result,
    stats::Stats,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tokio_util::sync::CancellationToken;
use waitqueue::error::PopError;

// pause before retrying when the hits queue has no room for another waiter
const REGISTRY_FULL_BACKOFF: Duration = Duration::from_millis(50);

/// Tallies of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Results classified as hit or reject.
    pub total: u64,
    /// Hits reported.
    pub hits: u64,
    /// Rejects counted.
    pub rejects: u64,
    /// Error strings workers reported.
    pub errors: Vec<String>,
}

impl Summary {
    /// Log the summary.
    pub fn log(&self) {
        info!(
            total = self.total,
            hits = self.hits,
            rejects = self.rejects,
            errors = self.errors.len(),
            "run finished"
        );
        for e in &self.errors {
            warn!(error = %e, "worker reported error");
        }
    }
}

/// Drains hits as they arrive, appending them to the output file or logging them.
pub struct Reporter {
    stats: Arc<Stats>,
    out: Option<PathBuf>,
}

impl Reporter {
    /// Report the hits in `stats`, to `out` if given.
    pub fn new(stats: Arc<Stats>, out: Option<PathBuf>) -> Self {
        Reporter { stats, out }
    }

    /// Report hits until `stop` is cancelled, then report whatever hits remain and summarize.
    pub async fn run(self, stop: CancellationToken) -> Result<Summary> {
        let mut file = match &self.out {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path).await?),
            None => None,
        };

        let mut hits = 0;
        loop {
            match self.stats.hits().pop_or_wait(&stop).await {
                Ok(hit) => {
                    self.report(&mut file, &hit).await?;
                    hits += 1;
                }
                Err(PopError::Cancelled) => break,
                Err(PopError::Empty | PopError::RegistryFull) => {
                    tokio::time::sleep(REGISTRY_FULL_BACKOFF).await;
                }
            }
        }
        while let Ok(hit) = self.stats.hits().try_pop() {
            self.report(&mut file, &hit).await?;
            hits += 1;
        }
        if let Some(file) = &mut file {
            file.flush().await?;
        }

        let mut rejects = 0;
        while self.stats.rejects().try_pop().is_ok() {
            rejects += 1;
        }

        Ok(Summary {
            total: self.stats.total(),
            hits,
            rejects,
            errors: self.stats.errors(),
        })
    }

    async fn report(&self, file: &mut Option<File>, hit: &str) -> Result<()> {
        match file {
            Some(file) => {
                debug!(%hit, "writing hit");
                file.write_all(format!("{}\n", hit).as_bytes()).await?;
            }
            None => info!(%hit, "found hit"),
        }
        Ok(())
    }
}


// ==== tests ====
