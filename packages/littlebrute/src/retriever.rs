//! Retrieval and classification of worker results.

use crate::{
    broker::Broker,
    error::Result,
    stats::Stats,
};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Status of a result whose processing failed on the worker.
pub const STATUS_ERROR: i64 = 0;
/// Status of a result whose item was a hit.
pub const STATUS_SUCCESS: i64 = 1;
/// Status of a result whose item was invalid.
pub const STATUS_INVALID: i64 = 2;

/// Result message a worker publishes for one item.
///
/// Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Response {
    pub item: String,
    pub capture: String,
    pub status: i64,
    pub errors: Vec<String>,
}

/// How a result was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    /// Pushed onto the hits queue.
    Hit,
    /// Pushed onto the rejects queue.
    Reject,
    /// Its errors were recorded.
    Failed,
}

/// Consumes a run's retrieve queue and classifies results into [`Stats`].
pub struct Retriever {
    broker: Arc<dyn Broker>,
    queue: String,
    stats: Arc<Stats>,
    poll_interval: Duration,
    verbose: bool,
}

impl Retriever {
    /// Retrieve from `queue` on `broker`, blocking at most `poll_interval` per broker poll.
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: String,
        stats: Arc<Stats>,
        poll_interval: Duration,
        verbose: bool,
    ) -> Self {
        Retriever { broker, queue, stats, poll_interval, verbose }
    }

    /// Decode and classify a single result message.
    pub fn handle(&self, body: &[u8]) -> Result<Classified> {
        let resp: Response = serde_json::from_slice(body)?;
        if self.verbose {
            info!(item = %resp.item, status = resp.status, "response received");
        }

        Ok(match resp.status {
            STATUS_SUCCESS => {
                self.stats.hits().push(resp.item);
                self.stats.increment_total();
                Classified::Hit
            }
            STATUS_INVALID => {
                self.stats.rejects().push(resp.item);
                self.stats.increment_total();
                Classified::Reject
            }
            _ => {
                self.stats.add_errors(resp.errors);
                Classified::Failed
            }
        })
    }

    /// Consume results until `shutdown` is cancelled.
    ///
    /// Once cancelled, messages already waiting in the queue are still drained before returning.
    /// Cancellation is only checked between broker polls, so that no message the broker already
    /// handed out is dropped. A broker failure ends retrieval with an error; a message that fails
    /// to decode is logged and skipped.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        debug!(queue = %self.queue, "starting retriever");
        let mut draining = false;
        loop {
            if !draining && shutdown.is_cancelled() {
                debug!(queue = %self.queue, "draining retrieve queue");
                draining = true;
            }
            let timeout = if draining { Duration::ZERO } else { self.poll_interval };

            let next = self.broker.next_message(&self.queue, timeout).await;
            let body = match next {
                Ok(Some(body)) => body,
                Ok(None) if draining => break,
                Ok(None) => continue,
                Err(e) => {
                    error!(%e, queue = %self.queue, "error while consuming queue");
                    return Err(e);
                }
            };
            if let Err(e) = self.handle(&body) {
                error!(%e, queue = %self.queue, "error while unmarshalling response");
            }
        }
        debug!(queue = %self.queue, "retriever stopped");
        Ok(())
    }
}


// ==== tests ====
