//! Publishing wordlist items to workers.

use crate::{
    broker::Broker,
    error::Result,
    wordlist::Wordlist,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncBufRead;

/// Publishes items to a run's publish queue.
pub struct Publisher {
    broker: Arc<dyn Broker>,
    queue: String,
    verbose: bool,
}

impl Publisher {
    /// Publish to `queue` on `broker`. If `verbose`, every item is logged as it is queued.
    pub fn new(broker: Arc<dyn Broker>, queue: String, verbose: bool) -> Self {
        Publisher { broker, queue, verbose }
    }

    /// Publish a single item. Empty items are skipped.
    pub async fn publish(&self, item: Bytes) -> Result<()> {
        if item.is_empty() {
            return Ok(());
        }
        if self.verbose {
            info!(item = %String::from_utf8_lossy(&item), "queueing it up");
        }
        self.broker.publish(&self.queue, item).await
    }

    /// Publish every line of the wordlist, returning how many were published.
    ///
    /// A line which fails to publish is logged and skipped. Failing to read the wordlist ends
    /// the run with an error.
    pub async fn run<R>(&self, wordlist: &mut Wordlist<R>) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        debug!(queue = %self.queue, "publishing wordlist");
        let mut published = 0;
        while let Some(line) = wordlist.next_line().await? {
            match self.publish(line).await {
                Ok(()) => published += 1,
                Err(e) => error!(
                    %e,
                    queue = %self.queue,
                    line = wordlist.lines_read(),
                    "error while publishing message"
                ),
            }
        }
        debug!(published, lines = wordlist.lines_read(), "wordlist exhausted");
        Ok(published)
    }
}


// ==== tests ====
