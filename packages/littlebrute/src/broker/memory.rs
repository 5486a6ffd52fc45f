//! In-process broker.

use super::Broker;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use waitqueue::Queue;

/// Broker keeping its queues in memory, created on first use.
///
/// Only reachable from inside the process, so the "workers" must be tasks of the same process.
#[derive(Default)]
pub struct MemoryBroker {
    queues: DashMap<String, Arc<Queue<Bytes>>>,
}

impl MemoryBroker {
    /// Construct with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting in a queue.
    pub fn pending(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |queue| queue.len())
    }

    fn queue(&self, name: &str) -> Arc<Queue<Bytes>> {
        if let Some(queue) = self.queues.get(name) {
            return Arc::clone(&queue);
        }
        Arc::clone(&self.queues.entry(name.to_owned()).or_default())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<()> {
        self.queue(queue).push(body);
        Ok(())
    }

    async fn next_message(&self, queue: &str, timeout: Duration) -> Result<Option<Bytes>> {
        let queue = self.queue(queue);
        // any pop error just means nothing arrived in time
        Ok(queue.pop_or_wait_until(tokio::time::sleep(timeout)).await.ok())
    }
}


// ==== tests ====
