//! Message broker seam.
//!
//! The client talks to workers through two named queues per run:
//!
//! - `{prefix}-publish`: wordlist items for workers to try, as raw line bytes
//! - `{prefix}-retrieve`: the workers' JSON results
//!
//! [`Broker`] abstracts over where those queues live. [`AmqpBroker`] keeps them in a RabbitMQ
//! server, which is where the workers listen. [`RedisBroker`] keeps them as Redis lists shared
//! with remote workers, and [`MemoryBroker`] keeps them in process for dry runs and tests.

mod amqp;
mod memory;
mod redis_lists;

pub use self::{amqp::AmqpBroker, memory::MemoryBroker, redis_lists::RedisBroker};

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};

/// A message broker holding named FIFO queues of opaque messages.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Make sure a queue exists before it is used.
    ///
    /// Backends whose queues come into being on first use need not do anything.
    async fn declare(&self, _queue: &str) -> Result<()> {
        Ok(())
    }

    /// Append a message to the back of a queue.
    async fn publish(&self, queue: &str, body: Bytes) -> Result<()>;

    /// Take the message at the front of a queue, waiting up to roughly `timeout` for one.
    ///
    /// Returns `Ok(None)` if no message arrived in time.
    async fn next_message(&self, queue: &str, timeout: Duration) -> Result<Option<Bytes>>;
}

/// Names of the queues of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queues {
    /// Queue items are published to.
    pub publish: String,
    /// Queue results are retrieved from.
    pub retrieve: String,
}

impl Queues {
    /// Queue names for a run with the given prefix.
    pub fn named(prefix: &str) -> Self {
        Queues {
            publish: format!("{}-publish", prefix),
            retrieve: format!("{}-retrieve", prefix),
        }
    }
}

/// Connect to the broker at `url`, choosing the backend by URL scheme.
pub async fn connect(url: &str) -> Result<Arc<dyn Broker>> {
    let scheme = url.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
        Some("amqp" | "amqps") => Ok(Arc::new(AmqpBroker::connect(url).await?)),
        Some("redis" | "rediss") => Ok(Arc::new(RedisBroker::connect(url).await?)),
        Some("memory") => Ok(Arc::new(MemoryBroker::new())),
        _ => Err(Error::UnsupportedBroker(url.to_owned())),
    }
}


// ==== tests ====
