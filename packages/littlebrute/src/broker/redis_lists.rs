//! Redis-backed broker.
//!
//! Queues are Redis lists. Messages are pushed on the left (LPUSH) and taken from the right
//! (BRPOP), which makes each list FIFO.

use super::Broker;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Broker keeping its queues as lists in a Redis server.
pub struct RedisBroker {
    /// Connection for publishing.
    publish: ConnectionManager,
    /// Connection for blocking pops. Kept apart so a pending BRPOP never stalls publishing on the
    /// same connection.
    consume: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the Redis server at `url` (e.g., "redis://localhost:6379").
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let publish = ConnectionManager::new(client.clone()).await?;
        let consume = ConnectionManager::new(client).await?;
        Ok(Self { publish, consume })
    }
}

// BRPOP timeout in seconds, or none if the pop must not block. BRPOP treats 0 as "forever".
// fractional seconds need Redis 6 or later, earlier versions round down.
fn brpop_timeout(timeout: Duration) -> Option<f64> {
    (!timeout.is_zero()).then(|| timeout.as_secs_f64())
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, queue: &str, body: Bytes) -> Result<()> {
        let mut conn = self.publish.clone();
        conn.lpush::<_, _, ()>(queue, body.as_ref()).await?;
        Ok(())
    }

    async fn next_message(&self, queue: &str, timeout: Duration) -> Result<Option<Bytes>> {
        let mut conn = self.consume.clone();
        let Some(timeout_secs) = brpop_timeout(timeout) else {
            let popped: Option<Vec<u8>> = conn.rpop(queue, None).await?;
            return Ok(popped.map(Bytes::from));
        };

        let popped: Option<(String, Vec<u8>)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        Ok(popped.map(|(_, body)| Bytes::from(body)))
    }
}


// ==== tests ====
