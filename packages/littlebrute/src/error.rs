//! Error types for the client.

use thiserror::Error;

/// Errors that can occur while running the client.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the wordlist or writing the output file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A Redis broker operation failed.
    #[error("Broker operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// An AMQP broker operation failed.
    #[error("AMQP operation failed: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker stopped delivering messages from a queue.
    #[error("Consumer of queue {0} was closed by the broker")]
    ConsumerClosed(String),

    /// A result message was not valid JSON of the expected shape.
    #[error("Failed to decode result message: {0}")]
    Decode(#[from] serde_json::Error),

    /// A wordlist line exceeded the maximum line length.
    #[error("Line {line} of wordlist is longer than {max} bytes")]
    LineTooLong { line: u64, max: usize },

    /// The broker URL has a scheme no broker backend handles.
    #[error("Unsupported broker URL: {0}")]
    UnsupportedBroker(String),
}

/// Result type defaulting to the client's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
