//! Unbounded concurrent FIFO queue with cancellable waiting.
//!
//! [`Queue`] can be pushed to and popped from by any number of threads or tasks at once. Popping
//! either fails immediately when nothing is buffered ([`Queue::try_pop`]) or waits for the next
//! item until some cancellation fires ([`Queue::pop_or_wait`] and friends). Consumers that are
//! already blocked receive freshly pushed items directly, without going through the buffer.
//!
//! ```
//! use waitqueue::Queue;
//!
//! let queue = Queue::new();
//! queue.push("a");
//! queue.push("b");
//! assert_eq!(queue.len(), 2);
//! assert_eq!(queue.try_pop(), Ok("a"));
//! ```

mod queue;

pub use crate::queue::api::*;

/// Error types
pub mod error {
    pub use crate::queue::error::*;
}
