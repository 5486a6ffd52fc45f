// queue error types.

use thiserror::Error;


/// Error for trying to pop from a [`Queue`](crate::Queue)
///
/// None of these are fatal. The queue is left intact and the operation may simply be retried.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
pub enum PopError {
    /// No item was buffered, and waiting was not requested
    #[error("queue is empty")]
    Empty,
    /// The wait for the next item was cancelled, or its deadline passed, before an item arrived
    #[error("wait for next item was cancelled")]
    Cancelled,
    /// So many consumers are already blocked on the queue that another one could not register
    ///
    /// This is the queue's backpressure valve for waiters. Unlike [`Empty`](Self::Empty), it says
    /// nothing about whether items may be buffered by the time the caller retries.
    #[error("too many consumers already waiting on queue")]
    RegistryFull,
}
