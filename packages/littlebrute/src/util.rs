//! Tokio utility.

use std::future::Future;
use tokio::task::{
    spawn,
    JoinError,
    JoinHandle,
};


/// Wrapper around tokio task that aborts if dropped before being joined.
pub struct TaskGuard<T>(JoinHandle<T>);

impl<T: Send + 'static> TaskGuard<T> {
    /// Spawn a tokio task and wrap with self.
    pub fn spawn<F>(f: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        TaskGuard(spawn(f))
    }

    /// Wait for the task to finish.
    ///
    /// Must not be called again once it has returned.
    pub async fn join(&mut self) -> Result<T, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}


// ==== tests ====
