// exposed API of the queue

use super::{
    error::PopError,
    polling::{poll, Timeout},
    slot::{Received, Slot},
};
use crossbeam_queue::ArrayQueue;
use futures::{future::pending, select_biased, FutureExt};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    pin::pin,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;


/// Default number of consumers that may be blocked on a [`Queue`] at once
pub const DEFAULT_WAITER_CAPACITY: usize = 1000;


/// Unbounded, thread-safe FIFO queue with cancellable waiting
///
/// Share it between threads or tasks behind an `Arc`. There is no closed state: consumers stop
/// waiting by cancelling their own wait.
///
/// # Ordering
///
/// Items pushed while no consumer is blocked are buffered, and buffered items are popped in the
/// order they were pushed. Items handed to a single consumer arrive in the order they were
/// pushed. However, when a consumer is blocked, a push hands its item straight to that consumer,
/// so a just-pushed item may be received before older items which are still buffered for some
/// consumer that is not currently blocked. Ordering across those two paths is best-effort, not
/// globally FIFO.
///
/// # Waiters
///
/// At most [`waiter_capacity`](Self::waiter_capacity) consumers may be blocked at once. Waits
/// beyond that fail fast with [`PopError::RegistryFull`] rather than blocking.
pub struct Queue<T> {
    // backing store. the only lock push, try_pop, and len take.
    items: RwLock<VecDeque<T>>,
    // hand-off slots of blocked consumers, oldest first. may contain slots whose waiter has
    // stopped waiting, which producers and sweeps skip over.
    waiters: ArrayQueue<Arc<Slot<T>>>,
    // coalescing wakeup signal. the queue owns both halves, so it never disconnects.
    wake_send: flume::Sender<()>,
    wake_recv: flume::Receiver<()>,
}

impl<T> Queue<T> {
    /// Construct empty, allowing [`DEFAULT_WAITER_CAPACITY`] blocked consumers at once
    pub fn new() -> Self {
        Self::with_waiter_capacity(DEFAULT_WAITER_CAPACITY)
    }

    /// Construct empty, allowing `capacity` blocked consumers at once
    ///
    /// Panics if `capacity` is 0.
    pub fn with_waiter_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "waiter capacity must be non-zero");
        let (wake_send, wake_recv) = flume::bounded(capacity);
        Queue {
            items: RwLock::new(VecDeque::new()),
            waiters: ArrayQueue::new(capacity),
            wake_send,
            wake_recv,
        }
    }

    /// Maximum number of consumers that may be blocked on this queue at once
    pub fn waiter_capacity(&self) -> usize {
        self.waiters.capacity()
    }

    /// Push an item
    ///
    /// If some consumer is blocked waiting, the item is handed directly to the one that has been
    /// waiting longest. Otherwise it is buffered. Never blocks beyond briefly locking the buffer.
    pub fn push(&self, item: T) {
        let Err(item) = self.hand_off(item) else { return };
        self.items.write().push_back(item);
        // if the signal buffer is already full, enough wakeups are pending anyways
        let _ = self.wake_send.try_send(());
    }

    /// Pop the front buffered item without blocking
    ///
    /// Errors with [`PopError::Empty`] if nothing is buffered.
    pub fn try_pop(&self) -> Result<T, PopError> {
        let lock = self.items.upgradable_read();
        if lock.is_empty() {
            return Err(PopError::Empty);
        }
        RwLockUpgradableReadGuard::upgrade(lock)
            .pop_front()
            .ok_or(PopError::Empty)
    }

    /// Pop the next item, waiting until one arrives or the token is cancelled
    ///
    /// Buffered items are returned without waiting, even if the token is already cancelled. If
    /// nothing is buffered and the token is cancelled, this resolves to [`PopError::Cancelled`]
    /// without needing any push to occur.
    ///
    /// Dropping the future before it resolves is equivalent to cancelling it.
    pub async fn pop_or_wait(&self, cancel: &CancellationToken) -> Result<T, PopError> {
        self.pop_or_wait_until(cancel.cancelled()).await
    }

    /// Pop the next item, waiting until one arrives or `cancel` resolves
    ///
    /// `cancel` may be any future: a shutdown signal, a timer such as `tokio::time::sleep`, or a
    /// combination thereof. It resolving is treated exactly like a cancelled token in
    /// [`pop_or_wait`](Self::pop_or_wait).
    pub async fn pop_or_wait_until<C>(&self, cancel: C) -> Result<T, PopError>
    where
        C: Future,
    {
        let mut cancel = pin!(cancel.fuse());
        loop {
            // buffered items go first so that a surplus of pushes never starves consumers
            if let Ok(item) = self.try_pop() {
                return Ok(item);
            }

            let waiter = self.register()?;
            loop {
                let woken = select_biased! {
                    received = waiter.slot.recv().fuse() => Woken::Slot(received),
                    _ = cancel => Woken::Cancelled,
                    _ = self.wake_recv.recv_async().fuse() => Woken::Signal,
                };
                match woken {
                    Woken::Slot(Received::Item(item)) => return Ok(item),
                    Woken::Slot(Received::Evicted) => break,
                    // dropping the waiter puts back an item that raced into its slot
                    Woken::Cancelled => return Err(PopError::Cancelled),
                    Woken::Signal => {
                        // another consumer may have claimed it first, in which case our slot is
                        // still registered and we go back to waiting on it
                        if let Ok(item) = self.try_pop() {
                            return Ok(item);
                        }
                    }
                }
            }
        }
    }

    /// Block the current thread until the next item arrives or the token is cancelled
    ///
    /// Blocking version of [`pop_or_wait`](Self::pop_or_wait). Cancelling the token from another
    /// thread unblocks this one.
    pub fn blocking_pop_or_wait(&self, cancel: &CancellationToken) -> Result<T, PopError> {
        let fut = pin!(self.pop_or_wait(cancel));
        poll(fut, Timeout::Never).unwrap_or(Err(PopError::Cancelled))
    }

    /// Block the current thread until the next item arrives or the deadline is reached
    ///
    /// Resolves to [`PopError::Cancelled`] if the deadline is reached first. Buffered items are
    /// returned even if the deadline is already in the past.
    pub fn blocking_pop_deadline(&self, deadline: Instant) -> Result<T, PopError> {
        let fut = pin!(self.pop_or_wait_until(pending::<()>()));
        poll(fut, Timeout::At(deadline)).unwrap_or(Err(PopError::Cancelled))
    }

    /// Block the current thread until the next item arrives or a timeout elapses
    ///
    /// See [`blocking_pop_deadline`](Self::blocking_pop_deadline). A timeout too long to be
    /// represented as a deadline never elapses.
    pub fn blocking_pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.blocking_pop_deadline(deadline),
            None => {
                let fut = pin!(self.pop_or_wait_until(pending::<()>()));
                poll(fut, Timeout::Never).unwrap_or(Err(PopError::Cancelled))
            }
        }
    }

    /// Number of buffered items
    ///
    /// Does not count items in the middle of being handed off, nor blocked consumers.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether no items are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // hand the item off to the longest-waiting consumer still waiting, or give it back.
    fn hand_off(&self, mut item: T) -> Result<(), T> {
        while let Some(slot) = self.waiters.pop() {
            match slot.fill(item) {
                Ok(()) => return Ok(()),
                // that waiter stopped waiting. its slot is dropped here
                Err(refused) => item = refused,
            }
        }
        Err(item)
    }

    // register a new slot in the registry.
    fn register(&self) -> Result<Waiter<'_, T>, PopError> {
        let slot = Arc::new(Slot::new());
        if self.waiters.push(Arc::clone(&slot)).is_err() {
            self.sweep();
            self.waiters
                .push(Arc::clone(&slot))
                .map_err(|_| PopError::RegistryFull)?;
        }
        Ok(Waiter { queue: self, slot })
    }

    // go through the registry once, dropping slots nobody waits on anymore and putting the rest
    // back in order. a live slot that no longer fits because of concurrent registrations is
    // evicted, which sends its waiter back to register again.
    fn sweep(&self) {
        for _ in 0..self.waiters.capacity() {
            let Some(slot) = self.waiters.pop() else { break };
            if !slot.is_waiting() {
                continue;
            }
            if let Err(slot) = self.waiters.push(slot) {
                slot.evict();
            }
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("waiter_capacity", &self.waiter_capacity())
            .finish_non_exhaustive()
    }
}

// what woke a waiting pop.
enum Woken<T> {
    Slot(Received<T>),
    Cancelled,
    Signal,
}

// a consumer's registered slot. closes the slot when dropped, pushing back any item that was
// handed off into it but never received.
struct Waiter<'a, T> {
    queue: &'a Queue<T>,
    slot: Arc<Slot<T>>,
}

impl<'a, T> Drop for Waiter<'a, T> {
    fn drop(&mut self) {
        if let Some(item) = self.slot.close() {
            self.queue.push(item);
        }
    }
}


// ==== tests ====


#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering::SeqCst},
        thread,
    };

    // spin until the registry holds n slots, for tests that need consumers to be blocked.
    fn await_waiters<T>(queue: &Queue<T>, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while queue.waiters.len() != n {
            assert!(Instant::now() < deadline, "waiters never registered");
            thread::yield_now();
        }
    }

    #[test]
    fn fresh_queue_is_empty() {
        let queue = Queue::<u32>::new();
        assert_eq!(queue.try_pop(), Err(PopError::Empty));
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert_eq!(queue.waiter_capacity(), DEFAULT_WAITER_CAPACITY);
    }

    #[test]
    fn single_thread_fifo() {
        let queue = Queue::new();
        queue.push('a');
        queue.push('b');
        queue.push('c');
        assert_eq!(queue.try_pop(), Ok('a'));
        assert_eq!(queue.try_pop(), Ok('b'));
        assert_eq!(queue.try_pop(), Ok('c'));
        assert_eq!(queue.try_pop(), Err(PopError::Empty));
    }

    #[test]
    fn len_is_idempotent() {
        let queue = Queue::new();
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.len(), 5);
        queue.try_pop().unwrap();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn buffered_item_beats_cancellation() {
        let queue = Queue::new();
        queue.push(1);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(block_on(queue.pop_or_wait(&token)), Ok(1));
        assert_eq!(block_on(queue.pop_or_wait(&token)), Err(PopError::Cancelled));
    }

    #[test]
    fn already_cancelled_then_round_trip() {
        let queue = Queue::new();
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(queue.blocking_pop_or_wait(&token), Err(PopError::Cancelled));

        queue.push("x");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop(), Ok("x"));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn deadline_elapses() {
        let queue = Queue::<u32>::new();
        let start = Instant::now();
        assert_eq!(
            queue.blocking_pop_timeout(Duration::from_millis(20)),
            Err(PopError::Cancelled),
        );
        assert!(start.elapsed() >= Duration::from_millis(20));

        // the abandoned slot is skipped
        queue.push(4);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop(), Ok(4));
    }

    #[test]
    fn unrepresentable_timeout_never_elapses() {
        let queue = Arc::new(Queue::new());
        queue.push(1);
        assert_eq!(queue.blocking_pop_timeout(Duration::MAX), Ok(1));

        let join = thread::spawn({
            let queue = Arc::clone(&queue);
            move || queue.blocking_pop_timeout(Duration::MAX)
        });
        await_waiters(&queue, 1);
        queue.push(2);
        assert_eq!(join.join().unwrap(), Ok(2));
    }

    #[test]
    fn blocked_thread_wakes_on_push() {
        let queue = Arc::new(Queue::new());
        let join = thread::spawn({
            let queue = Arc::clone(&queue);
            move || queue.blocking_pop_timeout(Duration::from_secs(10))
        });
        await_waiters(&queue, 1);
        queue.push(42);
        assert_eq!(join.join().unwrap(), Ok(42));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn cancel_unblocks_thread() {
        let queue = Arc::new(Queue::<u32>::new());
        let token = CancellationToken::new();
        let join = thread::spawn({
            let queue = Arc::clone(&queue);
            let token = token.clone();
            move || queue.blocking_pop_or_wait(&token)
        });
        await_waiters(&queue, 1);
        token.cancel();
        assert_eq!(join.join().unwrap(), Err(PopError::Cancelled));
    }

    #[test]
    fn push_bypasses_store_when_consumer_waits() {
        let queue = Queue::new();
        let waiter = queue.register().unwrap();
        queue.push(1);
        assert_eq!(queue.len(), 0);
        assert!(matches!(block_on(waiter.slot.recv()), Received::Item(1)));
        drop(waiter);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn handoff_may_overtake_buffered_items() {
        // a consumer which found the store empty and then registered after "old" was buffered
        // gets "new" handed to it while "old" is still buffered for whoever pops next
        let queue = Queue::new();
        queue.push("old");
        let waiter = queue.register().unwrap();
        queue.push("new");
        assert!(matches!(block_on(waiter.slot.recv()), Received::Item("new")));
        assert_eq!(queue.try_pop(), Ok("old"));
    }

    #[test]
    fn item_raced_into_abandoned_slot_is_kept() {
        let queue = Queue::new();
        let waiter = queue.register().unwrap();
        queue.push(9);
        assert_eq!(queue.len(), 0);
        // the waiter gives up before receiving
        drop(waiter);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop(), Ok(9));
    }

    #[test]
    fn abandoned_slots_are_skipped() {
        let queue = Queue::new();
        for _ in 0..3 {
            drop(queue.register().unwrap());
        }
        let waiter = queue.register().unwrap();
        queue.push(5);
        assert!(matches!(block_on(waiter.slot.recv()), Received::Item(5)));
        assert_eq!(queue.waiters.len(), 0);
    }

    #[test]
    fn sweep_frees_abandoned_slots() {
        let queue = Queue::<u32>::with_waiter_capacity(2);
        drop(queue.register().unwrap());
        drop(queue.register().unwrap());
        assert_eq!(queue.waiters.len(), 2);
        let waiter = queue.register().unwrap();
        assert_eq!(queue.waiters.len(), 1);
        queue.push(3);
        assert!(matches!(block_on(waiter.slot.recv()), Received::Item(3)));
    }

    #[test]
    fn evicted_waiter_registers_again() {
        let queue = Arc::new(Queue::new());
        let join = thread::spawn({
            let queue = Arc::clone(&queue);
            move || queue.blocking_pop_timeout(Duration::from_secs(10))
        });
        await_waiters(&queue, 1);

        // what a sweep does to a live slot it can't put back
        let slot = queue.waiters.pop().unwrap();
        slot.evict();
        assert!(!slot.is_waiting());

        // the waiter comes back with a fresh slot, which the push hands off to
        await_waiters(&queue, 1);
        queue.push(7);
        assert_eq!(join.join().unwrap(), Ok(7));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn registry_full_fails_fast() {
        let queue = Arc::new(Queue::with_waiter_capacity(2));
        let joins = (0..2)
            .map(|_| thread::spawn({
                let queue = Arc::clone(&queue);
                move || queue.blocking_pop_timeout(Duration::from_secs(10))
            }))
            .collect::<Vec<_>>();
        await_waiters(&queue, 2);

        let start = Instant::now();
        assert_eq!(
            queue.blocking_pop_timeout(Duration::from_secs(10)),
            Err(PopError::RegistryFull),
        );
        assert!(start.elapsed() < Duration::from_secs(5));

        queue.push(1);
        queue.push(2);
        let mut got = joins.into_iter()
            .map(|join| join.join().unwrap().unwrap())
            .collect::<Vec<_>>();
        got.sort();
        assert_eq!(got, [1, 2]);
    }

    #[test]
    fn many_threads_no_loss_no_duplication() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 2000;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let queue = Arc::new(Queue::new());
        let received = Arc::new(AtomicUsize::new(0));

        let producers = (0..PRODUCERS)
            .map(|p| thread::spawn({
                let queue = Arc::clone(&queue);
                move || {
                    let mut rng = Pcg32::seed_from_u64(p as u64);
                    for i in 0..PER_PRODUCER {
                        queue.push(p * PER_PRODUCER + i);
                        if rng.gen_ratio(1, 64) {
                            thread::yield_now();
                        }
                    }
                }
            }))
            .collect::<Vec<_>>();
        let consumers = (0..CONSUMERS)
            .map(|c| thread::spawn({
                let queue = Arc::clone(&queue);
                let received = Arc::clone(&received);
                move || {
                    let mut rng = Pcg32::seed_from_u64(100 + c as u64);
                    let mut got = Vec::new();
                    while received.load(SeqCst) < TOTAL {
                        let result = if rng.gen_bool(0.5) {
                            queue.try_pop()
                        } else {
                            queue.blocking_pop_timeout(Duration::from_millis(20))
                        };
                        if let Ok(n) = result {
                            received.fetch_add(1, SeqCst);
                            got.push(n);
                        }
                    }
                    got
                }
            }))
            .collect::<Vec<_>>();

        for join in producers {
            join.join().unwrap();
        }
        let mut seen = HashSet::new();
        for join in consumers {
            for n in join.join().unwrap() {
                assert!(seen.insert(n), "item {} received twice", n);
            }
        }
        assert_eq!(seen.len(), TOTAL);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_tasks_no_loss_no_duplication() {
        const PRODUCERS: usize = 8;
        const CONSUMERS: usize = 8;
        const PER_PRODUCER: usize = 500;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let queue = Arc::new(Queue::new());
        let shutdown = CancellationToken::new();
        let received = Arc::new(AtomicUsize::new(0));

        let consumers = (0..CONSUMERS)
            .map(|_| tokio::spawn({
                let queue = Arc::clone(&queue);
                let shutdown = shutdown.clone();
                let received = Arc::clone(&received);
                async move {
                    let mut got = Vec::new();
                    loop {
                        match queue.pop_or_wait(&shutdown).await {
                            Ok(n) => {
                                received.fetch_add(1, SeqCst);
                                got.push(n);
                            }
                            Err(PopError::Cancelled) => return got,
                            Err(e) => panic!("unexpected {}", e),
                        }
                    }
                }
            }))
            .collect::<Vec<_>>();
        let producers = (0..PRODUCERS)
            .map(|p| tokio::spawn({
                let queue = Arc::clone(&queue);
                async move {
                    let mut rng = Pcg32::seed_from_u64(p as u64);
                    for i in 0..PER_PRODUCER {
                        queue.push(p * PER_PRODUCER + i);
                        if rng.gen_ratio(1, 16) {
                            tokio::task::yield_now().await;
                        }
                    }
                }
            }))
            .collect::<Vec<_>>();

        for join in producers {
            join.await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(10), async {
            while received.load(SeqCst) < TOTAL {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
            .await
            .expect("items went missing");
        shutdown.cancel();

        let mut seen = HashSet::new();
        for join in consumers {
            for n in join.await.unwrap() {
                assert!(seen.insert(n), "item {} received twice", n);
            }
        }
        assert_eq!(seen.len(), TOTAL);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn waiting_task_wakes_on_push() {
        let queue = Arc::new(Queue::new());
        let join = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                queue.pop_or_wait_until(tokio::time::sleep(Duration::from_secs(10))).await
            }
        });
        while queue.waiters.len() == 0 {
            tokio::task::yield_now().await;
        }
        queue.push("hit");
        assert_eq!(join.await.unwrap(), Ok("hit"));
    }

    #[tokio::test]
    async fn dropped_wait_does_not_lose_item() {
        let queue = Queue::new();
        let waited = tokio::time::timeout(
            Duration::from_millis(10),
            queue.pop_or_wait_until(pending::<()>()),
        ).await;
        assert!(waited.is_err());
        queue.push(1);
        assert_eq!(queue.try_pop(), Ok(1));
    }
}
