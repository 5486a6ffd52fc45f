// internal future polling system for blocking pops.
//
// design based on pollster crate, but instead of sleeping on a mutex + condvar pair, the polling
// thread parks itself and the waker unparks it. every unpark is followed by polling the future
// again, so spurious or stale unparks cost a poll and nothing else.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Wake, Waker},
    thread::{self, Thread},
    time::Instant,
};


// timeout for blocking on a future.
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
}

// waker that unparks the thread that created it.
struct Unparker(Thread);

impl Wake for Unparker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

// poll the future on the current thread until it resolves, or return none once the timeout is
// reached.
//
// the future is polled at least once, even if the deadline is already in the past.
pub(crate) fn poll<F>(mut fut: Pin<&mut F>, timeout: Timeout) -> Option<F::Output>
where
    F: Future,
{
    let waker = Waker::from(Arc::new(Unparker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        // return if ready
        if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
            return Some(output);
        }

        // otherwise, park until unparked or timeout
        match timeout {
            Timeout::Never => thread::park(),
            Timeout::At(deadline) => {
                let Some(duration) = deadline.checked_duration_since(Instant::now())
                    else { return None };
                thread::park_timeout(duration);
            }
        }
    }
}


// ==== tests ====
