// hand-off slot part of the queue.

use parking_lot::Mutex;
use std::{
    future::Future,
    mem::replace,
    pin::Pin,
    task::{Context, Poll, Waker},
};


// single-use, single-item transfer slot. shared between the waiter that registered it and
// whichever producer or registry sweep pops it from the registry.
pub(crate) struct Slot<T> {
    state: Mutex<State<T>>,
}

// slot state. transitions:
//
//      Waiting --fill--> Filled --recv or close--> Closed
//         |
//         |------evict--> Evicted --recv or close--> Closed
//         |
//         \------close--> Closed
//
// once closed, a slot never changes state again.
enum State<T> {
    // the waiter may still receive. holds the waker from the last poll, if polled yet.
    Waiting(Option<Waker>),
    // a producer handed an item off which the waiter has not taken yet.
    Filled(T),
    // a registry sweep dropped the slot from the registry without filling it.
    Evicted,
    // the waiter took the item or stopped waiting.
    Closed,
}

// what a waiter got out of its slot.
pub(crate) enum Received<T> {
    // an item was handed off.
    Item(T),
    // the slot is no longer registered and the waiter must register another to keep waiting.
    Evicted,
}

impl<T> Slot<T> {
    // construct in the waiting state.
    pub(crate) fn new() -> Self {
        Slot {
            state: Mutex::new(State::Waiting(None)),
        }
    }

    // try to hand an item off to the waiter without blocking. gives the item back if the waiter
    // is no longer waiting.
    pub(crate) fn fill(&self, item: T) -> Result<(), T> {
        let mut lock = self.state.lock();
        let waker = match &mut *lock {
            State::Waiting(waker) => waker.take(),
            _ => return Err(item),
        };
        *lock = State::Filled(item);
        drop(lock);

        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    // whether the slot would still accept an item.
    pub(crate) fn is_waiting(&self) -> bool {
        matches!(&*self.state.lock(), State::Waiting(_))
    }

    // tell the waiter its slot has been dropped from the registry. does nothing unless waiting.
    pub(crate) fn evict(&self) {
        let mut lock = self.state.lock();
        let State::Waiting(waker) = &mut *lock else { return };
        let waker = waker.take();
        *lock = State::Evicted;
        drop(lock);

        if let Some(waker) = waker {
            waker.wake();
        }
    }

    // future which resolves once the slot is filled or evicted.
    pub(crate) fn recv(&self) -> Recv<'_, T> {
        Recv(self)
    }

    // stop waiting. returns the item if one was handed off but never received, which the caller
    // becomes responsible for.
    pub(crate) fn close(&self) -> Option<T> {
        match replace(&mut *self.state.lock(), State::Closed) {
            State::Filled(item) => Some(item),
            _ => None,
        }
    }

    fn poll_recv(&self, cx: &mut Context) -> Poll<Received<T>> {
        let mut lock = self.state.lock();
        match replace(&mut *lock, State::Closed) {
            State::Waiting(waker) => {
                // keep the previous waker if it would wake the same task anyways
                let waker = match waker {
                    Some(waker) if waker.will_wake(cx.waker()) => waker,
                    _ => cx.waker().clone(),
                };
                *lock = State::Waiting(Some(waker));
                Poll::Pending
            }
            State::Filled(item) => Poll::Ready(Received::Item(item)),
            State::Evicted => Poll::Ready(Received::Evicted),
            State::Closed => unreachable!("slot polled after closed"),
        }
    }
}

// future for receiving from a slot. may be dropped and recreated freely while waiting.
pub(crate) struct Recv<'a, T>(&'a Slot<T>);

impl<'a, T> Future for Recv<'a, T> {
    type Output = Received<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        self.0.poll_recv(cx)
    }
}


// ==== tests ====
