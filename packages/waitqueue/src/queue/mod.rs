// implementation of the wait queue.
//
// the architecture is as such:
//
//    Queue<T>
//       |
//       |------ it contains an RwLock<VecDeque<T>>, the backing store. it holds every item that
//       |       was pushed while no consumer was blocked, and is the only thing push locks.
//       |
//       |------ it contains the "waiter registry":
//       |
//       |       this is a bounded lock-free queue of hand-off slots, each of which corresponds to
//       |       a blocked pop future. a producer pops slots oldest-first and tries to hand its
//       |       item off into one before falling back to the backing store. a slot refuses the
//       |       item once its waiter stopped waiting, so nothing is lost to an abandoned slot.
//       |
//       \------ it contains a "wakeup signal", a bounded channel of () with non-blocking sends.
//               every push that lands in the backing store fires it, so a waiter that registered
//               too late to be handed the item still gets woken to go look for it.
//
// the organization of these modules is as such:
//
//      slot<---------api: The Queue type and its pop futures. Safe, and re-exported publically.
//                   |
//      polling<-----/     Blocking versions of the pop operations are built as a layer on top of
//                         the futures in the polling module, which parks the calling thread.
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod slot;
mod polling;
