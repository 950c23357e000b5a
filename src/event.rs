//! Event sources and the event-pattern adapter.
//!
//! An event source raises named notifications carrying a payload, calling
//! every registered handler synchronously from within the raising call. This
//! is a light-weight implementation of the observer pattern: `Event` is the
//! handler list a source keeps per notification, and `from_event_pattern`
//! turns one named notification into an `Observable`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crate::disposable;
use crate::error::Result;
use crate::observable::Observable;
use crate::subscriber;


static NEXT_SENDER: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLER: AtomicU64 = AtomicU64::new(1);


/// Identity of the object raising a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(u64);

impl SenderId {
    /// A fresh identity, distinct from every other one in the process.
    pub fn new() -> SenderId {
        SenderId(NEXT_SENDER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SenderId {
    fn default() -> SenderId { SenderId::new() }
}

/// Token for a registered handler, used to remove exactly that handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A notification handler: receives the sender and the payload.
pub type Handler<A> = Arc<dyn Fn(SenderId, &A) + Send + Sync + 'static>;


/// Anything raising named, payload-carrying notifications.
///
/// Implementations must call every handler registered for a notification
/// synchronously, inside the call that raises it, and must tolerate handlers
/// being added or removed while a raise is in flight. `Event` takes care of
/// all of that, so most sources just keep one `Event` per notification and
/// dispatch on the name.
pub trait EventSource<A>: Send + Sync {
    /// Register a handler for the named notification.
    ///
    /// Fails with `Error::UnknownEvent` if the source has no such
    /// notification.
    fn add_handler(&self, event: &str, handler: Handler<A>) -> Result<HandlerId>;

    /// Remove a handler previously returned by `add_handler`. Unknown
    /// handlers are ignored.
    fn remove_handler(&self, event: &str, id: HandlerId);
}


/// Tracks in-flight invocations of one handler.
struct Gate {
    state: Mutex<GateState>,
    idle: Condvar,
}

struct GateState {
    open: bool,
    running: Vec<ThreadId>,
}

impl Gate {
    fn new() -> Gate {
        Gate {
            state: Mutex::new(GateState { open: true, running: vec![] }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self) -> Option<Pass<'_>> {
        let mut state = self.lock();
        if !state.open {
            return None;
        }
        state.running.push(thread::current().id());
        Some(Pass { gate: self })
    }

    /// Close the gate and wait for invocations on other threads to finish.
    /// An invocation on the calling thread (a handler removing itself) is not
    /// waited for.
    ///
    /// Inside an observer callback nothing is waited for: an invocation on
    /// another thread may be blocked on the observer lock this thread holds.
    /// The subscriber drops its value once the lock is released.
    fn close(&self) {
        let me = thread::current().id();
        let mut state = self.lock();
        state.open = false;
        if subscriber::in_delivery() {
            return;
        }
        while state.running.iter().any(|&t| t != me) {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// An invocation in progress. Leaves the gate on drop, also when the handler
/// panics.
struct Pass<'a> {
    gate: &'a Gate,
}

impl<'a> Drop for Pass<'a> {
    fn drop(&mut self) {
        let me = thread::current().id();
        let mut state = self.gate.lock();
        if let Some(idx) = state.running.iter().position(|&t| t == me) {
            state.running.swap_remove(idx);
        }
        self.gate.idle.notify_all();
    }
}


struct Record<A> {
    id: HandlerId,
    handler: Handler<A>,
    gate: Gate,
}


/// The list of handlers registered for one notification.
///
/// Raising iterates over a snapshot of the list, so handlers may add or remove
/// handlers (including themselves) while being called. A handler added during
/// a raise may or may not see that raise. A handler removed during a raise
/// does not see it once `remove` has returned: `remove` waits for invocations
/// of that handler still running on other threads. The exception is a removal
/// from inside an observer callback, which returns at once; invocations still
/// running then reach a closed subscription and deliver nothing.
///
/// Two handlers running on different threads must not remove each other, as
/// each removal would wait for the other handler to return.
///
/// ```
/// # use ester::event::{Event, SenderId};
/// # use std::sync::Arc;
/// # use std::sync::atomic::{AtomicUsize, Ordering};
/// let event = Event::new();
/// let count = Arc::new(AtomicUsize::new(0));
/// let id = {
///     let count = count.clone();
///     event.add(Arc::new(move |_: SenderId, n: &usize| { count.fetch_add(*n, Ordering::SeqCst); }))
/// };
/// let me = SenderId::new();
/// event.raise(me, &2);
/// event.remove(id);
/// event.raise(me, &5);
/// assert_eq!(count.load(Ordering::SeqCst), 2);
/// ```
pub struct Event<A> {
    handlers: RwLock<Vec<Arc<Record<A>>>>,
}

impl<A> Event<A> {
    /// Create an event without handlers.
    pub fn new() -> Event<A> {
        Event { handlers: RwLock::new(vec![]) }
    }

    /// Register a handler.
    pub fn add(&self, handler: Handler<A>) -> HandlerId {
        let id = HandlerId(NEXT_HANDLER.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(Record { id, handler, gate: Gate::new() });
        self.handlers.write().unwrap_or_else(PoisonError::into_inner).push(record);
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let removed = {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            handlers.iter()
                .position(|r| r.id == id)
                .map(|idx| handlers.remove(idx))
        };
        match removed {
            Some(record) => {
                record.gate.close();
                true
            }
            None => false,
        }
    }

    /// Call every registered handler, in registration order. A no-op without
    /// handlers.
    pub fn raise(&self, sender: SenderId, args: &A) {
        let snapshot: Vec<_> = self.handlers.read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for record in snapshot {
            if let Some(_pass) = record.gate.enter() {
                (record.handler)(sender, args);
            }
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<A> Default for Event<A> {
    fn default() -> Event<A> { Event::new() }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("handlers", &self.len()).finish()
    }
}


/// One raised notification: who raised it and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPattern<A> {
    /// The raising source.
    pub sender: SenderId,
    /// The payload.
    pub args: A,
}

impl<A: Clone + Send + 'static> Observable<EventPattern<A>> {
    /// Observe a named notification of an event source.
    ///
    /// Every subscription registers its own handler on `source`, so several
    /// subscriptions to the same notification are independent of each other.
    /// The sequence never completes or fails on its own; disposing the
    /// subscription removes the handler before `dispose` returns. If the
    /// source refuses the handler, the subscription fails with that error.
    ///
    /// The observer may dispose the subscription from inside its callback,
    /// also while other threads raise the same notification. It must not
    /// raise the observed notification itself: that nested notification is
    /// dropped.
    pub fn from_event_pattern<S>(source: Arc<S>, event: &str) -> Observable<EventPattern<A>>
        where S: EventSource<A> + ?Sized + 'static,
    {
        let event = event.to_string();
        Observable::from_producer(move |subscriber| {
            let handler: Handler<A> = {
                let subscriber = subscriber.clone();
                Arc::new(move |sender: SenderId, args: &A| {
                    subscriber.on_next(EventPattern { sender, args: args.clone() })
                })
            };
            let id = source.add_handler(&event, handler)?;
            tracing::trace!(event = %event, ?id, "event handler registered");
            let source = source.clone();
            let event = event.clone();
            Ok(disposable::from_fn(move || {
                source.remove_handler(&event, id);
                tracing::trace!(event = %event, ?id, "event handler removed");
            }))
        })
    }
}
