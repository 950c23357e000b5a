//! The subscription protocol.
//!
//! A producer never talks to an observer directly. It gets a `Subscriber`, a
//! guarded channel in front of the observer, and the consumer gets the
//! matching `Subscription`. Both share one state cell:
//!
//! - `Active`: notifications are forwarded.
//! - `Stopped`: a terminal notification went through. Anything after it is a
//!   producer bug and is dropped (and reported to the violation hook).
//! - `Disposed`: the consumer cancelled. Anything after it is dropped
//!   silently, it was simply late.
//!
//! Resources registered with the subscriber (upstream subscriptions, event
//! handlers, custom cleanup) are released when the subscription reaches
//! either `Stopped` or `Disposed`.
//!
//! A fourth state, `Poisoned`, marks a subscription whose observer panicked
//! on another thread. It is closed like the others, and notifications after
//! it are dropped without a report, since the producer did nothing wrong.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::composite::CompositeDisposable;
use crate::disposable::{Disposable, DisposableRef};
use crate::error::Error;
use crate::observer::{Notification, Observer};


const ACTIVE: u8 = 0;
const STOPPED: u8 = 1;
const DISPOSED: u8 = 2;
const POISONED: u8 = 3;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local!(
    static DELIVERING: RefCell<Vec<u64>> = RefCell::new(vec![])
);


/// The current thread is delivering a notification to one subscription.
struct Delivery {
    id: u64,
}

impl Delivery {
    /// `None` if this thread is already delivering to the subscription.
    fn enter(id: u64) -> Option<Delivery> {
        DELIVERING.with(|ids| {
            let mut ids = ids.borrow_mut();
            if ids.contains(&id) {
                None
            } else {
                ids.push(id);
                Some(Delivery { id })
            }
        })
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let _ = DELIVERING.try_with(|ids| {
            let mut ids = ids.borrow_mut();
            if let Some(idx) = ids.iter().rposition(|&id| id == self.id) {
                ids.remove(idx);
            }
        });
    }
}

/// Whether the current thread is inside an observer callback.
pub(crate) fn in_delivery() -> bool {
    DELIVERING.try_with(|ids| !ids.borrow().is_empty()).unwrap_or(false)
}

fn reentered(id: u64) {
    tracing::warn!(subscription = id, "re-entrant notification dropped");
}


/// A notification the protocol refused to deliver because the sequence had
/// already terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `on_next` after `on_error` or `on_completed`.
    NextAfterTerminal,
    /// A second terminal notification, this one an error.
    ErrorAfterTerminal,
    /// A second terminal notification, this one a completion.
    CompletedAfterTerminal,
}

type Hook = Arc<dyn Fn(Violation) + Send + Sync + 'static>;

lazy_static! {
    static ref VIOLATION_HOOK: RwLock<Option<Hook>> = RwLock::new(None);
}

/// Install a process-wide callback invoked whenever a producer breaks the
/// notification grammar. Replaces any previously installed hook.
///
/// Meant for tests: the offending call is still dropped either way.
pub fn set_violation_hook<F>(hook: F)
    where F: Fn(Violation) + Send + Sync + 'static
{
    if let Ok(mut slot) = VIOLATION_HOOK.write() {
        *slot = Some(Arc::new(hook));
    }
}

/// Remove the violation hook.
pub fn clear_violation_hook() {
    if let Ok(mut slot) = VIOLATION_HOOK.write() {
        *slot = None;
    }
}

fn report(id: u64, violation: Violation) {
    tracing::debug!(subscription = id, ?violation, "dropped notification after terminal");
    // Clone out of the lock, the hook may install another hook.
    let hook = VIOLATION_HOOK.read().ok().and_then(|slot| slot.clone());
    if let Some(hook) = hook {
        hook(violation);
    }
}


struct State {
    id: u64,
    status: AtomicU8,
    resources: CompositeDisposable,
}

impl State {
    fn new() -> State {
        State {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            status: AtomicU8::new(ACTIVE),
            resources: CompositeDisposable::new(),
        }
    }

    fn status(&self) -> u8 { self.status.load(Ordering::Acquire) }

    fn dispose(&self) {
        if self.status.swap(DISPOSED, Ordering::AcqRel) != DISPOSED {
            tracing::trace!(subscription = self.id, "disposed");
            self.resources.dispose();
        }
    }
}


type SharedObserver<T> = Arc<Mutex<Box<dyn Observer<T> + Send + 'static>>>;

/// The producer's side of a subscription.
///
/// Every notification goes through here, so the observer sees at most one
/// terminal notification and nothing after it or after disposal. Subscribers
/// are cheap to clone; clones share the same subscription and may be moved to
/// other threads (a timer thread, an event handler).
///
/// Producers running a loop or a timer should check `is_closed` before each
/// emission and stop once it returns `true`.
///
/// Delivery to one observer is serialized. An observer must not cause a
/// notification of its own subscription on the same thread, for instance by
/// raising the event it observes: such a nested notification is dropped and
/// logged at warn level.
pub struct Subscriber<T> {
    state: Arc<State>,
    observer: SharedObserver<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Subscriber<T> {
        Subscriber { state: self.state.clone(), observer: self.observer.clone() }
    }
}

impl<T> Subscriber<T> {
    /// Wrap an observer into a fresh, active subscription.
    pub fn new<O: Observer<T> + Send + 'static>(observer: O) -> Subscriber<T> {
        let state = Arc::new(State::new());
        tracing::trace!(subscription = state.id, "subscribed");
        Subscriber { state, observer: Arc::new(Mutex::new(Box::new(observer))) }
    }

    /// Whether the subscription ended, by a terminal notification or disposal.
    pub fn is_closed(&self) -> bool { self.state.status() != ACTIVE }

    /// The consumer's handle for this subscription.
    pub fn subscription(&self) -> Subscription {
        Subscription { state: self.state.clone() }
    }

    /// Tie a resource to this subscription. It is released when the
    /// subscription terminates or is disposed, or immediately if that has
    /// already happened.
    pub fn add(&self, resource: DisposableRef) {
        self.state.resources.add(resource);
    }

    fn lock(&self) -> Option<MutexGuard<'_, Box<dyn Observer<T> + Send + 'static>>> {
        match self.observer.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                // The observer panicked in an earlier callback. Treat the
                // subscription as finished.
                tracing::warn!(subscription = self.state.id, "observer poisoned, closing subscription");
                let _ = self.state.status
                    .compare_exchange(ACTIVE, POISONED, Ordering::AcqRel, Ordering::Acquire);
                self.state.resources.dispose();
                None
            }
        }
    }

    /// Forward a value.
    pub fn on_next(&self, value: T) {
        match self.state.status() {
            ACTIVE => {}
            STOPPED => return report(self.state.id, Violation::NextAfterTerminal),
            _ => return,
        }
        let _delivery = match Delivery::enter(self.state.id) {
            Some(delivery) => delivery,
            None => return reentered(self.state.id),
        };
        if let Some(mut observer) = self.lock() {
            // A terminal notification or a dispose may have won the race for
            // the lock.
            if self.state.status() == ACTIVE {
                observer.on_next(value);
            }
        }
    }

    /// Terminate with an error.
    pub fn on_error(&self, error: Error) {
        self.terminate(Notification::Error(error), Violation::ErrorAfterTerminal);
    }

    /// Terminate successfully.
    pub fn on_completed(&self) {
        self.terminate(Notification::Completed, Violation::CompletedAfterTerminal);
    }

    fn terminate(&self, notification: Notification<T>, violation: Violation) {
        let _delivery = match Delivery::enter(self.state.id) {
            Some(delivery) => delivery,
            None => return reentered(self.state.id),
        };
        let won = self.state.status
            .compare_exchange(ACTIVE, STOPPED, Ordering::AcqRel, Ordering::Acquire);
        match won {
            Ok(_) => {
                if let Some(mut observer) = self.lock() {
                    notification.accept(&mut **observer);
                }
                self.state.resources.dispose();
            }
            Err(STOPPED) => report(self.state.id, violation),
            Err(_) => {}
        }
    }
}

impl<T> Observer<T> for Subscriber<T> {
    fn on_next(&mut self, value: T) { Subscriber::on_next(self, value) }
    fn on_error(&mut self, error: Error) { Subscriber::on_error(self, error) }
    fn on_completed(&mut self) { Subscriber::on_completed(self) }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.state.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}


/// The consumer's handle on a subscription.
///
/// Disposing it stops delivery to the observer and releases every resource
/// the producer tied to the subscription. Dropping the handle does *not*
/// dispose it: a subscription whose handle was discarded keeps running until
/// its sequence terminates.
#[derive(Clone)]
pub struct Subscription {
    state: Arc<State>,
}

impl Subscription {
    /// Whether the subscription ended, by a terminal notification or disposal.
    pub fn is_closed(&self) -> bool { self.state.status() != ACTIVE }
}

impl Disposable for Subscription {
    fn dispose(&self) { self.state.dispose() }
    fn is_disposed(&self) -> bool { self.state.status() == DISPOSED }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.state.status() {
            ACTIVE => "active",
            STOPPED => "stopped",
            POISONED => "poisoned",
            _ => "disposed",
        };
        f.debug_struct("Subscription")
            .field("id", &self.state.id)
            .field("status", &status)
            .finish()
    }
}
