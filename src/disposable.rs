//! Releasable resources.
//!
//! A `Disposable` is the handle every subscription, timer and event
//! registration hands back to its owner. Disposing is idempotent: the first
//! call releases the resource, every later call does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};


/// A releasable resource.
pub trait Disposable: Send + Sync {
    /// Release the resource. Safe to call any number of times.
    fn dispose(&self);

    /// Whether `dispose` has been called.
    fn is_disposed(&self) -> bool;
}

/// A shared, type-erased disposable.
pub type DisposableRef = Arc<dyn Disposable>;

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) { (**self).dispose() }
    fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) { (**self).dispose() }
    fn is_disposed(&self) -> bool { (**self).is_disposed() }
}


/// A disposable with nothing to release.
#[derive(Debug, Default)]
pub struct EmptyDisposable {
    flag: BooleanDisposable,
}

impl EmptyDisposable {
    /// Create a new empty disposable.
    pub fn new() -> EmptyDisposable { EmptyDisposable::default() }
}

impl Disposable for EmptyDisposable {
    fn dispose(&self) { self.flag.dispose() }
    fn is_disposed(&self) -> bool { self.flag.is_disposed() }
}


/// A disposable that only records whether it has been disposed.
///
/// This is the cancellation flag cooperative producers poll before each
/// emission. The transition happens in a single atomic swap, so it may be
/// flipped from one thread while another one is checking it.
#[derive(Debug, Default)]
pub struct BooleanDisposable {
    disposed: AtomicBool,
}

impl BooleanDisposable {
    /// Create a new, not yet disposed flag.
    pub fn new() -> BooleanDisposable { BooleanDisposable::default() }

    /// Flip the flag, returning `true` only for the call that flipped it.
    pub(crate) fn set(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }
}

impl Disposable for BooleanDisposable {
    fn dispose(&self) { self.set(); }
    fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}


type Action = Box<dyn FnOnce() + Send + 'static>;

/// A disposable running a cleanup action exactly once.
pub struct ActionDisposable {
    action: Mutex<Option<Action>>,
    flag: BooleanDisposable,
}

impl ActionDisposable {
    /// Wrap a cleanup action.
    pub fn new<F: FnOnce() + Send + 'static>(action: F) -> ActionDisposable {
        ActionDisposable {
            action: Mutex::new(Some(Box::new(action))),
            flag: BooleanDisposable::new(),
        }
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        if self.flag.set() {
            // Take the action out before running it, so it may dispose us again.
            let action = self.action.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(action) = action {
                action();
            }
        }
    }

    fn is_disposed(&self) -> bool { self.flag.is_disposed() }
}

impl fmt::Debug for ActionDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}


/// Create a disposable running `action` on first disposal.
pub fn from_fn<F: FnOnce() + Send + 'static>(action: F) -> DisposableRef {
    Arc::new(ActionDisposable::new(action))
}

/// Create a disposable with nothing to release.
pub fn empty() -> DisposableRef {
    Arc::new(EmptyDisposable::new())
}
