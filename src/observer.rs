//! Observers and materialized notifications.

use std::fmt;

use crate::error::Error;


/// The sink a subscription notifies.
///
/// `on_next` may be called any number of times, followed by at most one of
/// `on_error` or `on_completed`. Nothing is delivered after a terminal call.
/// The subscription protocol enforces this on behalf of the observer, so
/// implementations do not need to guard against misbehaving producers.
pub trait Observer<T> {
    /// Receive the next value.
    fn on_next(&mut self, value: T);

    /// Receive the failure that terminated the sequence.
    fn on_error(&mut self, error: Error);

    /// The sequence finished normally.
    fn on_completed(&mut self);
}

impl<T, O: Observer<T> + ?Sized> Observer<T> for Box<O> {
    fn on_next(&mut self, value: T) { (**self).on_next(value) }
    fn on_error(&mut self, error: Error) { (**self).on_error(error) }
    fn on_completed(&mut self) { (**self).on_completed() }
}


type NextFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnMut(Error) + Send>;
type CompletedFn = Box<dyn FnMut() + Send>;

/// An observer assembled from closures.
///
/// ```
/// # use ester::{Observable, FnObserver};
/// let observer = FnObserver::new(|x: i32| println!("{}", x))
///     .on_error(|e| eprintln!("{}", e))
///     .on_completed(|| println!("done"));
/// Observable::just(42).subscribe(observer);
/// ```
pub struct FnObserver<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl<T> FnObserver<T> {
    /// Observer for values only.
    ///
    /// Errors reaching an observer without an error callback are logged and
    /// otherwise dropped.
    pub fn new<F: FnMut(T) + Send + 'static>(next: F) -> FnObserver<T> {
        FnObserver { next: Box::new(next), error: None, completed: None }
    }

    /// Set the error callback.
    pub fn on_error<F: FnMut(Error) + Send + 'static>(mut self, f: F) -> FnObserver<T> {
        self.error = Some(Box::new(f));
        self
    }

    /// Set the completion callback.
    pub fn on_completed<F: FnMut() + Send + 'static>(mut self, f: F) -> FnObserver<T> {
        self.completed = Some(Box::new(f));
        self
    }
}

impl<T> Observer<T> for FnObserver<T> {
    fn on_next(&mut self, value: T) { (self.next)(value) }

    fn on_error(&mut self, error: Error) {
        match &mut self.error {
            Some(f) => f(error),
            None => tracing::warn!(%error, "unhandled error in observable sequence"),
        }
    }

    fn on_completed(&mut self) {
        if let Some(f) = &mut self.completed {
            f();
        }
    }
}

impl<T> fmt::Debug for FnObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver")
            .field("error", &self.error.is_some())
            .field("completed", &self.completed.is_some())
            .finish()
    }
}


/// A single notification, reified as a value.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    /// A value.
    Next(T),
    /// Terminal failure.
    Error(Error),
    /// Terminal success.
    Completed,
}

impl<T> Notification<T> {
    /// Whether this notification ends the sequence.
    pub fn is_terminal(&self) -> bool {
        match self {
            Notification::Next(_) => false,
            Notification::Error(_) | Notification::Completed => true,
        }
    }

    /// The carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Notification::Next(v) => Some(v),
            _ => None,
        }
    }

    /// Deliver this notification to an observer.
    pub fn accept<O: Observer<T> + ?Sized>(self, observer: &mut O) {
        match self {
            Notification::Next(v) => observer.on_next(v),
            Notification::Error(e) => observer.on_error(e),
            Notification::Completed => observer.on_completed(),
        }
    }
}
