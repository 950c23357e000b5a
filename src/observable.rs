//! Observable sequences and the subscribe entry points.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use crate::disposable::{self, Disposable, DisposableRef};
use crate::error::{Error, Result};
use crate::observer::{FnObserver, Notification, Observer};
use crate::subscriber::{Subscriber, Subscription};


type Producer<T> = dyn Fn(Subscriber<T>) -> Result<DisposableRef> + Send + Sync + 'static;

/// A deferred, repeatable sequence of values ending in an error or a
/// completion.
///
/// An observable is just its producing logic. Nothing happens until it is
/// subscribed, and every subscription runs the producing logic anew, so two
/// subscriptions never share values or state unless the producer itself is
/// shared (as with an event source).
///
/// Operators take an observable and return a new one, so they chain:
///
/// ```
/// # use ester::Observable;
/// # use std::sync::{Arc, Mutex};
/// let seen = Arc::new(Mutex::new(vec![]));
/// let sink = seen.clone();
/// Observable::range(1, 10).unwrap()
///     .filter(|x| x % 3 == 0)
///     .map(|x| x * 10)
///     .subscribe_next(move |x| sink.lock().unwrap().push(x));
/// assert_eq!(*seen.lock().unwrap(), vec![30, 60, 90]);
/// ```
///
/// # Algebraic laws
///
/// `filter` and `map` behave like their iterator counterparts:
///
/// - `a.filter(|_| true)` emits the same notifications as `a`,
/// - `a.filter(p).filter(q)` emits the same as `a.filter(|x| p(x) && q(x))`,
/// - `a.map(f).map(g)` emits the same as `a.map(|x| g(f(x)))`.
pub struct Observable<T> {
    producer: Arc<Producer<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Observable<T> {
        Observable { producer: self.producer.clone() }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Observable")
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build an observable from raw producing logic.
    ///
    /// The producer returns the cleanup to run when the subscription ends, or
    /// fails before it gets going. A failure is delivered as `on_error`.
    pub(crate) fn from_producer<F>(producer: F) -> Observable<T>
        where F: Fn(Subscriber<T>) -> Result<DisposableRef> + Send + Sync + 'static
    {
        Observable { producer: Arc::new(producer) }
    }

    /// Run the producing logic against an existing subscriber.
    ///
    /// Neither an `Err` nor a panic escapes: both become the subscriber's
    /// `on_error`. Operators use this to wire up upstream subscriptions whose
    /// handle they registered with their own subscriber beforehand.
    pub(crate) fn run(&self, subscriber: Subscriber<T>) {
        let producer = &self.producer;
        let started = {
            let subscriber = subscriber.clone();
            panic::catch_unwind(AssertUnwindSafe(move || (**producer)(subscriber)))
        };
        match started {
            Ok(Ok(cleanup)) => subscriber.add(cleanup),
            Ok(Err(error)) => subscriber.on_error(error),
            Err(payload) => subscriber.on_error(Error::from_panic("subscribe", payload)),
        }
    }

    /// Subscribe an observer.
    ///
    /// Synchronous producers have run to completion by the time this returns.
    /// The returned handle stops delivery when disposed.
    pub fn subscribe<O: Observer<T> + Send + 'static>(&self, observer: O) -> Subscription {
        let subscriber = Subscriber::new(observer);
        self.run(subscriber.clone());
        subscriber.subscription()
    }

    /// Subscribe a closure to the values only.
    pub fn subscribe_next<F: FnMut(T) + Send + 'static>(&self, next: F) -> Subscription {
        self.subscribe(FnObserver::new(next))
    }

    /// Subscribe closures for all three notifications.
    pub fn subscribe_all<N, E, C>(&self, next: N, error: E, completed: C) -> Subscription
        where N: FnMut(T) + Send + 'static,
              E: FnMut(Error) + Send + 'static,
              C: FnMut() + Send + 'static,
    {
        self.subscribe(FnObserver::new(next).on_error(error).on_completed(completed))
    }

    /// Keep only the values satisfying a predicate.
    ///
    /// Errors and completion pass through unchanged. A panicking predicate
    /// terminates the derived sequence with `Error::Panicked` and disposes the
    /// upstream subscription.
    pub fn filter<P>(&self, predicate: P) -> Observable<T>
        where P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.try_filter(move |v| Ok(predicate(v)))
    }

    /// Like `filter`, with a fallible predicate. An `Err` terminates the
    /// derived sequence with that error.
    pub fn try_filter<P>(&self, predicate: P) -> Observable<T>
        where P: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Observable::from_producer(move |downstream| {
            let upstream = Subscriber::new(Filter {
                downstream: downstream.clone(),
                predicate: predicate.clone(),
            });
            // Registered before the source starts, so a synchronous source
            // sees the cancellation as soon as the downstream ends.
            downstream.add(Arc::new(upstream.subscription()));
            source.run(upstream);
            Ok(disposable::empty())
        })
    }

    /// Transform each value.
    ///
    /// A panicking function terminates the derived sequence with
    /// `Error::Panicked` and disposes the upstream subscription.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
        where U: Send + 'static,
              F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::from_producer(move |downstream| {
            let upstream = Subscriber::new(Map { downstream: downstream.clone(), f: f.clone() });
            downstream.add(Arc::new(upstream.subscription()));
            source.run(upstream);
            Ok(disposable::empty())
        })
    }

    /// A blocking iterator over the sequence.
    ///
    /// Yields `Ok` for each value and a final `Err` if the sequence fails.
    /// Dropping the iterator disposes the underlying subscription.
    pub fn events(&self) -> Events<T> {
        let (tx, rx) = channel();
        let subscription = self.subscribe(ChannelObserver { tx });
        Events { receiver: rx, subscription, done: false }
    }
}


struct Filter<T, P> {
    downstream: Subscriber<T>,
    predicate: Arc<P>,
}

impl<T, P> Observer<T> for Filter<T, P>
    where P: Fn(&T) -> Result<bool>,
{
    fn on_next(&mut self, value: T) {
        let predicate = &self.predicate;
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| (**predicate)(&value)));
        match verdict {
            Ok(Ok(true)) => self.downstream.on_next(value),
            Ok(Ok(false)) => {}
            Ok(Err(error)) => self.downstream.on_error(error),
            Err(payload) => self.downstream.on_error(Error::from_panic("filter", payload)),
        }
    }

    fn on_error(&mut self, error: Error) { self.downstream.on_error(error) }
    fn on_completed(&mut self) { self.downstream.on_completed() }
}


struct Map<T, F> {
    downstream: Subscriber<T>,
    f: Arc<F>,
}

impl<A, B, F> Observer<A> for Map<B, F>
    where F: Fn(A) -> B,
{
    fn on_next(&mut self, value: A) {
        let f = &self.f;
        match panic::catch_unwind(AssertUnwindSafe(|| (**f)(value))) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(payload) => self.downstream.on_error(Error::from_panic("map", payload)),
        }
    }

    fn on_error(&mut self, error: Error) { self.downstream.on_error(error) }
    fn on_completed(&mut self) { self.downstream.on_completed() }
}


struct ChannelObserver<T> {
    tx: Sender<Notification<T>>,
}

impl<T> Observer<T> for ChannelObserver<T> {
    // A send only fails once the iterator is gone, and then the subscription
    // is disposed anyway.
    fn on_next(&mut self, value: T) { let _ = self.tx.send(Notification::Next(value)); }
    fn on_error(&mut self, error: Error) { let _ = self.tx.send(Notification::Error(error)); }
    fn on_completed(&mut self) { let _ = self.tx.send(Notification::Completed); }
}


/// A blocking iterator over the notifications of a sequence.
pub struct Events<T> {
    receiver: Receiver<Notification<T>>,
    subscription: Subscription,
    done: bool,
}

impl<T> Events<T> {
    /// The subscription feeding this iterator.
    pub fn subscription(&self) -> &Subscription { &self.subscription }
}

impl<T> Iterator for Events<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        match self.receiver.recv() {
            Ok(Notification::Next(value)) => Some(Ok(value)),
            Ok(Notification::Error(error)) => {
                self.done = true;
                Some(Err(error))
            }
            Ok(Notification::Completed) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

impl<T> Drop for Events<T> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}
