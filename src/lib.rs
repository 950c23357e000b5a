//! A minimal reactive-stream runtime
//!
//! *Ester* provides push-based observable sequences in the style of the
//! Reactive Extensions, together with the subscription protocol that keeps
//! them well-behaved and a small set of creation operators.
//!
//! An `Observable<T>` is a recipe for producing values. Nothing happens until
//! an `Observer` subscribes; every subscription runs the producer afresh and
//! gets its own `Subscription` handle. Through that subscription the observer
//! receives zero or more values followed by at most one terminal
//! notification, either an error or completion. Nothing is delivered after
//! the terminal notification or after the subscription is disposed.
//!
//!
//! # Example
//!
//! ```
//! # // NOTE: If you change this example, please update the README.md
//! # // accordingly, so that they remain in sync!
//! use ester::{Disposable, Observable};
//! use std::sync::{Arc, Mutex};
//!
//! // A sequence is created lazily...
//! let squares = Observable::generate(1, |&i| i < 5, |i| i + 1, |&i| i * i);
//!
//! // ...and runs once per subscription.
//! let seen = Arc::new(Mutex::new(vec![]));
//! let sub = {
//!     let seen = seen.clone();
//!     squares.subscribe_next(move |x| seen.lock().unwrap().push(x))
//! };
//! assert_eq!(*seen.lock().unwrap(), vec![1, 4, 9, 16]);
//!
//! // A completed subscription is closed; disposing it again is harmless.
//! assert!(sub.is_closed());
//! sub.dispose();
//!
//! // Sequences can also be consumed as a blocking iterator.
//! let evens: Vec<i64> = Observable::range(0, 10).unwrap()
//!     .filter(|x| x % 2 == 0)
//!     .events()
//!     .map(Result::unwrap)
//!     .collect();
//! assert_eq!(evens, vec![0, 2, 4, 6, 8]);
//! ```
//!
//!
//! # Events
//!
//! The `event` module contains a light-weight implementation of the classic
//! observer pattern: objects raise named notifications through `Event`
//! handler lists, and `Observable::from_event_pattern` adapts one such
//! notification into a sequence. Disposing the subscription removes the
//! handler again.
//!
//!
//! # Threads
//!
//! All types are `Send + Sync` and may be shared between threads. Callbacks
//! run on whichever thread produces the notification: the subscribing thread
//! for synchronous sources, the raising thread for events, a timer thread for
//! `interval` and the finishing thread for tasks. Notifications to a single
//! observer never overlap.
//!
//! Panics in user-supplied closures are caught and delivered downstream as
//! `Error::Panicked`.

#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;

pub use crate::composite::CompositeDisposable;
pub use crate::disposable::{
    ActionDisposable, BooleanDisposable, Disposable, DisposableRef, EmptyDisposable,
};
pub use crate::error::{Error, Result};
pub use crate::event::{Event, EventPattern, EventSource, Handler, HandlerId, SenderId};
pub use crate::observable::{Events, Observable};
pub use crate::observer::{FnObserver, Notification, Observer};
pub use crate::subscriber::{
    clear_violation_hook, set_violation_hook, Subscriber, Subscription, Violation,
};
pub use crate::task::{Completer, Task};

mod error;
pub mod disposable;
mod composite;
mod observer;
mod subscriber;
mod observable;
mod creation;
pub mod event;
mod task;
mod interval;
#[cfg(test)]
mod testing;
