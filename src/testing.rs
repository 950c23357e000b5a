//! Utilities for the test suite.

use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::observer::{Notification, Observer};


/// An observer writing every notification into a shared log.
pub struct Recorder<T> {
    log: Arc<Mutex<Vec<Notification<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Recorder<T> { Recorder { log: self.log.clone() } }
}

impl<T> Recorder<T> {
    pub fn new() -> Recorder<T> { Recorder { log: Arc::new(Mutex::new(vec![])) } }

    pub fn completions(&self) -> usize {
        self.log.lock().unwrap().iter()
            .filter(|n| matches!(n, Notification::Completed))
            .count()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.log.lock().unwrap().iter()
            .filter_map(|n| match n {
                Notification::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Total number of notifications of any kind.
    pub fn len(&self) -> usize { self.log.lock().unwrap().len() }
}

impl<T: Clone> Recorder<T> {
    pub fn values(&self) -> Vec<T> {
        self.log.lock().unwrap().iter()
            .filter_map(|n| n.value().cloned())
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification<T>> {
        self.log.lock().unwrap().clone()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn on_next(&mut self, value: T) { self.log.lock().unwrap().push(Notification::Next(value)) }
    fn on_error(&mut self, error: Error) { self.log.lock().unwrap().push(Notification::Error(error)) }
    fn on_completed(&mut self) { self.log.lock().unwrap().push(Notification::Completed) }
}
