//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ester::{Error, Event, EventSource, Handler, HandlerId, Observer, Result, SenderId};


/// Payload of the text editor's notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineArgs {
    pub line: String,
}

/// A line-buffering editor that announces every line before and after
/// writing it.
pub struct TextEditor {
    id: SenderId,
    before_writing_line: Event<LineArgs>,
    after_writing_line: Event<LineArgs>,
    lines: Mutex<Vec<String>>,
}

impl TextEditor {
    pub const BEFORE_WRITING_LINE: &'static str = "BeforeWritingLine";
    pub const AFTER_WRITING_LINE: &'static str = "AfterWritingLine";

    pub fn new() -> Arc<TextEditor> {
        Arc::new(TextEditor {
            id: SenderId::new(),
            before_writing_line: Event::new(),
            after_writing_line: Event::new(),
            lines: Mutex::new(vec![]),
        })
    }

    pub fn id(&self) -> SenderId { self.id }

    pub fn write_line(&self, line: &str) {
        let args = LineArgs { line: line.to_string() };
        self.before_writing_line.raise(self.id, &args);
        self.lines.lock().unwrap().push(args.line.clone());
        self.after_writing_line.raise(self.id, &args);
    }

    pub fn text(&self) -> String {
        self.lines.lock().unwrap().join("\n")
    }

    pub fn handler_count(&self) -> usize {
        self.before_writing_line.len() + self.after_writing_line.len()
    }

    fn event(&self, name: &str) -> Result<&Event<LineArgs>> {
        match name {
            TextEditor::BEFORE_WRITING_LINE => Ok(&self.before_writing_line),
            TextEditor::AFTER_WRITING_LINE => Ok(&self.after_writing_line),
            _ => Err(Error::UnknownEvent { name: name.to_string() }),
        }
    }
}

impl EventSource<LineArgs> for TextEditor {
    fn add_handler(&self, event: &str, handler: Handler<LineArgs>) -> Result<HandlerId> {
        Ok(self.event(event)?.add(handler))
    }

    fn remove_handler(&self, event: &str, id: HandlerId) {
        if let Ok(event) = self.event(event) {
            event.remove(id);
        }
    }
}


/// Counts notifications and keeps the values around.
pub struct Counter<T> {
    pub values: Arc<Mutex<Vec<T>>>,
    pub errors: Arc<AtomicUsize>,
    pub completions: Arc<AtomicUsize>,
}

impl<T> Counter<T> {
    pub fn new() -> Counter<T> {
        Counter {
            values: Arc::new(Mutex::new(vec![])),
            errors: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn nexts(&self) -> usize { self.values.lock().unwrap().len() }
    pub fn errors(&self) -> usize { self.errors.load(Ordering::SeqCst) }
    pub fn completions(&self) -> usize { self.completions.load(Ordering::SeqCst) }
}

impl<T: Clone> Counter<T> {
    pub fn values(&self) -> Vec<T> { self.values.lock().unwrap().clone() }
}

impl<T> Clone for Counter<T> {
    fn clone(&self) -> Counter<T> {
        Counter {
            values: self.values.clone(),
            errors: self.errors.clone(),
            completions: self.completions.clone(),
        }
    }
}

impl<T> Observer<T> for Counter<T> {
    fn on_next(&mut self, value: T) { self.values.lock().unwrap().push(value); }
    fn on_error(&mut self, _: Error) { self.errors.fetch_add(1, Ordering::SeqCst); }
    fn on_completed(&mut self) { self.completions.fetch_add(1, Ordering::SeqCst); }
}
