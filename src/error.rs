//! Failures delivered through `on_error`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shorthand for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A failure travelling through a sequence.
///
/// Errors are data in this crate: a producer that fails, a predicate that
/// panics or an event source that rejects a handler all end up as a single
/// `on_error` notification carrying one of these values. The type is cheap to
/// clone, so one failure can be handed to several observers.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A failure described by a message only.
    #[error("{0}")]
    Message(String),

    /// An operator was constructed with an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// User code panicked while the runtime was driving it.
    #[error("panicked in {context}: {message}")]
    Panicked {
        /// The piece of user code that panicked.
        context: &'static str,
        /// The panic message, if it had one.
        message: String,
    },

    /// The event source does not raise a notification with this name.
    #[error("unknown event: {name}")]
    UnknownEvent {
        /// Requested notification name.
        name: String,
    },

    /// A task's completer was dropped before it produced a result.
    #[error("task was abandoned before completing")]
    Abandoned,

    /// Any other error type.
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An error carrying just a message.
    pub fn msg<M: fmt::Display>(message: M) -> Error {
        Error::Message(message.to_string())
    }

    /// Wrap an arbitrary error.
    pub fn other<E: std::error::Error + Send + Sync + 'static>(error: E) -> Error {
        Error::Other(Arc::new(error))
    }

    /// Convert a caught panic payload.
    pub(crate) fn from_panic(context: &'static str, payload: Box<dyn Any + Send>) -> Error {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked { context, message }
    }
}
