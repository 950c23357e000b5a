//! One-shot asynchronous results.
//!
//! A `Task` is a unit of work that eventually yields exactly one value or one
//! error. `from_async_result` adapts it into a sequence of at most one value.

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::disposable;
use crate::error::{Error, Result};
use crate::observable::Observable;
use crate::subscriber::Subscriber;


type Continuation<T> = Box<dyn FnOnce(&Result<T>) + Send + 'static>;

enum TaskState<T> {
    Pending { next_key: u64, waiting: Vec<(u64, Continuation<T>)> },
    Finished(Arc<Result<T>>),
}

struct Inner<T> {
    state: Mutex<TaskState<T>>,
    finished: Condvar,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, TaskState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, result: Result<T>) {
        let result = Arc::new(result);
        let waiting = {
            let mut state = self.lock();
            let waiting = match &mut *state {
                TaskState::Pending { waiting, .. } => mem::replace(waiting, vec![]),
                TaskState::Finished(_) => return,
            };
            *state = TaskState::Finished(result.clone());
            waiting
        };
        self.finished.notify_all();
        // Outside the lock, a continuation may look at the task again.
        for (_, continuation) in waiting {
            continuation(&result);
        }
    }
}


/// A unit of asynchronous work yielding one result.
///
/// ```
/// # use ester::Task;
/// let task = Task::spawn(|| Ok(20 + 30));
/// assert_eq!(task.wait().unwrap(), 50);
/// ```
pub struct Task<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Task<T> { Task { inner: self.inner.clone() } }
}

impl<T: Send + Sync + 'static> Task<T> {
    /// A task that has not finished yet, and the handle that finishes it.
    pub fn pending() -> (Task<T>, Completer<T>) {
        let inner = Arc::new(Inner {
            state: Mutex::new(TaskState::Pending { next_key: 0, waiting: vec![] }),
            finished: Condvar::new(),
        });
        (Task { inner: inner.clone() }, Completer { inner: Some(inner) })
    }

    /// A task that has already finished.
    pub fn from_result(result: Result<T>) -> Task<T> {
        Task {
            inner: Arc::new(Inner {
                state: Mutex::new(TaskState::Finished(Arc::new(result))),
                finished: Condvar::new(),
            }),
        }
    }

    /// Run `work` on a new thread. A panic in `work` finishes the task with
    /// `Error::Panicked`.
    pub fn spawn<F>(work: F) -> Task<T>
        where F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (task, completer) = Task::pending();
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|payload| Err(Error::from_panic("task", payload)));
            completer.complete(result);
        });
        task
    }

    /// Whether the task has produced its result.
    pub fn is_completed(&self) -> bool {
        match &*self.inner.lock() {
            TaskState::Finished(_) => true,
            TaskState::Pending { .. } => false,
        }
    }

    /// Run `f` with the result: right away if the task is finished, otherwise
    /// once it finishes. Returns a key to cancel a deferred call.
    fn on_complete<F>(&self, f: F) -> Option<u64>
        where F: FnOnce(&Result<T>) + Send + 'static,
    {
        let finished = {
            let mut state = self.inner.lock();
            match &mut *state {
                TaskState::Pending { next_key, waiting } => {
                    let key = *next_key;
                    *next_key += 1;
                    waiting.push((key, Box::new(f)));
                    return Some(key);
                }
                TaskState::Finished(result) => result.clone(),
            }
        };
        f(&finished);
        None
    }

    fn cancel(&self, key: u64) {
        if let TaskState::Pending { waiting, .. } = &mut *self.inner.lock() {
            waiting.retain(|(k, _)| *k != key);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Task<T> {
    /// The result, if the task has finished.
    pub fn result(&self) -> Option<Result<T>> {
        match &*self.inner.lock() {
            TaskState::Finished(result) => Some((**result).clone()),
            TaskState::Pending { .. } => None,
        }
    }

    /// Block until the task finishes and return its result.
    pub fn wait(&self) -> Result<T> {
        let mut state = self.inner.lock();
        loop {
            if let TaskState::Finished(result) = &*state {
                return (**result).clone();
            }
            state = self.inner.finished.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completed = match &*self.inner.lock() {
            TaskState::Finished(_) => true,
            TaskState::Pending { .. } => false,
        };
        f.debug_struct("Task").field("completed", &completed).finish()
    }
}


/// Finishes a pending `Task`.
///
/// Dropping a completer without calling `complete` finishes the task with
/// `Error::Abandoned`.
pub struct Completer<T> {
    inner: Option<Arc<Inner<T>>>,
}

impl<T> Completer<T> {
    /// Finish the task with a result.
    pub fn complete(mut self, result: Result<T>) {
        if let Some(inner) = self.inner.take() {
            inner.finish(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.finish(Err(Error::Abandoned));
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").field("done", &self.inner.is_none()).finish()
    }
}


fn deliver<T: Clone>(subscriber: &Subscriber<T>, result: &Result<T>) {
    match result {
        Ok(value) => {
            subscriber.on_next(value.clone());
            subscriber.on_completed();
        }
        Err(error) => subscriber.on_error(error.clone()),
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Adapt a task into a sequence (Rx's `ToObservable` on a task).
    ///
    /// Emits the task's value and completes, or fails with its error. If the
    /// task has already finished at subscribe time, delivery happens
    /// synchronously inside `subscribe`; otherwise it happens on whichever
    /// thread finishes the task. Disposing before then drops the delivery.
    ///
    /// ```
    /// # use ester::{Observable, Task};
    /// let task = Task::from_result(Ok(50));
    /// let mut events = Observable::from_async_result(task).events();
    /// assert_eq!(events.next().unwrap().unwrap(), 50);
    /// assert!(events.next().is_none());
    /// ```
    pub fn from_async_result(task: Task<T>) -> Observable<T> {
        Observable::from_producer(move |subscriber: Subscriber<T>| {
            let target = subscriber.clone();
            match task.on_complete(move |result| deliver(&target, result)) {
                Some(key) => {
                    let task = task.clone();
                    Ok(disposable::from_fn(move || task.cancel(key)))
                }
                None => Ok(disposable::empty()),
            }
        })
    }
}
