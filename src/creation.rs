//! Creation operators.
//!
//! Standard ways to build an observable from plain values, a loop or a
//! hand-written producer. All of them are cold and synchronous: the whole
//! sequence (or as much of it as the subscriber lets through) is delivered
//! during the call to `subscribe`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::disposable::{self, Disposable, DisposableRef};
use crate::error::{Error, Result};
use crate::observable::Observable;
use crate::subscriber::Subscriber;


impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Emit a single value, then complete (Rx's `Return`).
    ///
    /// ```
    /// # use ester::Observable;
    /// let mut events = Observable::just(42).events();
    /// assert_eq!(events.next().unwrap().unwrap(), 42);
    /// assert!(events.next().is_none());
    /// ```
    pub fn just(value: T) -> Observable<T> {
        Observable::from_producer(move |subscriber| {
            subscriber.on_next(value.clone());
            subscriber.on_completed();
            Ok(disposable::empty())
        })
    }

    /// Emit the items of a collection in order, then complete.
    ///
    /// The collection is cloned for every subscription.
    pub fn from_iter<I>(items: I) -> Observable<T>
        where I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    {
        Observable::from_producer(move |subscriber| {
            for item in items.clone() {
                if subscriber.is_closed() {
                    break;
                }
                subscriber.on_next(item);
            }
            subscriber.on_completed();
            Ok(disposable::empty())
        })
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Complete immediately without emitting anything.
    pub fn empty() -> Observable<T> {
        Observable::from_producer(|subscriber: Subscriber<T>| {
            subscriber.on_completed();
            Ok(disposable::empty())
        })
    }

    /// Fail immediately with `error`.
    pub fn throw(error: Error) -> Observable<T> {
        Observable::from_producer(move |subscriber: Subscriber<T>| {
            subscriber.on_error(error.clone());
            Ok(disposable::empty())
        })
    }

    /// Never emit, never terminate.
    ///
    /// Useful where an observable is required but no notifications are
    /// expected.
    pub fn never() -> Observable<T> {
        Observable::from_producer(|_| Ok(disposable::empty()))
    }

    /// Build an observable from a subscribe function.
    ///
    /// `subscribe` gets the subscriber to notify and returns a disposable with
    /// whatever cleanup its logic needs. That cleanup runs when the
    /// subscription is disposed or terminates, whichever comes first; if the
    /// sequence already terminated while `subscribe` was running, it runs as
    /// soon as `subscribe` returns.
    ///
    /// ```
    /// # use ester::{Observable, disposable};
    /// let numbers = Observable::create(|subscriber| {
    ///     subscriber.on_next(1);
    ///     subscriber.on_next(2);
    ///     subscriber.on_next(3);
    ///     subscriber.on_completed();
    ///     disposable::empty()
    /// });
    /// let values: Vec<i32> = numbers.events().map(Result::unwrap).collect();
    /// assert_eq!(values, vec![1, 2, 3]);
    /// ```
    pub fn create<F, D>(subscribe: F) -> Observable<T>
        where F: Fn(Subscriber<T>) -> D + Send + Sync + 'static,
              D: Disposable + 'static,
    {
        Observable::from_producer(move |subscriber| {
            Ok(Arc::new(subscribe(subscriber)) as DisposableRef)
        })
    }

    /// Like `create`, with a subscribe function that may fail before it
    /// starts. The error is delivered as `on_error`.
    pub fn try_create<F, D>(subscribe: F) -> Observable<T>
        where F: Fn(Subscriber<T>) -> Result<D> + Send + Sync + 'static,
              D: Disposable + 'static,
    {
        Observable::from_producer(move |subscriber| {
            subscribe(subscriber).map(|d| Arc::new(d) as DisposableRef)
        })
    }

    /// Run a state machine (Rx's `Generate`).
    ///
    /// Starting from `seed`: while `condition(&state)` holds, emit
    /// `selector(&state)` and advance with `state = iterate(state)`. Completes
    /// once the condition fails. An always-true condition makes an unbounded
    /// sequence that only stops when the subscription is disposed.
    ///
    /// A panic in any of the three functions terminates the sequence with
    /// `Error::Panicked`.
    ///
    /// ```
    /// # use ester::Observable;
    /// let values: Vec<i32> = Observable::generate(1, |x| *x < 5, |x| x + 1, |x| *x)
    ///     .events()
    ///     .map(Result::unwrap)
    ///     .collect();
    /// assert_eq!(values, vec![1, 2, 3, 4]);
    /// ```
    pub fn generate<S, C, I, F>(seed: S, condition: C, iterate: I, selector: F) -> Observable<T>
        where S: Clone + Send + Sync + 'static,
              C: Fn(&S) -> bool + Send + Sync + 'static,
              I: Fn(S) -> S + Send + Sync + 'static,
              F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Observable::from_producer(move |subscriber| {
            let mut state = seed.clone();
            loop {
                if subscriber.is_closed() {
                    break;
                }
                let step = panic::catch_unwind(AssertUnwindSafe(|| {
                    if condition(&state) { Some(selector(&state)) } else { None }
                }));
                match step {
                    Ok(Some(value)) => subscriber.on_next(value),
                    Ok(None) => {
                        subscriber.on_completed();
                        break;
                    }
                    Err(payload) => {
                        subscriber.on_error(Error::from_panic("generate", payload));
                        break;
                    }
                }
                // `state` is moved into `iterate`, so a panic there leaves
                // nothing behind to observe.
                match panic::catch_unwind(AssertUnwindSafe(|| iterate(state))) {
                    Ok(next) => state = next,
                    Err(payload) => {
                        subscriber.on_error(Error::from_panic("generate", payload));
                        break;
                    }
                }
            }
            Ok(disposable::empty())
        })
    }
}

impl Observable<i64> {
    /// Emit `count` consecutive integers starting at `start`, then complete.
    ///
    /// Fails with `Error::InvalidArgument` if `count` is negative or the range
    /// would overflow.
    pub fn range(start: i64, count: i64) -> Result<Observable<i64>> {
        if count < 0 {
            return Err(Error::InvalidArgument(format!("range count must be non-negative, got {}", count)));
        }
        if count > 0 && start.checked_add(count - 1).is_none() {
            return Err(Error::InvalidArgument(format!("range {} + {} overflows", start, count)));
        }
        Ok(Observable::from_producer(move |subscriber| {
            for value in (0..count).map(|k| start + k) {
                if subscriber.is_closed() {
                    break;
                }
                subscriber.on_next(value);
            }
            subscriber.on_completed();
            Ok(disposable::empty())
        }))
    }
}


#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use quickcheck::quickcheck;

    use crate::observer::Notification;
    use crate::subscriber::Subscription;
    use crate::testing::Recorder;
    use super::*;

    #[test]
    fn just_emits_then_completes() {
        let rec = Recorder::new();
        Observable::just(42).subscribe(rec.clone());
        assert_eq!(rec.values(), vec![42]);
        assert_eq!(rec.completions(), 1);
        assert!(rec.errors().is_empty());
    }

    #[test]
    fn empty_only_completes() {
        let rec = Recorder::<i32>::new();
        Observable::empty().subscribe(rec.clone());
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.completions(), 1);
    }

    #[test]
    fn throw_only_fails() {
        let rec = Recorder::<i32>::new();
        Observable::throw(Error::msg("Error")).subscribe(rec.clone());
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.errors()[0].to_string(), "Error");
    }

    #[test]
    fn never_is_silent() {
        let rec = Recorder::<i32>::new();
        let sub = Observable::never().subscribe(rec.clone());
        assert_eq!(rec.len(), 0);
        assert!(!sub.is_closed());
    }

    #[test]
    fn range_emits_sequential_values() {
        let rec = Recorder::new();
        Observable::range(1, 10).unwrap().subscribe(rec.clone());
        assert_eq!(rec.values(), (1..=10).collect::<Vec<i64>>());
        assert_eq!(rec.completions(), 1);
    }

    #[test]
    fn range_rejects_bad_arguments() {
        assert!(matches!(Observable::range(0, -1), Err(Error::InvalidArgument(_))));
        assert!(matches!(Observable::range(i64::MAX, 2), Err(Error::InvalidArgument(_))));
        assert!(Observable::range(i64::MAX, 1).is_ok());
        assert!(Observable::range(i64::MAX, 0).is_ok());
    }

    #[test]
    fn range_law() {
        fn check(start: i32, n: u8) -> bool {
            let (start, n) = (start as i64, n as i64);
            let rec = Recorder::new();
            Observable::range(start, n).unwrap().subscribe(rec.clone());
            let mut expected: Vec<_> = (start..start + n).map(Notification::Next).collect();
            expected.push(Notification::Completed);
            let got = rec.notifications();
            got.len() == expected.len()
                && got.iter().zip(&expected).all(|(a, b)| match (a, b) {
                    (Notification::Next(x), Notification::Next(y)) => x == y,
                    (Notification::Completed, Notification::Completed) => true,
                    _ => false,
                })
        }
        quickcheck(check as fn(i32, u8) -> bool);
    }

    #[test]
    fn generate_counts_up() {
        let rec = Recorder::new();
        Observable::generate(1, |x| *x < 5, |x| x + 1, |x| *x).subscribe(rec.clone());
        assert_eq!(rec.values(), vec![1, 2, 3, 4]);
        assert_eq!(rec.completions(), 1);
    }

    #[test]
    fn generate_matches_loop() {
        fn check(seed: i16, n: u8, step: i8) -> bool {
            let (seed, n, step) = (i32::from(seed), i32::from(n), i32::from(step));
            let rec = Recorder::new();
            Observable::generate(0, move |k| *k < n, |k| k + 1, move |k| seed + k * step)
                .subscribe(rec.clone());
            rec.values() == (0..n).map(|k| seed + k * step).collect::<Vec<_>>()
                && rec.completions() == 1
        }
        quickcheck(check as fn(i16, u8, i8) -> bool);
    }

    #[test]
    fn generate_selector_may_change_type() {
        let rec = Recorder::new();
        Observable::generate(0u8, |x| *x < 3, |x| x + 1, |x| format!("#{}", x))
            .subscribe(rec.clone());
        assert_eq!(rec.values(), vec!["#0", "#1", "#2"]);
    }

    #[test]
    fn generate_unbounded_stops_on_dispose() {
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let seen = Arc::new(AtomicUsize::new(0));
        let observer = {
            let slot = slot.clone();
            let seen = seen.clone();
            crate::FnObserver::new(move |_: u64| {
                if seen.fetch_add(1, Ordering::SeqCst) + 1 == 100 {
                    if let Some(s) = slot.lock().unwrap().as_ref() { s.dispose(); }
                }
            })
        };
        let source = Observable::generate(0u64, |_| true, |x| x + 1, |x| *x);
        // Subscribe through a subscriber made up front, so the handle is
        // reachable while the synchronous loop runs.
        let subscriber = Subscriber::new(observer);
        *slot.lock().unwrap() = Some(subscriber.subscription());
        source.run(subscriber);
        assert_eq!(seen.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn generate_faults_become_errors() {
        let rec = Recorder::<i32>::new();
        Observable::generate(0, |x| *x < 10, |x| if x == 2 { panic!("stuck") } else { x + 1 }, |x| *x)
            .subscribe(rec.clone());
        assert_eq!(rec.values(), vec![0, 1, 2]);
        assert_eq!(rec.errors()[0].to_string(), "panicked in generate: stuck");

        let rec = Recorder::<i32>::new();
        Observable::generate(0, |x| *x < 10, |x| x + 1, |x| 10 / (1 - *x))
            .subscribe(rec.clone());
        assert_eq!(rec.values(), vec![10]);
        assert_eq!(rec.errors().len(), 1);
    }

    #[test]
    fn create_emits_and_cleans_up() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let obs = {
            let cleaned = cleaned.clone();
            Observable::create(move |s| {
                s.on_next(1);
                s.on_next(2);
                s.on_next(3);
                s.on_completed();
                let cleaned = cleaned.clone();
                disposable::ActionDisposable::new(move || { cleaned.fetch_add(1, Ordering::SeqCst); })
            })
        };
        let rec = Recorder::new();
        obs.subscribe(rec.clone());
        assert_eq!(rec.values(), vec![1, 2, 3]);
        assert_eq!(rec.completions(), 1);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_cleanup_runs_on_dispose() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let obs = {
            let cleaned = cleaned.clone();
            Observable::<i32>::create(move |_| {
                let cleaned = cleaned.clone();
                disposable::ActionDisposable::new(move || { cleaned.fetch_add(1, Ordering::SeqCst); })
            })
        };
        let sub = obs.subscribe(Recorder::new());
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);
        sub.dispose();
        sub.dispose();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_drops_late_and_duplicate_notifications() {
        let rec = Recorder::new();
        Observable::create(|s| {
            s.on_next(1);
            s.on_completed();
            s.on_next(2);
            s.on_completed();
            disposable::EmptyDisposable::new()
        })
            .subscribe(rec.clone());
        assert_eq!(rec.values(), vec![1]);
        assert_eq!(rec.completions(), 1);
    }

    #[test]
    fn try_create_error_is_delivered() {
        let rec = Recorder::<i32>::new();
        Observable::try_create(|_| -> Result<disposable::EmptyDisposable> { Err(Error::msg("refused")) })
            .subscribe(rec.clone());
        assert_eq!(rec.errors()[0].to_string(), "refused");
    }

    #[test]
    fn from_iter_emits_all() {
        let rec = Recorder::new();
        Observable::from_iter(vec!["a", "b"]).subscribe(rec.clone());
        assert_eq!(rec.values(), vec!["a", "b"]);
        assert_eq!(rec.completions(), 1);
    }
}
