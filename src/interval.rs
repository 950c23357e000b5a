//! A periodic timer sequence.

use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::disposable;
use crate::error::Error;
use crate::observable::Observable;
use crate::subscriber::Subscriber;


impl Observable<u64> {
    /// Emit `0, 1, 2, …`, one value per `period`, on a dedicated timer thread.
    ///
    /// The period is a fixed delay after each emission: a slow observer pushes
    /// later ticks back rather than causing a burst of catch-up ticks. The
    /// sequence never completes. Disposing the subscription wakes and stops
    /// the timer thread; the thread checks for disposal before every tick.
    ///
    /// ```
    /// # use ester::Observable;
    /// # use std::time::Duration;
    /// let ticks: Vec<u64> = Observable::interval(Duration::from_millis(1))
    ///     .events()
    ///     .take(3)
    ///     .map(Result::unwrap)
    ///     .collect();
    /// assert_eq!(ticks, vec![0, 1, 2]);
    /// ```
    pub fn interval(period: Duration) -> Observable<u64> {
        Observable::from_producer(move |subscriber: Subscriber<u64>| {
            let (stop, stopped) = channel::<()>();
            let timer = thread::Builder::new()
                .name("ester-interval".to_string())
                .spawn(move || {
                    let mut tick = 0;
                    loop {
                        match stopped.recv_timeout(period) {
                            Err(RecvTimeoutError::Timeout) => {}
                            // Stop requested, or the subscription is gone.
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                        if subscriber.is_closed() {
                            break;
                        }
                        subscriber.on_next(tick);
                        tick += 1;
                    }
                    tracing::trace!(ticks = tick, "interval timer stopped");
                });
            if let Err(e) = timer {
                return Err(Error::other(e));
            }
            let stop = Mutex::new(stop);
            Ok(disposable::from_fn(move || {
                if let Ok(stop) = stop.lock() {
                    let _ = stop.send(());
                }
            }))
        })
    }
}
