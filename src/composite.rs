//! A disposable aggregate of disposables.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::disposable::{Disposable, DisposableRef};


/// A group of disposables released together.
///
/// Members can be added and removed at any time. Once the composite itself has
/// been disposed, it stays disposed: anything added afterwards is disposed on
/// the spot instead of being stored.
///
/// ```
/// # use ester::{CompositeDisposable, Disposable, disposable};
/// let group = CompositeDisposable::new();
/// group.add(disposable::empty());
/// group.add(disposable::empty());
/// assert_eq!(group.len(), 2);
///
/// group.dispose();
/// let late = disposable::empty();
/// group.add(late.clone());
/// assert!(late.is_disposed());
/// assert_eq!(group.len(), 0);
/// ```
pub struct CompositeDisposable {
    members: Mutex<Option<Vec<DisposableRef>>>,
}

impl CompositeDisposable {
    /// Create an empty composite.
    pub fn new() -> CompositeDisposable {
        CompositeDisposable { members: Mutex::new(Some(vec![])) }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<DisposableRef>>> {
        // Members are only pushed and drained under the lock, so a panic
        // elsewhere cannot leave the list half-updated.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a member, or dispose it right away if the composite is disposed.
    pub fn add(&self, d: DisposableRef) {
        let rejected = match &mut *self.lock() {
            Some(members) => {
                members.push(d);
                None
            }
            None => Some(d),
        };
        // Dispose outside the lock, the member may call back into us.
        if let Some(d) = rejected {
            d.dispose();
        }
    }

    /// Add any disposable, returning a handle that can be passed to `remove`.
    pub fn push<D: Disposable + 'static>(&self, d: D) -> DisposableRef {
        let d: DisposableRef = Arc::new(d);
        self.add(d.clone());
        d
    }

    /// Remove a member and dispose it.
    ///
    /// Returns whether `d` was a member. Removing something that is not a
    /// member is a no-op.
    pub fn remove(&self, d: &DisposableRef) -> bool {
        let removed = match &mut *self.lock() {
            Some(members) => members.iter()
                .position(|m| Arc::ptr_eq(m, d))
                .map(|idx| members.remove(idx)),
            None => None,
        };
        match removed {
            Some(member) => {
                member.dispose();
                true
            }
            None => false,
        }
    }

    /// Whether `d` is currently a member.
    pub fn contains(&self, d: &DisposableRef) -> bool {
        self.lock().as_ref()
            .map_or(false, |members| members.iter().any(|m| Arc::ptr_eq(m, d)))
    }

    /// Number of current members.
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }

    /// Whether there are no current members.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Default for CompositeDisposable {
    fn default() -> CompositeDisposable { CompositeDisposable::new() }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        let members = mem::replace(&mut *self.lock(), None);
        for member in members.into_iter().flatten() {
            member.dispose();
        }
    }

    fn is_disposed(&self) -> bool { self.lock().is_none() }
}

impl fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDisposable")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}


#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use quickcheck::quickcheck;

    use crate::disposable;
    use super::*;

    fn counting(count: &Arc<AtomicUsize>) -> DisposableRef {
        let count = count.clone();
        disposable::from_fn(move || { count.fetch_add(1, Ordering::SeqCst); })
    }

    #[test]
    fn dispose_releases_all_members_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let group = CompositeDisposable::new();
        group.add(counting(&count));
        group.add(counting(&count));
        group.dispose();
        group.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(group.is_disposed());
        assert!(group.is_empty());
    }

    #[test]
    fn add_after_dispose_disposes_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let group = CompositeDisposable::new();
        group.add(counting(&count));
        group.add(counting(&count));
        group.dispose();
        let third = counting(&count);
        group.add(third.clone());
        assert!(third.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn remove_disposes_member() {
        let count = Arc::new(AtomicUsize::new(0));
        let group = CompositeDisposable::new();
        let a = counting(&count);
        let b = counting(&count);
        group.add(a.clone());
        group.add(b.clone());
        assert!(group.remove(&a));
        assert!(a.is_disposed());
        assert!(!b.is_disposed());
        assert!(!group.contains(&a));
        assert!(group.contains(&b));
        assert_eq!(group.len(), 1);
        // absent member
        assert!(!group.remove(&a));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_after_dispose_is_noop() {
        let group = CompositeDisposable::new();
        let a = group.push(disposable::EmptyDisposable::new());
        group.dispose();
        assert!(a.is_disposed());
        assert!(!group.remove(&a));
    }

    #[test]
    fn member_may_add_to_disposed_parent() {
        let group = Arc::new(CompositeDisposable::new());
        let late = disposable::empty();
        {
            let group2 = group.clone();
            let late = late.clone();
            group.add(disposable::from_fn(move || group2.add(late)));
        }
        group.dispose();
        assert!(late.is_disposed());
    }

    #[test]
    fn every_member_disposed_exactly_once() {
        fn check(n: u8, removed: Vec<u8>) -> bool {
            let counts: Vec<_> = (0..n).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let group = CompositeDisposable::new();
            let members: Vec<_> = counts.iter().map(counting).collect();
            for m in &members { group.add(m.clone()); }
            for idx in removed.into_iter().filter(|&i| i < n) {
                group.remove(&members[idx as usize]);
            }
            group.dispose();
            counts.iter().all(|c| c.load(Ordering::SeqCst) == 1)
        }
        quickcheck(check as fn(u8, Vec<u8>) -> bool);
    }
}
