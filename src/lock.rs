//! Scoped mutual exclusion used by operators that are fed from more than one
//! thread.
//!
//! A [`Lock`] hands out a guard; the lock is released when the guard is
//! dropped, on every exit path including unwinding. [`MutexLock`] comes in a
//! plain and a recursive flavor, the recursive one allowing the owning thread
//! to re-enter (a downstream that synchronously feeds back into the same
//! operator).

use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};

pub trait Lock: Send + Sync {
  type Guard<'a>
  where
    Self: 'a;

  /// Blocks until the lock is acquired.
  fn lock(&self) -> Self::Guard<'_>;

  /// Acquires the lock only if it is free right now.
  fn try_lock(&self) -> Option<Self::Guard<'_>>;

  /// Runs `f` inside the critical section.
  #[inline]
  fn locking<R>(&self, f: impl FnOnce() -> R) -> R {
    let _guard = self.lock();
    f()
  }
}

enum Inner {
  Plain(Mutex<()>),
  Recursive(ReentrantMutex<()>),
}

/// A mutex with no protected data, chosen recursive or not at construction.
pub struct MutexLock {
  inner: Inner,
}

/// Held while a [`MutexLock`] is locked.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub enum MutexLockGuard<'a> {
  Plain(MutexGuard<'a, ()>),
  Recursive(ReentrantMutexGuard<'a, ()>),
}

impl MutexLock {
  pub fn new(recursive: bool) -> Self {
    let inner = if recursive {
      Inner::Recursive(ReentrantMutex::new(()))
    } else {
      Inner::Plain(Mutex::new(()))
    };
    MutexLock { inner }
  }

  #[inline]
  pub fn plain() -> Self { Self::new(false) }

  #[inline]
  pub fn recursive() -> Self { Self::new(true) }

  pub fn is_recursive(&self) -> bool { matches!(self.inner, Inner::Recursive(_)) }
}

impl Default for MutexLock {
  fn default() -> Self { Self::plain() }
}

impl Lock for MutexLock {
  type Guard<'a> = MutexLockGuard<'a>;

  fn lock(&self) -> MutexLockGuard<'_> {
    match &self.inner {
      Inner::Plain(m) => MutexLockGuard::Plain(m.lock()),
      Inner::Recursive(m) => MutexLockGuard::Recursive(m.lock()),
    }
  }

  fn try_lock(&self) -> Option<MutexLockGuard<'_>> {
    match &self.inner {
      Inner::Plain(m) => m.try_lock().map(MutexLockGuard::Plain),
      Inner::Recursive(m) => m.try_lock().map(MutexLockGuard::Recursive),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc,
    },
    thread,
  };

  use super::*;

  #[test]
  fn plain_try_fails_while_held() {
    let lock = MutexLock::plain();
    let guard = lock.lock();
    assert!(lock.try_lock().is_none());
    drop(guard);
    assert!(lock.try_lock().is_some());
  }

  #[test]
  fn recursive_reenters_on_same_thread() {
    let lock = MutexLock::recursive();
    assert!(lock.is_recursive());
    let depth = lock.locking(|| lock.locking(|| lock.try_lock().map(|_| 3)));
    assert_eq!(depth, Some(3));
  }

  #[test]
  fn released_after_panic() {
    let lock = Arc::new(MutexLock::plain());
    let l = lock.clone();
    let r = thread::spawn(move || l.locking(|| panic!("boom"))).join();
    assert!(r.is_err());
    assert!(lock.try_lock().is_some());
  }

  #[test]
  fn serializes_threads() {
    let lock = Arc::new(MutexLock::recursive());
    let inside = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
      .map(|_| {
        let lock = lock.clone();
        let inside = inside.clone();
        thread::spawn(move || {
          for _ in 0..200 {
            lock.locking(|| {
              assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
              inside.fetch_sub(1, Ordering::SeqCst);
            });
          }
        })
      })
      .collect();
    handles.into_iter().for_each(|h| h.join().unwrap());
  }
}
