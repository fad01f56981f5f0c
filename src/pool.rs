//! A typed free-list for per-request state.
//!
//! Values are checked out as [`Pooled`] guards. Dropping a guard recycles the
//! value and puts it back, so a value can only be released once, can't be
//! touched after release, and still goes back when a handler unwinds.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// State that can be wiped and reused by a [`Pool`].
///
/// `Default` builds a fresh value when the pool is empty; `recycle` must
/// bring a used value back to a state indistinguishable from `default()`
/// as far as the next borrower can observe.
pub trait Recycle: Default {
    fn recycle(&mut self);
}

/// A concurrent pool of reusable values.
///
/// Only the idle list is locked, and only for a push or a pop. A checked-out
/// value belongs to its guard alone.
pub struct Pool<T: Recycle> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Recycle> Pool<T> {
    /// Creates an empty pool that keeps at most `max_idle` values around.
    pub fn new(max_idle: usize) -> Self {
        Self { idle: Mutex::new(Vec::new()), max_idle }
    }

    /// Checks out a value: an idle one if available, otherwise a new one.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let value = self.idle.lock().pop().unwrap_or_default();
        Pooled { pool: self, value: Some(value) }
    }

    /// Number of values waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut value: T) {
        value.recycle();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(value);
        }
    }
}

/// A value checked out of a [`Pool`]. Returned on drop.
pub struct Pooled<'p, T: Recycle> {
    pool: &'p Pool<T>,
    // Only `None` inside `drop`.
    value: Option<T>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
