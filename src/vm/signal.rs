//! One-shot completion signal between threads.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// A value published once by one thread and awaited by another.
///
/// Publishing happens-before every return from [`Completion::wait`], so a
/// waiter always observes what the publisher wrote before completing.
pub struct Completion<T> {
    inner: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

enum Slot<T> {
    Pending,
    Ready(T),
    Taken,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    /// Create a pending completion.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                slot: Mutex::new(Slot::Pending),
                done: Condvar::new(),
            }),
        }
    }

    /// Publish the value and wake the waiter.
    ///
    /// Returns `false` if a value was already published.
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.inner.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Ready(value);
        self.inner.done.notify_all();
        true
    }

    /// Block until the value is published and take it.
    ///
    /// Returns `None` if another waiter already took it.
    pub fn wait(&self) -> Option<T> {
        let mut slot = self.inner.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.inner.done.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(value) => Some(value),
            _ => None,
        }
    }
}
