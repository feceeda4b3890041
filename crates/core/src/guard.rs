use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use parking_lot::{ArcMutexGuard, Mutex, MutexGuard, RawMutex};

/// A value behind one mutex, shared between handlers and transaction branches.
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Locks for the current scope.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.0.try_lock()
    }

    /// Locks and hands back an owned guard that may outlive the current call.
    ///
    /// The lock stays held until the returned [`HeldLock`] is released or dropped.
    pub fn lock_held(&self) -> HeldLock<T> {
        HeldLock(Mutex::lock_arc(&self.0))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("locked", &self.0.is_locked())
            .finish()
    }
}

/// A lock carried across a host call boundary.
#[must_use = "dropping a HeldLock releases it"]
pub struct HeldLock<T>(ArcMutexGuard<RawMutex, T>);

impl<T> HeldLock<T> {
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for HeldLock<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for HeldLock<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Shared;

    #[test]
    fn held_lock_blocks_until_released() {
        let shared = Shared::new(1u32);
        let mut held = shared.lock_held();
        *held += 1;

        assert!(shared.try_lock().is_none());
        held.release();

        assert_eq!(*shared.lock(), 2);
    }
}
