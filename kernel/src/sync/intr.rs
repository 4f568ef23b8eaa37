//! Interrupt-based critical sections.
//!
//! On a single core, holding interrupts off is what makes the fault handler
//! and the paging-file allocator exclusive. Every section is an RAII guard so
//! the previous interrupt level comes back on every exit path.

use crate::interrupts::{intr_disable, intr_enable, intr_get_level, IntrLevel};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A guard for withholding (or temporarily allowing) interrupts.
///
/// Restores the level that was active when it was created.
pub struct InterruptsGuard {
    previous: IntrLevel,
    // Interrupt state belongs to the current CPU.
    _not_send: PhantomData<*const ()>,
}

/// Switch interrupts to `level` until the returned guard is dropped.
pub fn hold_interrupts(level: IntrLevel) -> InterruptsGuard {
    let previous = intr_get_level();
    match level {
        IntrLevel::IntrOn => intr_enable(),
        IntrLevel::IntrOff => intr_disable(),
    }
    InterruptsGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Let interrupts in while a slow device transfer is running.
///
/// The frame being transferred must already be pinned; the caller's entry
/// table updates happen after the window is dropped.
pub fn transfer_window() -> InterruptsGuard {
    hold_interrupts(IntrLevel::IntrOn)
}

impl Drop for InterruptsGuard {
    fn drop(&mut self) {
        match self.previous {
            IntrLevel::IntrOn => intr_enable(),
            IntrLevel::IntrOff => intr_disable(),
        }
    }
}

/// Data that may only be touched with interrupts disabled.
///
/// The `held` flag turns re-entry (a fault arriving during a transfer window
/// while the data is in use) into a visible `None` from [`Self::try_lock`].
pub struct InterruptLock<T> {
    held: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: access is serialized by disabling interrupts on a single core, and
// the held flag rejects nested access.
unsafe impl<T: Send> Sync for InterruptLock<T> {}
unsafe impl<T: Send> Send for InterruptLock<T> {}

impl<T> InterruptLock<T> {
    pub const fn new(data: T) -> InterruptLock<T> {
        InterruptLock {
            held: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Disable interrupts and take the data, or return `None` if it is already
    /// held further up the stack.
    pub fn try_lock(&self) -> Option<InterruptLockGuard<'_, T>> {
        let irq = hold_interrupts(IntrLevel::IntrOff);
        if self.held.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(InterruptLockGuard {
            lock: self,
            _irq: irq,
        })
    }

    /// # Panics
    ///
    /// Panics when called re-entrantly.
    pub fn lock(&self) -> InterruptLockGuard<'_, T> {
        match self.try_lock() {
            Some(guard) => guard,
            None => panic!("interrupt lock taken re-entrantly"),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// Grants access to the data of an [`InterruptLock`]. Dropping it releases
/// the data and then restores the interrupt level.
pub struct InterruptLockGuard<'a, T> {
    lock: &'a InterruptLock<T>,
    _irq: InterruptsGuard,
}

impl<T> Deref for InterruptLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for InterruptLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for InterruptLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_level() {
        intr_enable();
        {
            let _outer = hold_interrupts(IntrLevel::IntrOff);
            assert_eq!(intr_get_level(), IntrLevel::IntrOff);
            {
                let _inner = hold_interrupts(IntrLevel::IntrOff);
                assert_eq!(intr_get_level(), IntrLevel::IntrOff);
            }
            // The inner guard must not turn interrupts back on.
            assert_eq!(intr_get_level(), IntrLevel::IntrOff);
        }
        assert_eq!(intr_get_level(), IntrLevel::IntrOn);
    }

    #[test]
    fn transfer_window_reopens_and_closes() {
        let _held = hold_interrupts(IntrLevel::IntrOff);
        {
            let _window = transfer_window();
            assert_eq!(intr_get_level(), IntrLevel::IntrOn);
        }
        assert_eq!(intr_get_level(), IntrLevel::IntrOff);
    }

    #[test]
    fn lock_rejects_reentry() {
        let lock = InterruptLock::new(5u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
            assert!(lock.is_locked());
            assert!(lock.try_lock().is_none());
            assert_eq!(intr_get_level(), IntrLevel::IntrOff);
        }
        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 6);
    }

    #[test]
    fn failed_try_lock_leaves_level_alone() {
        intr_enable();
        let lock = InterruptLock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        assert_eq!(intr_get_level(), IntrLevel::IntrOff);
        drop(guard);
        assert_eq!(intr_get_level(), IntrLevel::IntrOn);
    }
}
