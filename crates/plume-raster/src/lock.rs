//! Per-cell locks used by the `Locked` sync policy.
//!
//! Two implementations back the two raster variants:
//!
//! - [`MutexCellLock`]: an exclusive `std::sync::Mutex`. Cannot be
//!   released by anyone but its holder.
//! - [`SpinCellLock`]: an `AtomicBool` spin lock whose handle can be
//!   force-released to recover from a writer that died holding it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Spins before yielding the thread while waiting on a [`SpinCellLock`].
const SPINS_BEFORE_YIELD: u32 = 64;

/// A lock guarding one raster cell.
pub trait CellLock: Default + Send + Sync {
    /// Run `f` while holding the lock.
    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R;

    /// Forcibly release the lock if held. Returns `true` if it was held.
    ///
    /// `None` means this lock type cannot be force-released.
    fn force_release(&self) -> Option<bool>;
}

/// Exclusive mutex cell lock.
///
/// A poisoned mutex is recovered transparently: the guarded data are
/// atomics, so a panicking holder cannot leave them torn.
#[derive(Debug, Default)]
pub struct MutexCellLock(Mutex<()>);

impl CellLock for MutexCellLock {
    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    fn force_release(&self) -> Option<bool> {
        None
    }
}

/// Spin lock with an externally releasable handle.
#[derive(Debug, Default)]
pub struct SpinCellLock {
    held: AtomicBool,
}

impl SpinCellLock {
    /// Whether the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        let mut spins = 0u32;
        while self
            .held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spins += 1;
            if spins < SPINS_BEFORE_YIELD {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Acquire without releasing. Simulates a writer dying mid-update.
    #[cfg(test)]
    pub(crate) fn leak_acquire(&self) {
        self.acquire();
    }
}

impl CellLock for SpinCellLock {
    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.acquire();
        let out = f();
        self.held.store(false, Ordering::Release);
        out
    }

    fn force_release(&self) -> Option<bool> {
        Some(self.held.swap(false, Ordering::AcqRel))
    }
}
