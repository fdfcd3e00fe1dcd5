//! Exclusive flash-session ownership.
//!
//! At most one flash operation may be in flight system-wide. Instead of a
//! shared boolean that has to be cleared manually on every exit path, the
//! lock hands out a typed guard; dropping the guard releases the lock, so
//! normal returns, early returns and panics all release it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Grants exclusive permission to run one flash operation at a time.
#[derive(Clone, Debug)]
pub struct FlashLock {
    busy: Arc<AtomicBool>,
}

impl FlashLock {
    pub fn new() -> Self {
        FlashLock {
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attempts to claim the lock. Returns `None` while another flash
    /// operation holds it; callers are expected to drop the triggering
    /// event in that case, not queue it.
    pub fn try_acquire(&self) -> Option<FlashGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FlashGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a flash operation currently holds the lock.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }
}

impl Default for FlashLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of flash-session ownership; releases the lock when dropped.
#[derive(Debug)]
pub struct FlashGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlashGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_while_guard_is_alive() {
        let lock = FlashLock::new();
        let guard = lock.try_acquire().expect("first acquisition");
        assert!(lock.is_busy());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_busy());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn guard_release_crosses_threads() {
        let lock = FlashLock::new();
        let guard = lock.try_acquire().unwrap();
        let worker = std::thread::spawn(move || drop(guard));
        worker.join().unwrap();
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn clones_share_the_same_lock() {
        let lock = FlashLock::new();
        let clone = lock.clone();
        let _guard = lock.try_acquire().unwrap();
        assert!(clone.try_acquire().is_none());
    }
}
