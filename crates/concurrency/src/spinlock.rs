//! Low-overhead spin lock with escalating backoff
//!
//! Protects the manager's internal maps and is handed out per zone for
//! callers that want a pessimistic fallback. The acquisition path tries an
//! optimistic compare-and-swap first and then climbs a backoff ladder: a few
//! spin-loop rounds, then CPU yields, then short sleeps, then longer sleeps.
//!
//! There is NO fairness guarantee. Under pathological contention a thread may
//! be starved; that is a documented tradeoff of the primitive, not a bug.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Attempts resolved with a bare spin-loop hint before escalating
const SPIN_ROUNDS: u32 = 16;
/// Attempts resolved with `thread::yield_now` before sleeping
const YIELD_ROUNDS: u32 = 64;
/// Attempts resolved with a short sleep before moving to long sleeps
const SHORT_SLEEP_ROUNDS: u32 = 1024;
/// Short sleep applied in the middle of the ladder (~0.1 ms)
const SHORT_SLEEP: Duration = Duration::from_micros(100);
/// Long sleep applied at the top of the ladder (~1 ms)
const LONG_SLEEP: Duration = Duration::from_millis(1);

/// Test-and-set spin lock with exponential backoff
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// Create an unlocked spin lock
    pub const fn new() -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Single optimistic acquisition attempt
    ///
    /// Returns true if the lock was taken. Never blocks.
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire the lock, blocking through the backoff ladder
    ///
    /// Worst-case per-iteration latency is bounded by the top-of-ladder
    /// sleep; total wait is unbounded under sustained contention.
    pub fn lock(&self) {
        let mut attempts: u32 = 0;
        loop {
            // Cheap read first to avoid hammering the cache line with CAS
            if !self.locked.load(Ordering::Relaxed) && self.try_lock() {
                return;
            }
            match attempts {
                0..=SPIN_ROUNDS => std::hint::spin_loop(),
                _ if attempts <= YIELD_ROUNDS => thread::yield_now(),
                _ if attempts <= SHORT_SLEEP_ROUNDS => thread::sleep(SHORT_SLEEP),
                _ => thread::sleep(LONG_SLEEP),
            }
            attempts = attempts.saturating_add(1);
        }
    }

    /// Release the lock
    ///
    /// Caller must hold the lock; releasing an unheld lock leaves it unlocked
    /// and is a logic error on the caller's side.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Whether the lock is currently held by someone
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Acquire and return an RAII guard that unlocks on drop
    pub fn guard(&self) -> SpinGuard<'_> {
        self.lock();
        SpinGuard { lock: self }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// RAII guard for [`SpinLock`]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
