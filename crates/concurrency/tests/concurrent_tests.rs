//! Concurrent/Multi-threaded Tests for lode-concurrency
//!
//! These tests verify correct behavior under actual concurrent execution.
//! Unlike the sequential unit tests, these use multiple threads to exercise:
//!
//! 1. **First-Committer-Wins** - Exactly one of two racing writers succeeds
//! 2. **Version Monotonicity** - Counters advance by exactly the number of
//!    committed writes, never lost, never double-applied
//! 3. **Auto-Retry Under Load** - Bounded retry converges without panics
//! 4. **Registry Integrity** - Telemetry counters balance under stress
//! 5. **Spin Lock Exclusion** - The pessimistic fallback actually excludes
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! cargo test --test concurrent_tests -- --nocapture --test-threads=1  # sequential for debugging
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lode_concurrency::{CommitOutcome, SpinLock, TransactionManager, TransactionStatus};
use lode_core::config::{BackoffPolicy, ConflictStrategy, TransactionConfig};
use lode_core::types::{MaterialId, VersionKey, ZoneId};

// ============================================================================
// Test Helpers
// ============================================================================

fn retry_config(max_retries: u32) -> TransactionConfig {
    TransactionConfig {
        strategy: ConflictStrategy::AutoRetry,
        max_retries,
        backoff: BackoffPolicy::Fixed {
            delay: Duration::from_micros(50),
        },
        ..TransactionConfig::default()
    }
}

fn abort_config() -> TransactionConfig {
    TransactionConfig {
        strategy: ConflictStrategy::Abort,
        ..TransactionConfig::default()
    }
}

// ============================================================================
// SECTION 1: First-Committer-Wins
// ============================================================================

mod first_committer_wins {
    use super::*;

    /// Two transactions read the same key, both write it, both commit.
    /// Exactly one may commit; the other must see a version conflict.
    #[test]
    fn test_two_racing_writers_one_wins() {
        let manager = Arc::new(TransactionManager::new());
        let key = VersionKey::material(ZoneId(5), MaterialId(2));
        let barrier = Arc::new(Barrier::new(2));
        let committed = Arc::new(AtomicUsize::new(0));
        let aborted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                let committed = Arc::clone(&committed);
                let aborted = Arc::clone(&aborted);
                thread::spawn(move || {
                    let txn = manager.begin(abort_config());
                    manager.record_write(&txn, key).unwrap();
                    // Both transactions have captured before either commits
                    barrier.wait();
                    match manager.commit(&txn).unwrap() {
                        CommitOutcome::Committed => committed.fetch_add(1, Ordering::SeqCst),
                        CommitOutcome::Aborted => aborted.fetch_add(1, Ordering::SeqCst),
                        CommitOutcome::Retry => unreachable!("strategy is Abort"),
                    };
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(committed.load(Ordering::SeqCst), 1, "exactly one winner");
        assert_eq!(aborted.load(Ordering::SeqCst), 1, "exactly one loser");
        // One committed write: 1 → 2
        assert_eq!(manager.versions().version_of(&key).current(), 2);
    }

    /// The loser's conflict record names the contested key with the stale
    /// capture and the winner's new version.
    #[test]
    fn test_loser_sees_accurate_conflict() {
        let manager = TransactionManager::new();
        let key = VersionKey::zone(ZoneId(1));

        let loser = manager.begin(abort_config());
        manager.record_write(&loser, key).unwrap();

        let winner = manager.begin(TransactionConfig::default());
        manager.record_write(&winner, key).unwrap();
        assert_eq!(manager.commit(&winner).unwrap(), CommitOutcome::Committed);

        assert_eq!(manager.commit(&loser).unwrap(), CommitOutcome::Aborted);
        let conflicts = loser.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].key, key);
        assert_eq!(conflicts[0].expected_version, 1);
        assert_eq!(conflicts[0].actual_version, 2);
    }
}

// ============================================================================
// SECTION 2: Version Monotonicity Under Load
// ============================================================================

mod version_monotonicity {
    use super::*;

    /// N threads each drive one auto-retrying transaction to completion on
    /// the same key. Every transaction eventually commits (the retry budget
    /// is generous), and the counter advances by exactly one per commit.
    #[test]
    fn test_counter_advances_once_per_commit() {
        const THREADS: usize = 8;
        let manager = Arc::new(TransactionManager::new());
        let key = VersionKey::zone(ZoneId(3));
        let barrier = Arc::new(Barrier::new(THREADS));
        let commits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                let commits = Arc::clone(&commits);
                thread::spawn(move || {
                    // Plenty of retries: every thread must get through
                    let txn = manager.begin(retry_config(1000));
                    barrier.wait();
                    loop {
                        manager.record_write(&txn, key).unwrap();
                        match manager.commit(&txn).unwrap() {
                            CommitOutcome::Committed => {
                                commits.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                            CommitOutcome::Retry => continue,
                            CommitOutcome::Aborted => {
                                panic!("retry budget exhausted unexpectedly")
                            }
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(commits.load(Ordering::SeqCst), THREADS);
        // INITIAL_VERSION (1) + one increment per committed write
        assert_eq!(
            manager.versions().version_of(&key).current() as usize,
            1 + THREADS
        );
        assert_eq!(manager.global_stats().committed, THREADS as u64);
    }

    /// Aborted transactions never touch counters, even when interleaved
    /// with committing ones across many threads.
    #[test]
    fn test_aborts_never_leak_into_counters() {
        const THREADS: usize = 6;
        let manager = Arc::new(TransactionManager::new());
        let key = VersionKey::zone(ZoneId(9));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let txn = manager.begin(TransactionConfig::default());
                    manager.record_write(&txn, key).unwrap();
                    barrier.wait();
                    if i % 2 == 0 {
                        manager.abort(&txn).unwrap();
                        0usize
                    } else {
                        match manager.commit(&txn).unwrap() {
                            CommitOutcome::Committed => 1,
                            _ => 0,
                        }
                    }
                })
            })
            .collect();
        let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(
            manager.versions().version_of(&key).current() as usize,
            1 + committed
        );
    }
}

// ============================================================================
// SECTION 3: Stress
// ============================================================================

mod stress {
    use super::*;

    /// Many threads, several keys, mixed reads and writes, auto-retry.
    /// Afterwards the telemetry must balance: every begun transaction is
    /// either committed or aborted, and nothing is left active.
    #[test]
    fn test_mixed_workload_telemetry_balances() {
        const THREADS: usize = 8;
        const TXNS_PER_THREAD: usize = 20;
        let manager = Arc::new(TransactionManager::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..TXNS_PER_THREAD {
                        let txn = manager.begin(retry_config(3));
                        let zone = ZoneId((i % 4) as u32);
                        loop {
                            manager.record_read(&txn, VersionKey::zone(zone)).unwrap();
                            if (t + i) % 3 != 0 {
                                manager
                                    .record_write(
                                        &txn,
                                        VersionKey::material(zone, MaterialId(1)),
                                    )
                                    .unwrap();
                            }
                            match manager.commit(&txn).unwrap() {
                                CommitOutcome::Retry => continue,
                                _ => break,
                            }
                        }
                        assert!(txn.status().is_terminal());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = manager.global_stats();
        assert_eq!(stats.total_transactions, (THREADS * TXNS_PER_THREAD) as u64);
        assert_eq!(stats.committed + stats.aborted, stats.total_transactions);
        assert_eq!(stats.active, 0);
        assert_eq!(manager.active_transaction_count(), 0);

        // Sweep everything; the registry must empty cleanly
        thread::sleep(Duration::from_millis(2));
        let removed = manager.cleanup(Duration::ZERO);
        assert_eq!(removed as u64, stats.total_transactions);
    }

    /// Concurrent begins allocate strictly unique ids.
    #[test]
    fn test_concurrent_begin_ids_unique() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;
        let manager = Arc::new(TransactionManager::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..PER_THREAD)
                        .map(|_| manager.begin(TransactionConfig::default()).id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(ids.insert(id), "duplicate transaction id {id}");
            }
        }
        assert_eq!(ids.len(), THREADS * PER_THREAD);
    }
}

// ============================================================================
// SECTION 4: Spin Lock Exclusion
// ============================================================================

mod spin_lock_exclusion {
    use super::*;

    /// The manager hands out one shared lock per zone; contenders holding it
    /// observe strict mutual exclusion.
    #[test]
    fn test_zone_lock_excludes_across_threads() {
        const THREADS: usize = 4;
        const ITERS: usize = 200;
        let manager = Arc::new(TransactionManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let lock: Arc<SpinLock> = manager.zone_lock(ZoneId(1));
                    barrier.wait();
                    for _ in 0..ITERS {
                        let _g = lock.guard();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1, "exclusion violated");
    }
}

// ============================================================================
// SECTION 5: Handles Crossing Threads
// ============================================================================

mod handle_mobility {
    use super::*;

    /// A handle begun on one thread commits on another. With no
    /// thread-local ambient state this must just work.
    #[test]
    fn test_handle_commits_on_another_thread() {
        let manager = Arc::new(TransactionManager::new());
        let txn = manager.begin(TransactionConfig::default());
        manager
            .record_write(&txn, VersionKey::zone(ZoneId(2)))
            .unwrap();

        let worker = {
            let manager = Arc::clone(&manager);
            let txn = Arc::clone(&txn);
            thread::spawn(move || manager.commit(&txn).unwrap())
        };
        assert_eq!(worker.join().unwrap(), CommitOutcome::Committed);
        assert_eq!(txn.status(), TransactionStatus::Committed);
    }
}
