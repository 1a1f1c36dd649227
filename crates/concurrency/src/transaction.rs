//! Transaction context and status state machine
//!
//! `TransactionContext` is the per-transaction state: read set, write set,
//! recorded conflicts, and statistics. The manager owns contexts through
//! `Arc<TransactionHandle>`; callers hold the same handle and pass it
//! explicitly through their call chain — there is no hidden per-thread
//! current-transaction slot.

use crate::conflict::TransactionConflict;
use lode_core::config::TransactionConfig;
use lode_core::error::{Error, Result};
use lode_core::stats::TransactionStats;
use lode_core::types::{TxnId, VersionKey};
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::fmt;
use std::time::{Duration, Instant};

/// Status of a transaction in its lifecycle
///
/// Transitions move forward only:
/// - `NotStarted` → `InProgress`
/// - `InProgress` → `Committing` | `Aborting`
/// - `Committing` → `Committed` | `Aborting` | `InProgress` (retry loop-back)
/// - `Aborting` → `Aborted`
///
/// `Committing` → `InProgress` is the one sanctioned backward edge: a
/// conflicted commit under a retry strategy returns the transaction to the
/// caller for another attempt.
///
/// Terminal states: `Committed`, `Aborted`. `Invalid` is never entered by a
/// live transaction; it is reported for handles unknown to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Created but not yet started
    NotStarted,
    /// Executing; the only state that accepts read/write recording
    InProgress,
    /// Commit requested; validation and version bumps happen here
    Committing,
    /// Write set applied, versions advanced
    Committed,
    /// Abort requested, cleanup in flight
    Aborting,
    /// Terminal abort; no version changes were applied
    Aborted,
    /// Unknown or foreign handle
    Invalid,
}

impl TransactionStatus {
    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::Aborted)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (*self, next),
            (NotStarted, InProgress)
                | (InProgress, Committing)
                | (InProgress, Aborting)
                | (Committing, Committed)
                | (Committing, Aborting)
                | (Committing, InProgress)
                | (Aborting, Aborted)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::NotStarted => "NotStarted",
            TransactionStatus::InProgress => "InProgress",
            TransactionStatus::Committing => "Committing",
            TransactionStatus::Committed => "Committed",
            TransactionStatus::Aborting => "Aborting",
            TransactionStatus::Aborted => "Aborted",
            TransactionStatus::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// A (key, version, read/write flag) tuple captured at access time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRecord {
    /// Counter this record refers to
    pub key: VersionKey,
    /// Counter value captured when the zone/material was touched
    pub captured_version: u32,
    /// True for pure reads; false once the key is also in the write set
    pub read_only: bool,
}

/// Per-transaction state tracked between `begin` and a terminal status
pub struct TransactionContext {
    id: TxnId,
    config: TransactionConfig,
    status: TransactionStatus,
    /// Ordered, key-unique read set; every write-set key also appears here
    read_set: SmallVec<[VersionRecord; 8]>,
    /// Ordered, key-unique write set
    write_set: SmallVec<[VersionRecord; 4]>,
    conflicts: Vec<TransactionConflict>,
    stats: TransactionStats,
}

impl TransactionContext {
    /// Create a context in `NotStarted`
    pub fn new(id: TxnId, config: TransactionConfig) -> Self {
        TransactionContext {
            id,
            config,
            status: TransactionStatus::NotStarted,
            read_set: SmallVec::new(),
            write_set: SmallVec::new(),
            conflicts: Vec::new(),
            stats: TransactionStats::new(),
        }
    }

    /// Transaction id
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Transaction configuration
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether the transaction accepts read/write recording
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::InProgress
    }

    /// Whether the transaction reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Accumulated statistics
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    /// Conflicts recorded by validation so far
    pub fn conflicts(&self) -> &[TransactionConflict] {
        &self.conflicts
    }

    /// Read set in insertion order
    pub fn read_set(&self) -> &[VersionRecord] {
        &self.read_set
    }

    /// Write set in insertion order
    pub fn write_set(&self) -> &[VersionRecord] {
        &self.write_set
    }

    /// Number of distinct keys read
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of distinct keys written
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Whether the transaction has no writes
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    /// Whether the wall-clock budget, if configured, has been spent
    ///
    /// Measured from the first transition to InProgress.
    pub fn is_expired(&self) -> bool {
        match (self.config.max_execution_time, self.stats.started_at) {
            (Some(budget), Some(started)) => started.elapsed() > budget,
            _ => false,
        }
    }

    fn ensure_in_progress(&self, op: &'static str) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::StatusViolation {
                txn: self.id,
                status: self.status.to_string(),
                op,
            })
        }
    }

    /// Record a read of `key` at `captured_version`
    ///
    /// Idempotent: a key already present (as a read or implied by a write)
    /// keeps its first captured version and yields no second entry.
    pub fn add_to_read_set(&mut self, key: VersionKey, captured_version: u32) -> Result<()> {
        self.ensure_in_progress("record read in")?;
        if self.read_set.iter().any(|r| r.key == key) {
            return Ok(());
        }
        self.read_set.push(VersionRecord {
            key,
            captured_version,
            read_only: true,
        });
        Ok(())
    }

    /// Record a write of `key` at `captured_version`
    ///
    /// A write implies an equivalent read entry: the key is inserted into the
    /// read set (or its existing read entry is demoted from read-only).
    /// Idempotent on the write set.
    pub fn add_to_write_set(&mut self, key: VersionKey, captured_version: u32) -> Result<()> {
        self.ensure_in_progress("record write in")?;

        match self.read_set.iter_mut().find(|r| r.key == key) {
            Some(read) => read.read_only = false,
            None => self.read_set.push(VersionRecord {
                key,
                captured_version,
                read_only: false,
            }),
        }

        if self.write_set.iter().any(|r| r.key == key) {
            return Ok(());
        }
        self.write_set.push(VersionRecord {
            key,
            captured_version,
            read_only: false,
        });
        Ok(())
    }

    /// Transition to `next`, stamping phase times on first entry
    ///
    /// Records the start time on the first transition to InProgress, the
    /// commit start on the first transition to Committing, and the commit end
    /// plus derived duration on the first transition to a terminal status.
    pub fn set_status(&mut self, next: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::StatusViolation {
                txn: self.id,
                status: self.status.to_string(),
                op: "transition",
            });
        }
        self.status = next;

        let now = Instant::now();
        match next {
            TransactionStatus::InProgress => {
                if self.stats.started_at.is_none() {
                    self.stats.started_at = Some(now);
                }
            }
            TransactionStatus::Committing => {
                if self.stats.commit_started_at.is_none() {
                    self.stats.commit_started_at = Some(now);
                }
            }
            s if s.is_terminal() => {
                if self.stats.commit_finished_at.is_none() {
                    self.stats.commit_finished_at = Some(now);
                    if let Some(commit_start) = self.stats.commit_started_at {
                        self.stats.commit_duration = Some(now.duration_since(commit_start));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Record one more retry
    pub fn increment_retry_count(&mut self) {
        self.stats.retry_count += 1;
    }

    /// Accumulate time spent waiting on a lock
    pub fn record_lock_wait(&mut self, wait: Duration) {
        self.stats.lock_wait_time += wait;
    }

    /// Count one validation pass and accumulate its duration
    pub fn record_validation(&mut self, duration: Duration) {
        self.stats.validation_count += 1;
        self.stats.validation_time += duration;
    }

    /// Record a caller-reported memory high-water mark
    ///
    /// Keeps the maximum across calls.
    pub fn set_peak_memory_usage(&mut self, bytes: u64) {
        self.stats.peak_memory_bytes = self.stats.peak_memory_bytes.max(bytes);
    }

    /// Record conflicts detected by validation and bump the conflict stat
    pub fn record_conflicts(&mut self, conflicts: &[TransactionConflict]) {
        self.stats.conflict_count += conflicts.len() as u32;
        self.conflicts.extend_from_slice(conflicts);
    }

    /// Drop the read and write sets before a retry
    ///
    /// Capacity is preserved; recorded conflicts and statistics are kept.
    pub fn clear_read_write_sets(&mut self) {
        self.read_set.clear();
        self.write_set.clear();
    }

    /// Refresh captured versions of read-only entries not present in the
    /// write set, used by the Merge strategy
    ///
    /// `resolve` maps a key to its current authoritative version. Returns the
    /// number of entries refreshed.
    pub fn refresh_read_only_captures<F>(&mut self, mut resolve: F) -> usize
    where
        F: FnMut(&VersionKey) -> u32,
    {
        let mut refreshed = 0;
        for record in self.read_set.iter_mut().filter(|r| r.read_only) {
            let current = resolve(&record.key);
            if record.captured_version != current {
                record.captured_version = current;
                refreshed += 1;
            }
        }
        refreshed
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("conflicts", &self.conflicts.len())
            .finish()
    }
}

/// Shared, reference-counted handle to a transaction
///
/// `begin` returns `Arc<TransactionHandle>`; the manager keeps one clone in
/// its registry until the cleanup sweep releases it. A caller that retains a
/// handle past the sweep still observes the terminal status — there are no
/// dangling references.
pub struct TransactionHandle {
    id: TxnId,
    inner: Mutex<TransactionContext>,
}

impl TransactionHandle {
    /// Wrap a context
    pub fn new(context: TransactionContext) -> Self {
        TransactionHandle {
            id: context.id(),
            inner: Mutex::new(context),
        }
    }

    /// Transaction id (lock-free)
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Lock the context for direct access
    pub fn lock(&self) -> MutexGuard<'_, TransactionContext> {
        self.inner.lock()
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.inner.lock().status()
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> TransactionStats {
        self.inner.lock().stats().clone()
    }

    /// Snapshot of the recorded conflicts
    pub fn conflicts(&self) -> Vec<TransactionConflict> {
        self.inner.lock().conflicts().to_vec()
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
