//! Transaction lifecycle orchestration
//!
//! The manager owns the version counters, the transaction registry, and the
//! global telemetry counters, and drives the optimistic commit protocol:
//!
//! ```text
//! 1. begin()            - allocate id, register handle, InProgress
//! 2. record_read/write  - capture versions into the context
//! 3. commit()           - InProgress → Committing
//! 4. validate read set  - captured vs current, per key
//! 5. IF clean: bump write-set counters, Committed
//! 6. ELSE: record conflicts, dispatch on the configured strategy
//!    (auto-retry with backoff / force / merge / manual retry / abort)
//! ```
//!
//! The manager is constructed explicitly and passed by reference to every
//! consumer; there is no global instance and no thread-local current
//! transaction. Expected outcomes (commit, retry, abort) are reported through
//! [`CommitOutcome`]; `Err` is reserved for contract misuse.

use crate::adaptive::AdaptiveThresholdPolicy;
use crate::conflict::TransactionConflict;
use crate::spinlock::SpinLock;
use crate::transaction::{TransactionContext, TransactionHandle, TransactionStatus};
use crate::validation::validate_read_set;
use crate::version::VersionStore;
use dashmap::DashMap;
use lode_core::config::{ConflictStrategy, TransactionConfig};
use lode_core::error::{Error, Result};
use lode_core::stats::{GlobalStats, TransactionStats};
use lode_core::types::{TxnId, TxnTypeId, VersionKey, ZoneId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Result of a commit attempt
///
/// All three variants are normal control flow. `Retry` means the transaction
/// is back in InProgress and the caller must redo its reads/writes before
/// recommitting. `Aborted` is terminal; no versions were changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Validation passed; every write-set counter advanced by exactly 1
    Committed,
    /// Conflicts were resolved by returning the transaction to the caller
    Retry,
    /// The transaction reached the terminal Aborted status
    Aborted,
}

/// Completion handler invoked with a terminal transaction's statistics
pub type CompletionCallback = Box<dyn Fn(TxnTypeId, &TransactionStats) + Send + Sync>;

/// Orchestrates begin/commit/abort/validate over shared zone state
pub struct TransactionManager {
    versions: VersionStore,
    adaptive: AdaptiveThresholdPolicy,
    next_txn_id: AtomicU64,

    /// Registry of every non-swept transaction, active and terminal.
    /// One coarse lock; entries are Arc clones of caller-held handles.
    transactions: Mutex<FxHashMap<TxnId, Arc<TransactionHandle>>>,

    /// Per-zone spin locks for callers wanting pessimistic fallback.
    /// Never acquired by the optimistic commit path.
    zone_locks: Mutex<FxHashMap<ZoneId, Arc<SpinLock>>>,

    /// Serializes validate-then-apply across commits. Without it two
    /// transactions could both validate cleanly against the same counters
    /// and both apply (TOCTOU), breaking first committer wins.
    commit_lock: Mutex<()>,

    /// Conflict tallies per zone, for operational monitoring
    zone_conflicts: DashMap<ZoneId, u64>,

    /// Completion callbacks keyed by transaction type
    callbacks: DashMap<TxnTypeId, CompletionCallback>,

    total_transactions: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,

    /// Set by `shutdown`; a shut-down manager refuses further work
    shut_down: AtomicBool,
}

impl TransactionManager {
    /// Create a manager with empty counters and registries
    pub fn new() -> Self {
        TransactionManager {
            versions: VersionStore::new(),
            adaptive: AdaptiveThresholdPolicy::new(),
            next_txn_id: AtomicU64::new(1),
            transactions: Mutex::new(FxHashMap::default()),
            zone_locks: Mutex::new(FxHashMap::default()),
            commit_lock: Mutex::new(()),
            zone_conflicts: DashMap::new(),
            callbacks: DashMap::new(),
            total_transactions: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    /// The version counter store
    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    /// The shared adaptive threshold policy
    pub fn adaptive(&self) -> &AdaptiveThresholdPolicy {
        &self.adaptive
    }

    // === Lifecycle ===

    /// Begin a transaction
    ///
    /// Allocates a unique id, registers the handle, and moves the transaction
    /// to InProgress. The returned handle is the caller's only reference; it
    /// must be passed explicitly to every subsequent operation.
    pub fn begin(&self, config: TransactionConfig) -> Arc<TransactionHandle> {
        let id = TxnId(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let type_id = config.type_id;

        let mut ctx = TransactionContext::new(id, config);
        // NotStarted → InProgress is always legal
        let started = ctx.set_status(TransactionStatus::InProgress);
        debug_assert!(started.is_ok());

        let handle = Arc::new(TransactionHandle::new(ctx));
        if self.shut_down.load(Ordering::SeqCst) {
            // Unregistered handle: every subsequent operation on it fails
            // with NotInitialized
            tracing::warn!(txn_id = id.0, "begin on a shut-down manager");
            return handle;
        }
        self.transactions.lock().insert(id, Arc::clone(&handle));
        self.total_transactions.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(txn_id = id.0, type_id = type_id.0, "transaction begun");
        handle
    }

    /// Record a read of `key`, capturing the current counter value
    ///
    /// Returns the captured version so callers can tag their own snapshots.
    pub fn record_read(&self, handle: &TransactionHandle, key: VersionKey) -> Result<u32> {
        self.ensure_registered(handle)?;
        let captured = self.versions.version_of(&key).current();
        handle.lock().add_to_read_set(key, captured)?;
        Ok(captured)
    }

    /// Record a write of `key`, capturing the current counter value
    ///
    /// Implies an equivalent read entry.
    pub fn record_write(&self, handle: &TransactionHandle, key: VersionKey) -> Result<u32> {
        self.ensure_registered(handle)?;
        let captured = self.versions.version_of(&key).current();
        handle.lock().add_to_write_set(key, captured)?;
        Ok(captured)
    }

    /// Attempt to commit
    ///
    /// Validates the read set against the current counters and, on success,
    /// advances every write-set counter by exactly 1. Conflicts dispatch on
    /// the transaction's [`ConflictStrategy`]; every recorded conflict bumps
    /// the per-zone and global conflict counters. A transaction past its
    /// wall-clock budget is aborted here.
    pub fn commit(&self, handle: &TransactionHandle) -> Result<CommitOutcome> {
        self.ensure_registered(handle)?;
        let mut ctx = handle.lock();

        if ctx.is_expired() {
            tracing::warn!(
                txn_id = ctx.id().0,
                "execution budget exceeded, aborting at commit"
            );
            self.finish_abort(&mut ctx)?;
            return Ok(CommitOutcome::Aborted);
        }

        if !ctx.is_active() {
            return Err(Error::StatusViolation {
                txn: ctx.id(),
                status: ctx.status().to_string(),
                op: "commit",
            });
        }
        ctx.set_status(TransactionStatus::Committing)?;

        // Held through validation and apply so no second transaction can
        // validate against counters this one is about to advance
        let commit_guard = self.commit_lock.lock();

        let outcome = validate_read_set(ctx.read_set(), &self.versions);
        ctx.record_validation(outcome.duration);

        if outcome.is_clean() {
            self.apply_and_commit(&mut ctx)?;
            return Ok(CommitOutcome::Committed);
        }

        self.record_conflicts(&mut ctx, &outcome.conflicts);
        let strategy = ctx.config().strategy;
        tracing::debug!(
            txn_id = ctx.id().0,
            conflicts = outcome.conflict_count(),
            strategy = ?strategy,
            "commit validation failed"
        );

        match strategy {
            ConflictStrategy::AutoRetry => {
                let retries = ctx.stats().retry_count;
                if retries < ctx.config().max_retries {
                    let delay = ctx.config().backoff.delay_for(retries);
                    ctx.increment_retry_count();
                    ctx.clear_read_write_sets();
                    ctx.set_status(TransactionStatus::InProgress)?;
                    // Release both locks before backing off
                    drop(commit_guard);
                    drop(ctx);
                    thread::sleep(delay);
                    Ok(CommitOutcome::Retry)
                } else {
                    let err = Error::RetryExhausted {
                        txn: ctx.id(),
                        max_retries: ctx.config().max_retries,
                    };
                    tracing::warn!(txn_id = ctx.id().0, %err, "aborting");
                    self.finish_abort(&mut ctx)?;
                    Ok(CommitOutcome::Aborted)
                }
            }
            ConflictStrategy::Force => {
                // Caller-opted consistency override: commit despite conflicts
                tracing::warn!(
                    txn_id = ctx.id().0,
                    conflicts = outcome.conflict_count(),
                    "forcing commit over conflicts"
                );
                self.apply_and_commit(&mut ctx)?;
                Ok(CommitOutcome::Committed)
            }
            ConflictStrategy::Merge => {
                let refreshed =
                    ctx.refresh_read_only_captures(|key| self.versions.version_of(key).current());
                let revalidated = validate_read_set(ctx.read_set(), &self.versions);
                ctx.record_validation(revalidated.duration);
                if revalidated.is_clean() {
                    tracing::debug!(
                        txn_id = ctx.id().0,
                        refreshed,
                        "merge refreshed read-only captures"
                    );
                    self.apply_and_commit(&mut ctx)?;
                    Ok(CommitOutcome::Committed)
                } else {
                    // Write-write conflicts are never reconciled at the data
                    // level; the remaining conflicts are on write-implied keys.
                    let err = Error::MergeFailure {
                        txn: ctx.id(),
                        unresolved: revalidated.conflict_count(),
                    };
                    tracing::warn!(txn_id = ctx.id().0, %err, "aborting");
                    self.finish_abort(&mut ctx)?;
                    Ok(CommitOutcome::Aborted)
                }
            }
            ConflictStrategy::ManualRetry => {
                // The caller owns the retry schedule; committed/aborted
                // counters are untouched.
                ctx.set_status(TransactionStatus::InProgress)?;
                Ok(CommitOutcome::Retry)
            }
            ConflictStrategy::Abort => {
                self.finish_abort(&mut ctx)?;
                Ok(CommitOutcome::Aborted)
            }
        }
    }

    /// Abort a transaction from InProgress or Committing
    ///
    /// Transitions through Aborting to Aborted, bumps the aborted counter,
    /// and changes no version counters.
    pub fn abort(&self, handle: &TransactionHandle) -> Result<()> {
        self.ensure_registered(handle)?;
        let mut ctx = handle.lock();
        match ctx.status() {
            TransactionStatus::InProgress | TransactionStatus::Committing => {
                self.finish_abort(&mut ctx)
            }
            status => Err(Error::StatusViolation {
                txn: ctx.id(),
                status: status.to_string(),
                op: "abort",
            }),
        }
    }

    /// Non-destructive validation probe
    ///
    /// Runs read-set validation without changing the transaction's status,
    /// its recorded conflicts, or any counters. Answers "would this still
    /// commit cleanly right now?".
    pub fn validate(&self, handle: &TransactionHandle) -> Result<Vec<TransactionConflict>> {
        self.ensure_registered(handle)?;
        let mut ctx = handle.lock();
        if !ctx.is_active() {
            return Err(Error::StatusViolation {
                txn: ctx.id(),
                status: ctx.status().to_string(),
                op: "validate",
            });
        }
        let outcome = validate_read_set(ctx.read_set(), &self.versions);
        ctx.record_validation(outcome.duration);
        Ok(outcome.conflicts)
    }

    /// Status of a transaction by id; `Invalid` for ids unknown to this
    /// manager (never issued, or already swept)
    pub fn status_of(&self, id: TxnId) -> TransactionStatus {
        self.transactions
            .lock()
            .get(&id)
            .map(|h| h.status())
            .unwrap_or(TransactionStatus::Invalid)
    }

    // === Pessimistic fallback ===

    /// Spin lock for a zone, created lazily
    ///
    /// For callers that want pessimistic safeguards around their zone work.
    /// The optimistic commit path never touches these.
    pub fn zone_lock(&self, zone: ZoneId) -> Arc<SpinLock> {
        let mut locks = self.zone_locks.lock();
        let lock = locks.entry(zone).or_insert_with(|| Arc::new(SpinLock::new()));
        Arc::clone(lock)
    }

    // === Fast path & registry interface ===

    /// Whether transactions of `type_id` may skip pessimistic safeguards
    ///
    /// Compares the global observed conflict rate against the type's
    /// adaptive threshold.
    pub fn should_use_fast_path(&self, type_id: TxnTypeId) -> bool {
        self.adaptive
            .should_use_fast_path(type_id, self.conflict_rate())
    }

    /// Store a registry-pushed fast-path threshold for `type_id`
    pub fn update_fast_path_threshold(&self, type_id: TxnTypeId, threshold: f64) {
        self.adaptive.set_threshold(type_id, threshold);
    }

    /// Register a completion callback for `type_id`
    ///
    /// Invoked synchronously with the transaction's statistics when a
    /// transaction of that type reaches a terminal status. Delivery is
    /// best-effort. The callback runs while the finishing transaction's
    /// context is locked; it must not call back into this manager.
    /// A second registration for the same type is a conflict: it is logged
    /// and ignored, the first callback stays.
    pub fn register_completion_callback(&self, type_id: TxnTypeId, callback: CompletionCallback) {
        use dashmap::mapref::entry::Entry;
        match self.callbacks.entry(type_id) {
            Entry::Vacant(slot) => {
                slot.insert(callback);
            }
            Entry::Occupied(_) => {
                tracing::warn!(
                    type_id = type_id.0,
                    "completion callback already registered, keeping existing"
                );
            }
        }
    }

    // === Telemetry ===

    /// Snapshot of the global counters
    pub fn global_stats(&self) -> GlobalStats {
        GlobalStats {
            total_transactions: self.total_transactions.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            active: self.active_transaction_count(),
        }
    }

    /// Number of registered non-terminal transactions
    pub fn active_transaction_count(&self) -> usize {
        self.transactions
            .lock()
            .values()
            .filter(|h| !h.status().is_terminal())
            .count()
    }

    /// Fraction of begun transactions that aborted
    pub fn abort_rate(&self) -> f64 {
        self.global_stats().abort_rate()
    }

    /// Observed conflicts per begun transaction, the fast-path input
    pub fn conflict_rate(&self) -> f64 {
        self.global_stats().conflict_rate()
    }

    /// Conflict tallies per zone, sorted by zone id
    pub fn zone_conflict_stats(&self) -> Vec<(ZoneId, u64)> {
        let mut stats: Vec<_> = self
            .zone_conflicts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        stats.sort_by_key(|(zone, _)| *zone);
        stats
    }

    // === Maintenance ===

    /// Sweep terminal transactions older than `retention` out of the
    /// registry; returns the number removed
    ///
    /// Caller-held Arcs stay valid and keep reporting the terminal status;
    /// the sweep only releases the manager's clone.
    pub fn cleanup(&self, retention: Duration) -> usize {
        let mut transactions = self.transactions.lock();
        let before = transactions.len();
        transactions.retain(|_, handle| {
            let ctx = handle.lock();
            if !ctx.is_terminal() {
                return true;
            }
            match ctx.stats().commit_finished_at {
                Some(finished) => finished.elapsed() <= retention,
                None => true,
            }
        });
        let removed = before - transactions.len();
        if removed > 0 {
            tracing::debug!(removed, "cleanup sweep released terminal transactions");
        }
        removed
    }

    /// Force-abort every still-active transaction and empty the registry
    ///
    /// The manager refuses all further work afterwards: every operation on
    /// any handle fails with [`Error::NotInitialized`].
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let handles: Vec<_> = {
            let mut transactions = self.transactions.lock();
            transactions.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let mut ctx = handle.lock();
            if ctx.is_terminal() {
                continue;
            }
            tracing::warn!(txn_id = ctx.id().0, "force-aborting at shutdown");
            if let Err(err) = self.finish_abort(&mut ctx) {
                tracing::error!(txn_id = ctx.id().0, %err, "forced abort failed");
            }
        }
    }

    // === Internals ===

    /// Reject handles this manager did not issue (or has already swept)
    fn ensure_registered(&self, handle: &TransactionHandle) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(Error::NotInitialized);
        }
        let transactions = self.transactions.lock();
        match transactions.get(&handle.id()) {
            Some(registered) if std::ptr::eq(registered.as_ref(), handle) => Ok(()),
            _ => Err(Error::InvalidTransaction(handle.id())),
        }
    }

    /// Advance every write-set counter by exactly 1 and finish as Committed
    fn apply_and_commit(&self, ctx: &mut TransactionContext) -> Result<()> {
        for record in ctx.write_set() {
            self.versions.version_of(&record.key).increment();
        }
        ctx.set_status(TransactionStatus::Committed)?;
        self.committed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            txn_id = ctx.id().0,
            writes = ctx.write_count(),
            "transaction committed"
        );
        self.finish(ctx);
        Ok(())
    }

    /// Transition through Aborting to Aborted and finish
    fn finish_abort(&self, ctx: &mut TransactionContext) -> Result<()> {
        ctx.set_status(TransactionStatus::Aborting)?;
        ctx.set_status(TransactionStatus::Aborted)?;
        self.aborted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(txn_id = ctx.id().0, "transaction aborted");
        self.finish(ctx);
        Ok(())
    }

    /// Post-terminal bookkeeping: adaptive feedback and completion callback
    fn finish(&self, ctx: &TransactionContext) {
        let type_id = ctx.config().type_id;
        self.adaptive.observe(type_id, ctx.stats().retry_count);
        if let Some(callback) = self.callbacks.get(&type_id) {
            callback(type_id, ctx.stats());
        }
    }

    /// Record conflicts on the context and bump per-zone + global counters
    fn record_conflicts(&self, ctx: &mut TransactionContext, conflicts: &[TransactionConflict]) {
        ctx.record_conflicts(conflicts);
        for conflict in conflicts {
            *self.zone_conflicts.entry(conflict.key.zone).or_insert(0) += 1;
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
