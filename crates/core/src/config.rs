//! Transaction configuration
//!
//! Per-transaction knobs consulted by the manager: workload type, retry and
//! backoff policy, conflict-resolution strategy, and the fast-path opt-in.

use crate::types::TxnTypeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling priority of a transaction
///
/// Advisory metadata for the caller's own scheduling; the commit path itself
/// is priority-agnostic (no fairness guarantee).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Background work, e.g. decorative regeneration
    Low,
    /// Normal mining operations
    Normal,
    /// Player-facing interactive edits
    High,
    /// World-integrity operations that must not be starved by callers
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Isolation level of a transaction
///
/// The engine validates per-key versions only; there is no cross-key global
/// order. Snapshot is therefore the strongest level actually provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Reads observe the latest committed counter at capture time
    ReadCommitted,
    /// Read-set validation at commit; snapshot-isolation-like, not serializable
    Snapshot,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::Snapshot
    }
}

/// How the manager reacts to conflicts detected at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// Apply backoff, clear the read/write sets, return the transaction to
    /// InProgress; the caller redoes its work and recommits. Bounded by
    /// `max_retries`, after which the transaction aborts.
    AutoRetry,
    /// Ignore conflicts and commit anyway. Explicit, caller-opted
    /// consistency override.
    Force,
    /// Refresh captured versions of read-only keys to current and recommit.
    /// Write-write conflicts are not reconciled and abort the transaction.
    Merge,
    /// Return the transaction to InProgress without backoff; the caller owns
    /// the retry schedule.
    ManualRetry,
    /// Abort on the first conflicting commit attempt.
    Abort,
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        ConflictStrategy::AutoRetry
    }
}

/// Delay schedule applied between automatic retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffPolicy {
    /// Same delay before every retry
    Fixed {
        /// Delay applied before each retry
        delay: Duration,
    },
    /// `base * 2^retry`, capped at `max`
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound on the computed delay
        max: Duration,
    },
}

impl BackoffPolicy {
    /// Delay to apply before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed { delay } => delay,
            BackoffPolicy::Exponential { base, max } => {
                let shift = retry.min(16);
                let scaled = base.saturating_mul(1u32 << shift);
                scaled.min(max)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(1),
            max: Duration::from_millis(100),
        }
    }
}

/// Configuration of a single transaction
///
/// Passed to `TransactionManager::begin` and owned by the transaction for its
/// whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Workload class, linked to the registry-maintained fast-path threshold
    pub type_id: TxnTypeId,
    /// Scheduling priority (advisory, never consulted by the commit path)
    pub priority: Priority,
    /// Retry budget for `ConflictStrategy::AutoRetry`
    pub max_retries: u32,
    /// Delay schedule between automatic retries
    pub backoff: BackoffPolicy,
    /// Isolation level
    pub isolation: IsolationLevel,
    /// Conflict-resolution strategy dispatched at commit time
    pub strategy: ConflictStrategy,
    /// Whether this transaction was started on the fast path (pessimistic
    /// safeguards skipped by the caller)
    pub fast_path: bool,
    /// Wall-clock budget; an expired transaction is aborted at its next
    /// commit attempt. `None` disables the check.
    pub max_execution_time: Option<Duration>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            type_id: TxnTypeId(0),
            priority: Priority::default(),
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            isolation: IsolationLevel::default(),
            strategy: ConflictStrategy::default(),
            fast_path: false,
            max_execution_time: None,
        }
    }
}
