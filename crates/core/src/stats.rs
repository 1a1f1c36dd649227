//! Per-transaction and engine-wide statistics
//!
//! `TransactionStats` is accumulated inside the transaction context and
//! handed to completion callbacks once the transaction reaches a terminal
//! state. `GlobalStats` is a point-in-time snapshot of the manager's
//! counters for operational monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Statistics accumulated over a transaction's lifetime
#[derive(Debug, Clone)]
pub struct TransactionStats {
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
    /// Set on the first transition to InProgress
    pub started_at: Option<Instant>,
    /// Set on the first transition to Committing
    pub commit_started_at: Option<Instant>,
    /// Set on the first transition to a terminal status
    pub commit_finished_at: Option<Instant>,
    /// `commit_finished_at - commit_started_at`, when both exist
    pub commit_duration: Option<Duration>,
    /// Number of automatic or manual retries
    pub retry_count: u32,
    /// Number of validation passes (commit attempts plus explicit probes)
    pub validation_count: u32,
    /// Accumulated validation time across all passes
    pub validation_time: Duration,
    /// Accumulated time spent waiting on locks
    pub lock_wait_time: Duration,
    /// Conflicts recorded against this transaction
    pub conflict_count: u32,
    /// High-water mark reported by the caller, in bytes
    pub peak_memory_bytes: u64,
}

impl TransactionStats {
    /// Fresh statistics for a newly created transaction
    pub fn new() -> Self {
        TransactionStats {
            created_at: Utc::now(),
            started_at: None,
            commit_started_at: None,
            commit_finished_at: None,
            commit_duration: None,
            retry_count: 0,
            validation_count: 0,
            validation_time: Duration::ZERO,
            lock_wait_time: Duration::ZERO,
            conflict_count: 0,
            peak_memory_bytes: 0,
        }
    }

    /// Total lifetime so far, measured from the first InProgress entry
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}

impl Default for TransactionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the manager's global counters
///
/// All counters are cumulative since manager construction except `active`,
/// which is the instantaneous count of non-terminal transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Transactions ever begun
    pub total_transactions: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions aborted (explicitly, by strategy, or at shutdown)
    pub aborted: u64,
    /// Conflicts recorded across all transactions
    pub conflicts: u64,
    /// Currently active (non-terminal) transactions
    pub active: usize,
}

impl GlobalStats {
    /// Fraction of begun transactions that aborted, in [0, 1]
    pub fn abort_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.aborted as f64 / self.total_transactions as f64
        }
    }

    /// Observed conflicts per begun transaction
    ///
    /// Feeds the fast-path decision; may exceed 1.0 when transactions
    /// conflict on several keys.
    pub fn conflict_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.conflicts as f64 / self.total_transactions as f64
        }
    }
}
