//! Error types for the OCC engine
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations. Expected commit outcomes (conflict, retry, abort) are NOT
//! errors — they travel in `CommitOutcome`. `Error` is reserved for contract
//! misuse: unknown handles, operations invalid for the current status, and
//! the like.

use crate::types::{TxnId, VersionKey};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the OCC engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The engine has not been constructed or has been shut down
    #[error("transaction engine not initialized")]
    NotInitialized,

    /// Handle is unknown to this manager (foreign or already swept)
    #[error("unknown transaction {0}")]
    InvalidTransaction(TxnId),

    /// Operation is not valid for the transaction's current status
    #[error("cannot {op} transaction {txn} in status {status}")]
    StatusViolation {
        /// Transaction the operation targeted
        txn: TxnId,
        /// Status the transaction was in
        status: String,
        /// The rejected operation
        op: &'static str,
    },

    /// Captured version no longer matches the authoritative counter
    #[error("version conflict on {key}: captured {captured}, current {current}")]
    VersionConflict {
        /// Conflicting counter
        key: VersionKey,
        /// Version captured at access time
        captured: u32,
        /// Authoritative version at validation time
        current: u32,
    },

    /// Auto-retry budget exhausted without a clean validation pass
    #[error("transaction {txn} exhausted its retry budget of {max_retries}")]
    RetryExhausted {
        /// Transaction that ran out of retries
        txn: TxnId,
        /// Configured retry budget
        max_retries: u32,
    },

    /// Merge strategy could not resolve write-write conflicts
    #[error("transaction {txn} merge failed: {unresolved} unresolved write conflict(s)")]
    MergeFailure {
        /// Transaction whose merge failed
        txn: TxnId,
        /// Conflicts remaining after the read-only refresh
        unresolved: usize,
    },
}
