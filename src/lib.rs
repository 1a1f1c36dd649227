//! LodeCore - optimistic concurrency control for voxel mining worlds
//!
//! LodeCore coordinates concurrent mutation of zone and material state with
//! version-counter OCC: transactions capture versions as they read and write,
//! validate the captured set at commit, and resolve conflicts per a
//! configurable strategy (automatic bounded retry, force, merge, manual
//! retry, or abort).
//!
//! # Quick Start
//!
//! ```
//! use lodecore::{TransactionConfig, TransactionManager, VersionKey, ZoneId};
//!
//! let manager = TransactionManager::new();
//!
//! let txn = manager.begin(TransactionConfig::default());
//! manager.record_write(&txn, VersionKey::zone(ZoneId(5)))?;
//! let outcome = manager.commit(&txn)?;
//! # assert_eq!(outcome, lodecore::CommitOutcome::Committed);
//! # Ok::<(), lodecore::Error>(())
//! ```
//!
//! # Architecture
//!
//! The manager is an explicit dependency: there is no global instance and no
//! thread-local current transaction. Handles returned by
//! [`TransactionManager::begin`] are `Arc`-owned and passed to every
//! operation, so a transaction can move between worker threads.

pub use lode_concurrency::{
    validate_read_set, AdaptiveThresholdPolicy, CommitOutcome, CompletionCallback, ConflictKind,
    SpinGuard, SpinLock, TransactionConflict, TransactionContext, TransactionHandle,
    TransactionManager, TransactionStatus, ValidationOutcome, VersionHandle, VersionRecord,
    VersionSnapshot, VersionStore, INITIAL_VERSION,
};
pub use lode_core::config::{
    BackoffPolicy, ConflictStrategy, IsolationLevel, Priority, TransactionConfig,
};
pub use lode_core::error::{Error, Result};
pub use lode_core::stats::{GlobalStats, TransactionStats};
pub use lode_core::types::{MaterialId, TxnId, TxnTypeId, VersionKey, ZoneId};
