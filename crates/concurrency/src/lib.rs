//! Optimistic concurrency control for zone and material state
//!
//! This crate implements version-counter OCC:
//! - [`TransactionContext`]: read/write set tracking with captured versions
//! - [`VersionStore`]: lazily created per-zone and per-material counters
//! - [`validate_read_set`]: commit-time conflict detection
//! - [`TransactionManager`]: lifecycle orchestration and conflict resolution
//! - [`AdaptiveThresholdPolicy`]: feedback-driven fast-path gating
//! - [`SpinLock`]: pessimistic per-zone fallback with a graded backoff ladder
//!
//! Writers are never blocked by the optimistic path: transactions work
//! against captured versions and validate at commit, with first committer
//! wins per key. There is no global manager instance; construct a
//! [`TransactionManager`] and pass it where it is needed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptive;
pub mod conflict;
pub mod manager;
pub mod spinlock;
pub mod transaction;
pub mod validation;
pub mod version;

pub use adaptive::AdaptiveThresholdPolicy;
pub use conflict::{ConflictKind, TransactionConflict};
pub use manager::{CommitOutcome, CompletionCallback, TransactionManager};
pub use spinlock::{SpinGuard, SpinLock};
pub use transaction::{
    TransactionContext, TransactionHandle, TransactionStatus, VersionRecord,
};
pub use validation::{validate_read_set, ValidationOutcome};
pub use version::{VersionHandle, VersionSnapshot, VersionStore, INITIAL_VERSION};
