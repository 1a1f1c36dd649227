//! Core types for the lodecore OCC engine
//!
//! Shared vocabulary between the concurrency layer and its consumers:
//! identifiers, transaction configuration, statistics, and the error
//! taxonomy. This crate has no concurrency machinery of its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::{BackoffPolicy, ConflictStrategy, IsolationLevel, Priority, TransactionConfig};
pub use error::{Error, Result};
pub use stats::{GlobalStats, TransactionStats};
pub use types::{MaterialId, TxnId, TxnTypeId, VersionKey, ZoneId};
