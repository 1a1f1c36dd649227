//! Conflict records produced by commit-time validation
//!
//! A conflict is a mismatch between a transaction's captured version and the
//! authoritative counter at validation time. Conflicts are recorded on the
//! transaction, counted per zone and globally, and drive the configured
//! resolution strategy.

use lode_core::types::{TxnId, VersionKey};
use std::fmt;

/// Classification of a recorded conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Captured version differs from the authoritative counter
    VersionMismatch,
    /// A required lock was held elsewhere
    LockConflict,
    /// A shared resource outside the version counters was contended
    ResourceConflict,
    /// Lock-ordering deadlock reported by a pessimistic caller
    Deadlock,
    /// Reserved for callers layering their own detection on top
    Custom,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::VersionMismatch => "version-mismatch",
            ConflictKind::LockConflict => "lock-conflict",
            ConflictKind::ResourceConflict => "resource-conflict",
            ConflictKind::Deadlock => "deadlock",
            ConflictKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// One conflict detected against a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConflict {
    /// Counter the conflict occurred on
    pub key: VersionKey,
    /// Version the transaction captured at access time
    pub expected_version: u32,
    /// Authoritative version at validation time
    pub actual_version: u32,
    /// Transaction that advanced the counter, when known
    ///
    /// The optimistic path cannot attribute the advance, so this is `None`
    /// for version mismatches; pessimistic callers may fill it in.
    pub conflicting_txn: Option<TxnId>,
    /// True when the entry was a pure read (not implied by a write)
    pub is_read_conflict: bool,
    /// Classification of the conflict
    pub kind: ConflictKind,
}

impl TransactionConflict {
    /// Build a version-mismatch conflict, the only kind the optimistic
    /// commit path produces itself
    pub fn version_mismatch(
        key: VersionKey,
        expected_version: u32,
        actual_version: u32,
        is_read_conflict: bool,
    ) -> Self {
        TransactionConflict {
            key,
            expected_version,
            actual_version,
            conflicting_txn: None,
            is_read_conflict,
            kind: ConflictKind::VersionMismatch,
        }
    }
}

/// For callers that surface a conflict record as a hard failure
impl From<TransactionConflict> for lode_core::error::Error {
    fn from(conflict: TransactionConflict) -> Self {
        lode_core::error::Error::VersionConflict {
            key: conflict.key,
            captured: conflict.expected_version,
            current: conflict.actual_version,
        }
    }
}

impl fmt::Display for TransactionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: expected {}, actual {}",
            self.kind, self.key, self.expected_version, self.actual_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_core::types::{MaterialId, ZoneId};

    #[test]
    fn test_version_mismatch_constructor() {
        let c = TransactionConflict::version_mismatch(
            VersionKey::material(ZoneId(5), MaterialId(2)),
            1,
            2,
            true,
        );
        assert_eq!(c.kind, ConflictKind::VersionMismatch);
        assert_eq!(c.conflicting_txn, None);
        assert!(c.is_read_conflict);
    }

    #[test]
    fn test_conflict_display() {
        let c = TransactionConflict::version_mismatch(VersionKey::zone(ZoneId(3)), 4, 7, false);
        let msg = c.to_string();
        assert!(msg.contains("version-mismatch"));
        assert!(msg.contains("zone:3"));
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("actual 7"));
    }

    #[test]
    fn test_conflict_into_error() {
        let c = TransactionConflict::version_mismatch(VersionKey::zone(ZoneId(1)), 1, 3, true);
        let err: lode_core::error::Error = c.into();
        assert!(matches!(
            err,
            lode_core::error::Error::VersionConflict {
                captured: 1,
                current: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_kind_display_names() {
        assert_eq!(ConflictKind::LockConflict.to_string(), "lock-conflict");
        assert_eq!(ConflictKind::Deadlock.to_string(), "deadlock");
    }
}
