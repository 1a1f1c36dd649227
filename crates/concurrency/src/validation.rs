//! Commit-time validation of a transaction's read set
//!
//! For every read-set entry the captured version is compared against the
//! authoritative counter. Any strict mismatch (current non-zero and
//! different) is a version-mismatch conflict. Validation never mutates
//! counters or status; the manager decides what to do with the result.

use crate::conflict::TransactionConflict;
use crate::transaction::VersionRecord;
use crate::version::VersionStore;
use std::time::{Duration, Instant};

/// Outcome of one validation pass
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Conflicts found, in read-set order
    pub conflicts: Vec<TransactionConflict>,
    /// Time spent validating
    pub duration: Duration,
}

impl ValidationOutcome {
    /// Whether the pass found no conflicts
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts found
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Validate a read set against the current counters
///
/// Per-key only: each comparison is linearizable against that key's counter,
/// but there is no cross-key atomicity. A counter advancing between two
/// comparisons within the same pass is observed as-is; that is the
/// snapshot-isolation-like contract of this engine.
pub fn validate_read_set(read_set: &[VersionRecord], versions: &VersionStore) -> ValidationOutcome {
    let started = Instant::now();
    let mut conflicts = Vec::new();

    for record in read_set {
        let current = versions.version_of(&record.key).current();
        if current > 0 && current != record.captured_version {
            conflicts.push(TransactionConflict::version_mismatch(
                record.key,
                record.captured_version,
                current,
                record.read_only,
            ));
        }
    }

    ValidationOutcome {
        conflicts,
        duration: started.elapsed(),
    }
}
