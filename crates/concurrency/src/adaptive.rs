//! Adaptive fast-path threshold policy
//!
//! One policy object serves every layer (the manager feeds it post-commit,
//! the registry pushes externally computed values, callers query it before
//! skipping pessimistic safeguards). Per transaction type it keeps a
//! threshold in [0.05, 0.95]; the fast path is permitted while the global
//! observed conflict rate stays below that threshold.
//!
//! Feedback loop: each completed transaction contributes a conflict-rate
//! sample derived from its retry count. Samples land in a bounded FIFO
//! history; the threshold is blended toward the history average plus a fixed
//! margin with an exponential moving average.

use lode_core::types::TxnTypeId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Lower clamp of every threshold
pub const MIN_THRESHOLD: f64 = 0.05;
/// Upper clamp of every threshold
pub const MAX_THRESHOLD: f64 = 0.95;
/// Threshold assigned to a type on first sight
pub const DEFAULT_THRESHOLD: f64 = 0.15;
/// Bounded history length per type
const HISTORY_CAPACITY: usize = 100;
/// EMA blend factor toward the history average
const BLEND_FACTOR: f64 = 0.2;
/// Margin added to the history average before blending
const TARGET_MARGIN: f64 = 0.05;
/// Conflict-rate weight of one retry
const RETRY_WEIGHT: f64 = 0.3;
/// Cap on a single sample
const SAMPLE_CAP: f64 = 0.9;

#[derive(Debug)]
struct TypeEntry {
    threshold: f64,
    history: VecDeque<f64>,
}

impl TypeEntry {
    fn new() -> Self {
        TypeEntry {
            threshold: DEFAULT_THRESHOLD,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }
}

/// Per-type adaptive threshold store
pub struct AdaptiveThresholdPolicy {
    entries: Mutex<FxHashMap<TxnTypeId, TypeEntry>>,
}

impl AdaptiveThresholdPolicy {
    /// Create an empty policy; entries appear lazily on first reference
    pub fn new() -> Self {
        AdaptiveThresholdPolicy {
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Conflict-rate sample derived from a transaction's retry count
    ///
    /// Zero retries mean the transaction saw no conflicts (sample 0.0);
    /// otherwise each retry contributes a fixed weight, capped below 1.
    fn sample_from_retries(retries: u32) -> f64 {
        if retries == 0 {
            0.0
        } else {
            (f64::from(retries) * RETRY_WEIGHT).min(SAMPLE_CAP)
        }
    }

    /// Feed one completed transaction into the policy
    pub fn observe(&self, type_id: TxnTypeId, retry_count: u32) {
        let sample = Self::sample_from_retries(retry_count);
        let mut entries = self.entries.lock();
        let entry = entries.entry(type_id).or_insert_with(TypeEntry::new);

        if entry.history.len() == HISTORY_CAPACITY {
            entry.history.pop_front();
        }
        entry.history.push_back(sample);

        let average = entry.history.iter().sum::<f64>() / entry.history.len() as f64;
        let target = average + TARGET_MARGIN;
        let blended = entry.threshold + BLEND_FACTOR * (target - entry.threshold);
        entry.threshold = blended.clamp(MIN_THRESHOLD, MAX_THRESHOLD);

        tracing::trace!(
            type_id = type_id.0,
            sample,
            average,
            threshold = entry.threshold,
            "adaptive threshold updated"
        );
    }

    /// Current threshold for a type (default for unseen types)
    pub fn current_threshold(&self, type_id: TxnTypeId) -> f64 {
        self.entries
            .lock()
            .get(&type_id)
            .map(|e| e.threshold)
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    /// Overwrite a type's threshold with a registry-pushed value, clamped
    ///
    /// The pushed value replaces the blended one but the sample history is
    /// kept; later observations keep adapting from the new baseline.
    pub fn set_threshold(&self, type_id: TxnTypeId, threshold: f64) {
        let clamped = threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD);
        let mut entries = self.entries.lock();
        let entry = entries.entry(type_id).or_insert_with(TypeEntry::new);
        entry.threshold = clamped;
    }

    /// Whether callers may skip pessimistic safeguards for this type
    ///
    /// `global_conflict_rate` is totalConflicts / totalTransactions as
    /// computed by the manager.
    pub fn should_use_fast_path(&self, type_id: TxnTypeId, global_conflict_rate: f64) -> bool {
        global_conflict_rate < self.current_threshold(type_id)
    }
}

impl Default for AdaptiveThresholdPolicy {
    fn default() -> Self {
        Self::new()
    }
}
