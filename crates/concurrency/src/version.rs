//! Version counters for zones and material channels
//!
//! One atomic counter per zone and one per (zone, material) pair, created
//! lazily on first reference and alive for the store's entire lifetime.
//! Counters start at 1 and only ever move forward, incremented on successful
//! commit of a transaction's write-set entries.
//!
//! Creation and lookup both serialize on one coarse mutex per map. That is a
//! known scalability bottleneck of this layer; it is deliberately not
//! sharded.

use lode_core::types::{MaterialId, VersionKey, ZoneId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Counters start at 1 so that 0 can mean "never observed"
pub const INITIAL_VERSION: u32 = 1;

/// Cloneable handle to one version counter
///
/// Handles stay valid for the store's lifetime; reads and increments are
/// linearizable per counter. There is no cross-counter ordering.
#[derive(Clone, Debug)]
pub struct VersionHandle {
    counter: Arc<AtomicU32>,
}

impl VersionHandle {
    fn new(counter: Arc<AtomicU32>) -> Self {
        VersionHandle { counter }
    }

    /// Current value of the counter
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Advance the counter by one and return the new value
    pub fn increment(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Point-in-time dump of every counter, for telemetry and debugging
#[derive(Debug, Clone, Default)]
pub struct VersionSnapshot {
    /// Zone-level counters
    pub zones: Vec<(ZoneId, u32)>,
    /// Material channel counters
    pub materials: Vec<(ZoneId, MaterialId, u32)>,
}

/// Lazily populated registry of zone and material version counters
pub struct VersionStore {
    zones: Mutex<FxHashMap<ZoneId, Arc<AtomicU32>>>,
    materials: Mutex<FxHashMap<(ZoneId, MaterialId), Arc<AtomicU32>>>,
}

impl VersionStore {
    /// Create an empty store
    pub fn new() -> Self {
        VersionStore {
            zones: Mutex::new(FxHashMap::default()),
            materials: Mutex::new(FxHashMap::default()),
        }
    }

    /// Handle to the zone-level counter, created at version 1 if absent
    pub fn zone_version(&self, zone: ZoneId) -> VersionHandle {
        let mut zones = self.zones.lock();
        let counter = zones
            .entry(zone)
            .or_insert_with(|| Arc::new(AtomicU32::new(INITIAL_VERSION)));
        VersionHandle::new(Arc::clone(counter))
    }

    /// Handle to a material channel counter, created at version 1 if absent
    pub fn material_version(&self, zone: ZoneId, material: MaterialId) -> VersionHandle {
        let mut materials = self.materials.lock();
        let counter = materials
            .entry((zone, material))
            .or_insert_with(|| Arc::new(AtomicU32::new(INITIAL_VERSION)));
        VersionHandle::new(Arc::clone(counter))
    }

    /// Handle for either addressing level of a [`VersionKey`]
    pub fn version_of(&self, key: &VersionKey) -> VersionHandle {
        match key.material {
            Some(material) => self.material_version(key.zone, material),
            None => self.zone_version(key.zone),
        }
    }

    /// Number of counters that exist, as (zones, materials)
    pub fn counter_counts(&self) -> (usize, usize) {
        (self.zones.lock().len(), self.materials.lock().len())
    }

    /// Dump every counter's current value
    pub fn snapshot(&self) -> VersionSnapshot {
        let zones = self
            .zones
            .lock()
            .iter()
            .map(|(zone, c)| (*zone, c.load(Ordering::SeqCst)))
            .collect();
        let materials = self
            .materials
            .lock()
            .iter()
            .map(|((zone, material), c)| (*zone, *material, c.load(Ordering::SeqCst)))
            .collect();
        VersionSnapshot { zones, materials }
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}
