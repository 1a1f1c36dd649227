//! Identifier types for the OCC engine
//!
//! Zones and materials are addressed by plain integers. Resolution against
//! the spatial/type registry happens outside this crate; no existence
//! validation is performed here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer-addressed spatial partition of the mining world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone:{}", self.0)
    }
}

/// Material-specific sub-resource inside a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material:{}", self.0)
    }
}

/// Unique, monotonically increasing transaction identifier
///
/// Allocated by the transaction manager's global atomic counter at `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Transaction type identifier, maintained by the external type registry
///
/// Links a transaction to the adaptive fast-path threshold for its workload
/// class. This crate stores and serves thresholds per type id but never
/// interprets the id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnTypeId(pub u32);

impl fmt::Display for TxnTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}

/// Addressing unit for version counters
///
/// A key names either a whole zone (`material == None`) or a single material
/// channel within a zone. The two address spaces are independent: bumping a
/// zone counter does not touch any of its material counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    /// Zone the counter belongs to
    pub zone: ZoneId,
    /// Material channel, or `None` for the zone-level counter
    pub material: Option<MaterialId>,
}

impl VersionKey {
    /// Key for a zone-level counter
    pub fn zone(zone: ZoneId) -> Self {
        VersionKey {
            zone,
            material: None,
        }
    }

    /// Key for a material channel counter
    pub fn material(zone: ZoneId, material: MaterialId) -> Self {
        VersionKey {
            zone,
            material: Some(material),
        }
    }

    /// Whether this key addresses a whole zone rather than a material channel
    pub fn is_zone_level(&self) -> bool {
        self.material.is_none()
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.material {
            Some(m) => write!(f, "{}/{}", self.zone, m),
            None => write!(f, "{}", self.zone),
        }
    }
}
