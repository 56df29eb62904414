//! The congestion model: seeded and user-reported congestion zones.
//!
//! Zones are append-only for the lifetime of the process. Every
//! congestion-affecting report adds a new zone, even when an identical one
//! already exists at the same spot.

use crate::geo_math::{distance_km, Coordinate};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::debug;

// ============================================================================
// ZONE TYPES
// ============================================================================

/// How badly a zone slows down traffic passing near it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

impl Severity {
    /// Minutes of delay a zone of this severity adds to a nearby route.
    pub fn delay_minutes(&self) -> f64 {
        match self {
            Severity::High => 5.0,
            Severity::Moderate => 2.0,
            Severity::Low => 0.5,
        }
    }
    
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }
}

/// Where a zone came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    /// Part of the fixed start-up set
    Seed,
    /// Derived from a driver's congestion or accident report
    UserReport,
}

/// A geo-located record of seeded or reported traffic severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionZone {
    /// Sequential identifier, unique for the lifetime of the model
    pub id: u64,
    
    /// Human-readable label (street, bridge, highway segment)
    pub location: String,
    
    pub severity: Severity,
    
    pub lat: f64,
    
    pub lng: f64,
    
    pub source: ZoneSource,
    
    /// When the zone was reported (seed zones carry none)
    pub created_at: Option<SystemTime>,
}

impl CongestionZone {
    /// Distance from this zone to a point, in kilometres.
    pub fn distance_to(&self, point: &Coordinate) -> f64 {
        distance_km(point.lat, point.lng, self.lat, self.lng)
    }
}

/// The fixed set of zones the model starts with.
pub fn seed_zones() -> Vec<CongestionZone> {
    let seed = |id, location: &str, severity, lat, lng| CongestionZone {
        id,
        location: location.to_string(),
        severity,
        lat,
        lng,
        source: ZoneSource::Seed,
        created_at: None,
    };
    
    vec![
        seed(1, "Highway 101 North", Severity::High, 37.7749, -122.4194),
        seed(2, "Main Street Bridge", Severity::Moderate, 37.7849, -122.4094),
        seed(3, "Oak Avenue", Severity::Low, 37.7649, -122.4294),
    ]
}

// ============================================================================
// CONGESTION MODEL
// ============================================================================

/// Process-wide set of congestion zones.
///
/// A single reader/writer lock guards the zone list; additions are atomic
/// with respect to concurrent queries.
#[derive(Debug)]
pub struct CongestionModel {
    zones: RwLock<Vec<CongestionZone>>,
}

impl CongestionModel {
    /// Create a model holding exactly the given zones.
    pub fn new(zones: Vec<CongestionZone>) -> Self {
        Self {
            zones: RwLock::new(zones),
        }
    }
    
    /// Create a model holding the start-up seed zones.
    pub fn seeded() -> Self {
        Self::new(seed_zones())
    }
    
    /// Append a user-reported zone with the next sequential identifier.
    ///
    /// No deduplication: reporting the same spot twice yields two zones.
    pub fn add_zone_from_report(
        &self,
        location: &str,
        severity: Severity,
        position: Coordinate,
        now: SystemTime,
    ) -> CongestionZone {
        let mut zones = self.zones.write();
        let id = zones.last().map_or(1, |zone| zone.id + 1);
        
        let zone = CongestionZone {
            id,
            location: location.to_string(),
            severity,
            lat: position.lat,
            lng: position.lng,
            source: ZoneSource::UserReport,
            created_at: Some(now),
        };
        zones.push(zone.clone());
        
        debug!(zone_id = id, severity = severity.as_str(), location, "congestion zone added");
        zone
    }
    
    /// All zones strictly closer than `radius_km` to the point.
    pub fn nearby_zones(&self, point: &Coordinate, radius_km: f64) -> Vec<CongestionZone> {
        self.zones
            .read()
            .iter()
            .filter(|zone| zone.distance_to(point) < radius_km)
            .cloned()
            .collect()
    }
    
    /// Sum of severity delays over every zone within `radius_km` of the point.
    ///
    /// Overlapping zones accumulate without a cap.
    pub fn delay_near(&self, point: &Coordinate, radius_km: f64) -> f64 {
        self.zones
            .read()
            .iter()
            .filter(|zone| zone.distance_to(point) < radius_km)
            .map(|zone| zone.severity.delay_minutes())
            .sum()
    }
    
    /// Copy of every zone, in insertion order.
    pub fn snapshot(&self) -> Vec<CongestionZone> {
        self.zones.read().clone()
    }
    
    pub fn len(&self) -> usize {
        self.zones.read().len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }
}

impl Default for CongestionModel {
    fn default() -> Self {
        Self::seeded()
    }
}
