//! The "TRACKING" Registry - live driver location sessions
//!
//! One session per driver while they are "on duty". Sessions are:
//! 1. Keyed by driver id (start replaces, stop removes)
//! 2. Spatially indexed by H3 cell for neighbourhood queries
//! 3. Evicted by the background sweep once idle past the timeout

use crate::error::EngineError;
use crate::geo_math::Coordinate;
use h3o::{CellIndex, Resolution};
use lookout_env::DriverId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

// ============================================================================
// VEHICLE CLASS
// ============================================================================

/// Routing class of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    #[default]
    Regular,
    Emergency,
}

impl VehicleClass {
    /// Parse a vehicle-type label permissively.
    ///
    /// Only `"emergency"` (any case) selects the emergency class; every
    /// other label, including unknown ones, falls back to `Regular`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("emergency") {
            VehicleClass::Emergency
        } else {
            if !label.eq_ignore_ascii_case("regular") {
                debug!(label, "unknown vehicle class, treating as regular");
            }
            VehicleClass::Regular
        }
    }
    
    pub fn is_emergency(&self) -> bool {
        matches!(self, VehicleClass::Emergency)
    }
    
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Regular => "regular",
            VehicleClass::Emergency => "emergency",
        }
    }
}

// ============================================================================
// TRACKING SESSION
// ============================================================================

/// A driver's live location-sharing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    pub driver_id: DriverId,
    
    pub vehicle_class: VehicleClass,
    
    /// Current latitude (degrees)
    pub lat: f64,
    
    /// Current longitude (degrees)
    pub lng: f64,
    
    /// When tracking was switched on
    pub started_at: SystemTime,
    
    /// Time of the most recent location push
    pub last_update: SystemTime,
    
    /// Current H3 cell for spatial indexing
    pub h3_cell: CellIndex,
}

impl TrackingSession {
    pub fn position(&self) -> Coordinate {
        Coordinate { lat: self.lat, lng: self.lng }
    }
    
    /// True when the session has been idle for strictly longer than `timeout`.
    ///
    /// A `last_update` in the future (clock skew) counts as fresh.
    pub fn is_stale(&self, now: SystemTime, timeout: Duration) -> bool {
        now.duration_since(self.last_update)
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }
}

// ============================================================================
// TRACKING REGISTRY
// ============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    /// All active sessions, keyed by driver
    sessions: HashMap<DriverId, TrackingSession>,
    
    /// Maps H3 cells to the drivers currently inside them
    spatial_index: HashMap<CellIndex, HashSet<DriverId>>,
}

impl RegistryState {
    fn index_insert(&mut self, cell: CellIndex, driver: DriverId) {
        self.spatial_index
            .entry(cell)
            .or_default()
            .insert(driver);
    }
    
    fn index_remove(&mut self, cell: CellIndex, driver: DriverId) {
        if let Some(set) = self.spatial_index.get_mut(&cell) {
            set.remove(&driver);
            // Clean up empty cells
            if set.is_empty() {
                self.spatial_index.remove(&cell);
            }
        }
    }
    
    fn remove(&mut self, driver: DriverId) -> Option<TrackingSession> {
        let session = self.sessions.remove(&driver)?;
        self.index_remove(session.h3_cell, driver);
        Some(session)
    }
}

/// Process-wide registry of active tracking sessions.
///
/// Session map and spatial index share one lock so they never disagree.
#[derive(Debug)]
pub struct TrackingRegistry {
    state: RwLock<RegistryState>,
    
    /// H3 resolution of the spatial index
    resolution: Resolution,
}

impl TrackingRegistry {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            resolution,
        }
    }
    
    /// Start (or restart) tracking for a driver.
    ///
    /// Replaces any existing session for the same driver; both the start
    /// time and the last-update time are set to `now`.
    pub fn start_session(
        &self,
        driver_id: DriverId,
        vehicle_class: VehicleClass,
        position: Coordinate,
        now: SystemTime,
    ) -> Result<TrackingSession, EngineError> {
        let cell = position.to_cell(self.resolution)?;
        let session = TrackingSession {
            driver_id,
            vehicle_class,
            lat: position.lat,
            lng: position.lng,
            started_at: now,
            last_update: now,
            h3_cell: cell,
        };
        
        let mut state = self.state.write();
        state.remove(driver_id);
        state.index_insert(cell, driver_id);
        state.sessions.insert(driver_id, session.clone());
        
        info!(driver = %driver_id, class = vehicle_class.as_str(), "live tracking started");
        Ok(session)
    }
    
    /// Stop tracking for a driver. Returns false when nothing was tracked.
    pub fn stop_session(&self, driver_id: DriverId) -> bool {
        let removed = self.state.write().remove(driver_id).is_some();
        if removed {
            info!(driver = %driver_id, "live tracking stopped");
        }
        removed
    }
    
    /// Record a location push for an active session.
    ///
    /// Returns false when the driver has no active session.
    pub fn update_location(
        &self,
        driver_id: DriverId,
        position: Coordinate,
        now: SystemTime,
    ) -> Result<bool, EngineError> {
        let new_cell = position.to_cell(self.resolution)?;
        
        let mut state = self.state.write();
        let old_cell = match state.sessions.get_mut(&driver_id) {
            Some(session) => {
                let old_cell = session.h3_cell;
                session.lat = position.lat;
                session.lng = position.lng;
                session.last_update = now;
                session.h3_cell = new_cell;
                old_cell
            }
            None => return Ok(false),
        };
        
        // Update spatial index if cell changed
        if old_cell != new_cell {
            state.index_remove(old_cell, driver_id);
            state.index_insert(new_cell, driver_id);
        }
        Ok(true)
    }
    
    pub fn get(&self, driver_id: DriverId) -> Option<TrackingSession> {
        self.state.read().sessions.get(&driver_id).cloned()
    }
    
    pub fn active_count(&self) -> usize {
        self.state.read().sessions.len()
    }
    
    pub fn active_emergency_count(&self) -> usize {
        self.state
            .read()
            .sessions
            .values()
            .filter(|session| session.vehicle_class.is_emergency())
            .count()
    }
    
    /// Drivers whose current cell lies within `k` rings of the point's cell.
    ///
    /// k=0 is the point's own cell; k=1 adds its 6 neighbours.
    pub fn sessions_near(&self, position: Coordinate, k: u32) -> Result<Vec<DriverId>, EngineError> {
        let center = position.to_cell(self.resolution)?;
        let state = self.state.read();
        
        let mut drivers: Vec<DriverId> = center
            .grid_disk_safe(k)
            .filter_map(|cell| state.spatial_index.get(&cell))
            .flat_map(|set| set.iter().copied())
            .collect();
        drivers.sort();
        Ok(drivers)
    }
    
    /// Remove every session idle for longer than `timeout`.
    ///
    /// Holds the write lock only for this one pass; returns the evicted
    /// drivers.
    pub fn evict_stale(&self, now: SystemTime, timeout: Duration) -> Vec<DriverId> {
        let mut state = self.state.write();
        
        let stale: Vec<DriverId> = state
            .sessions
            .values()
            .filter(|session| session.is_stale(now, timeout))
            .map(|session| session.driver_id)
            .collect();
        
        for driver in &stale {
            state.remove(*driver);
            info!(driver = %driver, "cleaned up inactive tracking session");
        }
        stale
    }
}

impl Default for TrackingRegistry {
    fn default() -> Self {
        Self::new(Resolution::Nine)
    }
}
