//! Exact-key cache of computed routes with time-based expiry.

use crate::geo_math::Coordinate;
use crate::route_advisor::Route;
use crate::tracking::VehicleClass;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Identity of a route request: exact start, end and vehicle class.
///
/// Coordinates are compared bit-for-bit (after folding `-0.0` into `0.0`);
/// two requests a millimetre apart are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    start: [u64; 2],
    end: [u64; 2],
    vehicle_class: VehicleClass,
}

impl RouteKey {
    pub fn new(start: Coordinate, end: Coordinate, vehicle_class: VehicleClass) -> Self {
        Self {
            start: [key_bits(start.lat), key_bits(start.lng)],
            end: [key_bits(end.lat), key_bits(end.lng)],
            vehicle_class,
        }
    }
}

fn key_bits(value: f64) -> u64 {
    // -0.0 + 0.0 == +0.0
    (value + 0.0).to_bits()
}

#[derive(Debug)]
struct CachedRoute {
    route: Arc<Route>,
    stored_at: SystemTime,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<RouteKey, CachedRoute>,
    
    /// Bumped by every clear
    generation: u64,
}

/// Cache of previously computed routes.
///
/// Entries older than the TTL are logically absent; they are dropped on
/// the next lookup that finds them expired or by [`RouteCache::clear`].
///
/// A route computed while a clear happens must not land in the cache
/// afterwards. Callers take [`RouteCache::generation`] before computing and
/// store with [`RouteCache::put_if_current`], which refuses the route once
/// the generation has moved on.
#[derive(Debug)]
pub struct RouteCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl RouteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
        }
    }
    
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
    
    /// Number of clears performed so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
    
    /// Cached route for `key` if it was stored less than one TTL before `now`.
    pub fn get(&self, key: &RouteKey, now: SystemTime) -> Option<Arc<Route>> {
        let mut state = self.state.lock();
        let entry = state.entries.get(key)?;
        
        // stored_at after now (clock skew) counts as age zero
        let age = now.duration_since(entry.stored_at).unwrap_or(Duration::ZERO);
        if age < self.ttl {
            Some(Arc::clone(&entry.route))
        } else {
            state.entries.remove(key);
            None
        }
    }
    
    /// Store a route, overwriting any previous entry for the key.
    pub fn put(&self, key: RouteKey, route: Arc<Route>, now: SystemTime) {
        self.state.lock().entries.insert(
            key,
            CachedRoute {
                route,
                stored_at: now,
            },
        );
    }
    
    /// Store a route computed while the cache was at `generation`.
    ///
    /// Returns false, storing nothing, when a clear happened since.
    pub fn put_if_current(&self, key: RouteKey, route: Arc<Route>, now: SystemTime, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.entries.insert(
            key,
            CachedRoute {
                route,
                stored_at: now,
            },
        );
        true
    }
    
    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.generation += 1;
        removed
    }
    
    /// Number of stored entries, expired-but-not-yet-evicted ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_advisor::{TrafficCondition, Waypoint};
    use std::time::UNIX_EPOCH;
    
    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_704_067_200)
    }
    
    fn sample_route(minutes: u32) -> Arc<Route> {
        Arc::new(Route {
            distance_km: 1.4,
            duration_min: minutes,
            waypoints: vec![
                Waypoint::new(37.7749, -122.4194, "Start"),
                Waypoint::new(37.7849, -122.4094, "Destination"),
            ],
            traffic_condition: TrafficCondition::Light,
            traffic_delay_min: 0.0,
            is_priority: false,
        })
    }
    
    fn sample_key() -> RouteKey {
        RouteKey::new(
            Coordinate { lat: 37.7749, lng: -122.4194 },
            Coordinate { lat: 37.7849, lng: -122.4094 },
            VehicleClass::Regular,
        )
    }
    
    #[test]
    fn test_get_within_ttl() {
        let cache = RouteCache::default();
        let route = sample_route(3);
        cache.put(sample_key(), Arc::clone(&route), t0());
        
        let hit = cache.get(&sample_key(), t0() + Duration::from_secs(299)).unwrap();
        assert!(Arc::ptr_eq(&hit, &route));
    }
    
    #[test]
    fn test_get_expired_is_absent_and_evicted() {
        let cache = RouteCache::default();
        cache.put(sample_key(), sample_route(3), t0());
        
        assert!(cache.get(&sample_key(), t0() + Duration::from_secs(300)).is_none());
        assert!(cache.is_empty());
    }
    
    #[test]
    fn test_get_missing_key() {
        let cache = RouteCache::default();
        assert!(cache.get(&sample_key(), t0()).is_none());
    }
    
    #[test]
    fn test_put_overwrites() {
        let cache = RouteCache::default();
        cache.put(sample_key(), sample_route(3), t0());
        cache.put(sample_key(), sample_route(9), t0() + Duration::from_secs(10));
        
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&sample_key(), t0() + Duration::from_secs(20)).unwrap().duration_min, 9);
    }
    
    #[test]
    fn test_clear() {
        let cache = RouteCache::default();
        cache.put(sample_key(), sample_route(3), t0());
        let other = RouteKey::new(Coordinate::SAN_FRANCISCO, Coordinate::SAN_FRANCISCO, VehicleClass::Emergency);
        cache.put(other, sample_route(1), t0());
        
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(&sample_key(), t0()).is_none());
    }
    
    #[test]
    fn test_key_is_exact_and_class_sensitive() {
        let start = Coordinate { lat: 37.7749, lng: -122.4194 };
        let end = Coordinate { lat: 37.7849, lng: -122.4094 };
        let nudged = Coordinate { lat: 37.7749 + 1e-9, lng: -122.4194 };
        
        assert_eq!(RouteKey::new(start, end, VehicleClass::Regular), sample_key());
        assert_ne!(RouteKey::new(start, end, VehicleClass::Emergency), sample_key());
        assert_ne!(RouteKey::new(nudged, end, VehicleClass::Regular), sample_key());
    }
    
    #[test]
    fn test_key_folds_negative_zero() {
        let a = RouteKey::new(Coordinate { lat: 0.0, lng: 0.0 }, Coordinate::SAN_FRANCISCO, VehicleClass::Regular);
        let b = RouteKey::new(Coordinate { lat: -0.0, lng: 0.0 }, Coordinate::SAN_FRANCISCO, VehicleClass::Regular);
        assert_eq!(a, b);
    }
    
    #[test]
    fn test_put_after_clear_is_refused() {
        let cache = RouteCache::default();
        let generation = cache.generation();
        
        assert_eq!(cache.clear(), 0);
        assert_eq!(cache.generation(), generation + 1);
        
        assert!(!cache.put_if_current(sample_key(), sample_route(3), t0(), generation));
        assert!(cache.is_empty());
        
        assert!(cache.put_if_current(sample_key(), sample_route(3), t0(), generation + 1));
        assert_eq!(cache.len(), 1);
    }
}
