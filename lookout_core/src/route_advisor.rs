//! The route advisor: priority-aware straight-line routing over the
//! congestion model, fronted by the route cache.
//!
//! For a (start, end, vehicle class) request:
//! 1. Serve from the cache when an unexpired entry exists
//! 2. Otherwise estimate travel time as 2 min/km plus the delay of every
//!    congestion zone within the radius of the route midpoint
//! 3. Cut the accumulated delay to 30% for emergency vehicles
//! 4. Label the route, sketch its waypoints and cache it

use crate::config::EngineConfig;
use crate::congestion::CongestionModel;
use crate::geo_math::{interpolate, midpoint, Coordinate};
use crate::route_cache::{RouteCache, RouteKey};
use crate::tracking::VehicleClass;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Minutes of travel per kilometre of straight-line distance.
pub const MINUTES_PER_KM: f64 = 2.0;

/// Longitude shift of the two detour waypoints on regular routes.
pub const AVOIDANCE_OFFSET_DEG: f64 = 0.1;

// ============================================================================
// ROUTE
// ============================================================================

/// Qualitative traffic label of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficCondition {
    Light,
    Moderate,
    Heavy,
}

impl TrafficCondition {
    /// `heavy` above 3 minutes of delay, `moderate` above 1, else `light`.
    pub fn from_delay(delay_min: f64) -> Self {
        if delay_min > 3.0 {
            TrafficCondition::Heavy
        } else if delay_min > 1.0 {
            TrafficCondition::Moderate
        } else {
            TrafficCondition::Light
        }
    }
}

/// A named point along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64, name: &str) -> Self {
        Self {
            lat,
            lng,
            name: name.to_string(),
        }
    }
    
    fn at(point: Coordinate, name: &str) -> Self {
        Self::new(point.lat, point.lng, name)
    }
}

/// A computed route. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Straight-line distance, rounded to one decimal (km)
    pub distance_km: f64,
    
    /// Estimated travel time, whole minutes, at least 1
    pub duration_min: u32,
    
    /// Start, 1-2 intermediate points, Destination
    pub waypoints: Vec<Waypoint>,
    
    pub traffic_condition: TrafficCondition,
    
    /// Congestion delay included in the duration, after any emergency cut
    pub traffic_delay_min: f64,
    
    /// True iff computed for an emergency vehicle
    pub is_priority: bool,
}

// ============================================================================
// ROUTE ADVISOR
// ============================================================================

/// Computes routes over the shared congestion model.
///
/// Owns the route cache; the engine invalidates it through
/// [`RouteAdvisor::invalidate`] when a congestion-affecting report arrives.
#[derive(Debug)]
pub struct RouteAdvisor {
    congestion: Arc<CongestionModel>,
    cache: RouteCache,
    radius_km: f64,
    emergency_delay_factor: f64,
}

impl RouteAdvisor {
    pub fn new(congestion: Arc<CongestionModel>, config: &EngineConfig) -> Self {
        Self {
            congestion,
            cache: RouteCache::new(config.route_cache_ttl),
            radius_km: config.congestion_radius_km,
            emergency_delay_factor: config.emergency_delay_factor,
        }
    }
    
    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }
    
    /// Drop every cached route. Returns the number of entries removed.
    pub fn invalidate(&self) -> usize {
        self.cache.clear()
    }
    
    /// Route for the request, from cache when fresh, otherwise computed and
    /// cached under `now`.
    ///
    /// Callers must pass validated coordinates.
    pub fn compute_route(
        &self,
        start: Coordinate,
        end: Coordinate,
        vehicle_class: VehicleClass,
        now: SystemTime,
    ) -> Arc<Route> {
        let key = RouteKey::new(start, end, vehicle_class);
        
        if let Some(route) = self.cache.get(&key, now) {
            debug!(class = vehicle_class.as_str(), "route cache hit");
            return route;
        }
        
        // Taken before reading zones so a concurrent invalidation wins
        let generation = self.cache.generation();
        let route = Arc::new(self.plan(start, end, vehicle_class));
        debug!(
            class = vehicle_class.as_str(),
            distance_km = route.distance_km,
            duration_min = route.duration_min,
            "route computed"
        );
        if !self.cache.put_if_current(key, Arc::clone(&route), now, generation) {
            debug!(class = vehicle_class.as_str(), "route cache cleared during computation, not stored");
        }
        route
    }
    
    /// Compute a route against the current congestion model, bypassing the
    /// cache entirely.
    pub fn plan(&self, start: Coordinate, end: Coordinate, vehicle_class: VehicleClass) -> Route {
        let distance = start.distance_km(&end);
        let base_duration = distance * MINUTES_PER_KM;
        
        let center = midpoint(&start, &end);
        let mut traffic_delay = self.congestion.delay_near(&center, self.radius_km);
        
        // Emergency cut applies to the accumulated total, before labelling
        if vehicle_class.is_emergency() {
            traffic_delay *= self.emergency_delay_factor;
        }
        
        let total_duration = (base_duration + traffic_delay).max(1.0);
        
        Route {
            distance_km: (distance * 10.0).round() / 10.0,
            duration_min: total_duration.round() as u32,
            waypoints: waypoints(start, end, vehicle_class),
            traffic_condition: TrafficCondition::from_delay(traffic_delay),
            traffic_delay_min: traffic_delay,
            is_priority: vehicle_class.is_emergency(),
        }
    }
}

/// Waypoint sketch for a route.
///
/// Emergency vehicles get the direct midpoint; everyone else gets two points
/// at 30% and 70% of the way, nudged east then west to visualise a detour.
fn waypoints(start: Coordinate, end: Coordinate, vehicle_class: VehicleClass) -> Vec<Waypoint> {
    let mut points = vec![Waypoint::at(start, "Start")];
    
    match vehicle_class {
        VehicleClass::Emergency => {
            points.push(Waypoint::at(midpoint(&start, &end), "Priority Route"));
        }
        VehicleClass::Regular => {
            let via = interpolate(&start, &end, 0.3);
            let avoid = interpolate(&start, &end, 0.7);
            points.push(Waypoint::new(via.lat, via.lng + AVOIDANCE_OFFSET_DEG, "Via Main Route"));
            points.push(Waypoint::new(avoid.lat, avoid.lng - AVOIDANCE_OFFSET_DEG, "Avoid Congestion"));
        }
    }
    
    points.push(Waypoint::at(end, "Destination"));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::Severity;
    use approx::assert_relative_eq;
    use std::time::{Duration, UNIX_EPOCH};
    
    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_704_067_200)
    }
    
    fn start() -> Coordinate {
        Coordinate { lat: 37.7749, lng: -122.4194 }
    }
    
    fn end() -> Coordinate {
        Coordinate { lat: 37.7849, lng: -122.4094 }
    }
    
    fn seeded_advisor() -> RouteAdvisor {
        RouteAdvisor::new(Arc::new(CongestionModel::seeded()), &EngineConfig::default())
    }
    
    #[test]
    fn test_traffic_condition_thresholds() {
        assert_eq!(TrafficCondition::from_delay(0.0), TrafficCondition::Light);
        assert_eq!(TrafficCondition::from_delay(1.0), TrafficCondition::Light);
        assert_eq!(TrafficCondition::from_delay(1.01), TrafficCondition::Moderate);
        assert_eq!(TrafficCondition::from_delay(3.0), TrafficCondition::Moderate);
        assert_eq!(TrafficCondition::from_delay(3.01), TrafficCondition::Heavy);
    }
    
    #[test]
    fn test_regular_route_through_seed_zones() {
        let advisor = seeded_advisor();
        let route = advisor.plan(start(), end(), VehicleClass::Regular);
        
        // Midpoint is within 2 km of zones 1 (high) and 2 (moderate)
        assert_eq!(route.distance_km, 1.4);
        assert_eq!(route.traffic_delay_min, 7.0);
        assert_eq!(route.duration_min, 10);
        assert_eq!(route.traffic_condition, TrafficCondition::Heavy);
        assert!(!route.is_priority);
    }
    
    #[test]
    fn test_emergency_route_cuts_delay() {
        let advisor = seeded_advisor();
        let regular = advisor.plan(start(), end(), VehicleClass::Regular);
        let emergency = advisor.plan(start(), end(), VehicleClass::Emergency);
        
        assert!(emergency.is_priority);
        assert_relative_eq!(emergency.traffic_delay_min, 2.1, epsilon = 1e-9);
        assert!(emergency.traffic_delay_min <= regular.traffic_delay_min * 0.3 + 1e-9);
        assert_eq!(emergency.traffic_condition, TrafficCondition::Moderate);
        assert_eq!(emergency.duration_min, 5);
        assert!(emergency.duration_min < regular.duration_min);
        assert_eq!(emergency.distance_km, regular.distance_km);
    }
    
    #[test]
    fn test_route_away_from_zones_is_light() {
        let advisor = seeded_advisor();
        let route = advisor.plan(
            Coordinate { lat: 37.70, lng: -122.50 },
            Coordinate { lat: 37.72, lng: -122.50 },
            VehicleClass::Regular,
        );
        
        assert_eq!(route.traffic_delay_min, 0.0);
        assert_eq!(route.traffic_condition, TrafficCondition::Light);
        assert_eq!(route.distance_km, 2.2);
        assert_eq!(route.duration_min, 4);
    }
    
    #[test]
    fn test_zero_length_route_takes_one_minute() {
        let advisor = RouteAdvisor::new(Arc::new(CongestionModel::new(Vec::new())), &EngineConfig::default());
        let route = advisor.plan(start(), start(), VehicleClass::Regular);
        
        assert_eq!(route.distance_km, 0.0);
        assert_eq!(route.duration_min, 1);
        assert_eq!(route.traffic_condition, TrafficCondition::Light);
    }
    
    #[test]
    fn test_regular_waypoints() {
        let advisor = seeded_advisor();
        let route = advisor.plan(start(), end(), VehicleClass::Regular);
        
        let names: Vec<&str> = route.waypoints.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Start", "Via Main Route", "Avoid Congestion", "Destination"]);
        
        let via = &route.waypoints[1];
        assert_relative_eq!(via.lat, 37.7749 + 0.01 * 0.3, epsilon = 1e-9);
        assert_relative_eq!(via.lng, -122.4194 + 0.01 * 0.3 + 0.1, epsilon = 1e-9);
        
        let avoid = &route.waypoints[2];
        assert_relative_eq!(avoid.lat, 37.7749 + 0.01 * 0.7, epsilon = 1e-9);
        assert_relative_eq!(avoid.lng, -122.4194 + 0.01 * 0.7 - 0.1, epsilon = 1e-9);
    }
    
    #[test]
    fn test_emergency_waypoints() {
        let advisor = seeded_advisor();
        let route = advisor.plan(start(), end(), VehicleClass::Emergency);
        
        assert_eq!(route.waypoints.len(), 3);
        assert_eq!(route.waypoints[0], Waypoint::new(37.7749, -122.4194, "Start"));
        assert_eq!(route.waypoints[1].name, "Priority Route");
        assert_relative_eq!(route.waypoints[1].lat, 37.7799, epsilon = 1e-9);
        assert_relative_eq!(route.waypoints[1].lng, -122.4144, epsilon = 1e-9);
        assert_eq!(route.waypoints[2], Waypoint::new(37.7849, -122.4094, "Destination"));
    }
    
    #[test]
    fn test_compute_route_caches() {
        let advisor = seeded_advisor();
        
        let first = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        let second = advisor.compute_route(start(), end(), VehicleClass::Regular, t0() + Duration::from_secs(60));
        
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(advisor.cache().len(), 1);
    }
    
    #[test]
    fn test_compute_route_recomputes_after_ttl() {
        let advisor = seeded_advisor();
        
        let first = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        let later = advisor.compute_route(start(), end(), VehicleClass::Regular, t0() + Duration::from_secs(301));
        
        assert!(!Arc::ptr_eq(&first, &later));
        assert_eq!(*first, *later);
    }
    
    #[test]
    fn test_cached_route_ignores_new_zones_until_invalidated() {
        let congestion = Arc::new(CongestionModel::new(Vec::new()));
        let advisor = RouteAdvisor::new(Arc::clone(&congestion), &EngineConfig::default());
        
        let before = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        assert_eq!(before.traffic_condition, TrafficCondition::Light);
        
        congestion.add_zone_from_report("Crash on 5th", Severity::High, midpoint(&start(), &end()), t0());
        let stale = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        assert!(Arc::ptr_eq(&before, &stale));
        
        assert_eq!(advisor.invalidate(), 1);
        let fresh = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        assert_eq!(fresh.traffic_condition, TrafficCondition::Heavy);
        assert!(fresh.duration_min > before.duration_min);
    }
    
    #[test]
    fn test_route_serializes_lowercase_condition() {
        let route = seeded_advisor().plan(start(), end(), VehicleClass::Emergency);
        let json = serde_json::to_value(&route).unwrap();
        
        assert_eq!(json["traffic_condition"], "moderate");
        assert_eq!(json["is_priority"], true);
        assert_eq!(json["waypoints"][1]["name"], "Priority Route");
    }
    
    #[test]
    fn test_route_planned_before_invalidation_is_not_cached() {
        let congestion = Arc::new(CongestionModel::new(Vec::new()));
        let advisor = RouteAdvisor::new(Arc::clone(&congestion), &EngineConfig::default());
        let key = RouteKey::new(start(), end(), VehicleClass::Regular);
        
        // A request reads the zones, then a report lands before it stores
        let generation = advisor.cache().generation();
        let outdated = Arc::new(advisor.plan(start(), end(), VehicleClass::Regular));
        congestion.add_zone_from_report("Crash on 5th", Severity::High, midpoint(&start(), &end()), t0());
        advisor.invalidate();
        assert!(!advisor.cache().put_if_current(key, outdated, t0(), generation));
        
        let served = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        assert_eq!(*served, advisor.plan(start(), end(), VehicleClass::Regular));
        assert_eq!(served.traffic_condition, TrafficCondition::Heavy);
    }
    
    #[test]
    fn test_concurrent_invalidation_is_never_lost() {
        let congestion = Arc::new(CongestionModel::new(Vec::new()));
        let advisor = Arc::new(RouteAdvisor::new(Arc::clone(&congestion), &EngineConfig::default()));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        
        let reader = {
            let advisor = Arc::clone(&advisor);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
                }
            })
        };
        
        for i in 0..50 {
            let lat = 37.7799 + (i as f64) * 1e-4;
            congestion.add_zone_from_report("Rolling jam", Severity::Low, Coordinate { lat, lng: -122.4144 }, t0());
            advisor.invalidate();
            
            let served = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
            assert_eq!(*served, advisor.plan(start(), end(), VehicleClass::Regular));
        }
        
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        reader.join().unwrap();
        
        let served = advisor.compute_route(start(), end(), VehicleClass::Regular, t0());
        assert_relative_eq!(served.traffic_delay_min, 50.0 * 0.5);
    }
}
