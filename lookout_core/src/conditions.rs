//! Point-in-time traffic conditions.

use crate::reports::ReportStore;
use crate::tracking::TrackingRegistry;
use lookout_env::LookoutContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Snapshot of overall traffic conditions. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConditions {
    pub timestamp: SystemTime,
    
    /// Network-wide congestion scalar in [0, 1)
    pub congestion_level: f64,
    
    /// Reports submitted within the incident window
    pub incidents: usize,
    
    /// Emergency vehicles with an active tracking session
    pub emergency_vehicles_active: usize,
}

/// Aggregates registry and report counts into [`TrafficConditions`].
pub struct TrafficConditionSampler<Ctx: LookoutContext> {
    context: Arc<Ctx>,
    tracking: Arc<TrackingRegistry>,
    reports: Arc<ReportStore>,
    incident_window: Duration,
}

impl<Ctx: LookoutContext> TrafficConditionSampler<Ctx> {
    pub fn new(
        context: Arc<Ctx>,
        tracking: Arc<TrackingRegistry>,
        reports: Arc<ReportStore>,
        incident_window: Duration,
    ) -> Self {
        Self {
            context,
            tracking,
            reports,
            incident_window,
        }
    }
    
    /// Take a snapshot at `now`.
    ///
    /// `congestion_level` is a simulated signal: a uniform draw from the
    /// context RNG, not derived from sensor data. Consumers only rely on it
    /// being a plausible scalar in [0, 1).
    pub fn sample(&self, now: SystemTime) -> TrafficConditions {
        TrafficConditions {
            timestamp: now,
            congestion_level: self.context.random_unit(),
            incidents: self.reports.count_within(now, self.incident_window),
            emergency_vehicles_active: self.tracking.active_emergency_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_math::Coordinate;
    use crate::reports::{ReportStatus, ReportType, TrafficReport};
    use crate::testing::ManualContext;
    use crate::tracking::VehicleClass;
    use lookout_env::{DriverId, ReportId};
    
    const MINUTE: Duration = Duration::from_secs(60);
    
    fn hazard_at(seed: u64, timestamp: SystemTime) -> TrafficReport {
        TrafficReport {
            id: ReportId::from_seed(seed),
            driver_id: DriverId::from_seed(seed),
            report_type: ReportType::Hazard,
            location: "Lombard St".to_string(),
            description: "Debris".to_string(),
            lat: 37.80,
            lng: -122.42,
            vehicle_class: VehicleClass::Regular,
            proof_text: None,
            has_proof_image: false,
            timestamp,
            status: ReportStatus::Active,
            verification_score: 0.6,
        }
    }
    
    #[test]
    fn test_sample_empty_state() {
        let ctx = ManualContext::shared(1);
        let sampler = TrafficConditionSampler::new(
            Arc::clone(&ctx),
            Arc::new(TrackingRegistry::default()),
            Arc::new(ReportStore::new()),
            30 * MINUTE,
        );
        
        let conditions = sampler.sample(ctx.system_time());
        assert_eq!(conditions.incidents, 0);
        assert_eq!(conditions.emergency_vehicles_active, 0);
        assert!((0.0..1.0).contains(&conditions.congestion_level));
        assert_eq!(conditions.timestamp, ctx.system_time());
    }
    
    #[test]
    fn test_sample_counts_recent_incidents_and_emergency_vehicles() {
        let ctx = ManualContext::shared(1);
        let tracking = Arc::new(TrackingRegistry::default());
        let reports = Arc::new(ReportStore::new());
        let now = ctx.system_time();
        
        reports.push(hazard_at(1, now - 45 * MINUTE));
        reports.push(hazard_at(2, now - 10 * MINUTE));
        reports.push(hazard_at(3, now));
        
        tracking.start_session(DriverId::from_seed(1), VehicleClass::Emergency, Coordinate::SAN_FRANCISCO, now).unwrap();
        tracking.start_session(DriverId::from_seed(2), VehicleClass::Regular, Coordinate::SAN_FRANCISCO, now).unwrap();
        
        let sampler = TrafficConditionSampler::new(ctx, tracking, reports, 30 * MINUTE);
        let conditions = sampler.sample(now);
        
        assert_eq!(conditions.incidents, 2);
        assert_eq!(conditions.emergency_vehicles_active, 1);
    }
    
    #[test]
    fn test_congestion_level_is_a_fresh_draw() {
        let ctx = ManualContext::shared(7);
        let sampler = TrafficConditionSampler::new(
            Arc::clone(&ctx),
            Arc::new(TrackingRegistry::default()),
            Arc::new(ReportStore::new()),
            30 * MINUTE,
        );
        
        let levels: Vec<f64> = (0..5).map(|_| sampler.sample(ctx.system_time()).congestion_level).collect();
        assert!(levels.windows(2).any(|pair| pair[0] != pair[1]));
    }
}
