//! The engine facade: one method per logical request type.
//!
//! ```text
//!  tracking/toggle ──► TrackingRegistry
//!  reports/submit  ──► ReportStore ──► CongestionModel ──► RouteCache::clear
//!  navigation/route ─► RouteAdvisor (RouteCache ▸ GeoMath + CongestionModel)
//!  traffic/live    ──► CongestionModel + TrafficConditionSampler
//!  stats           ──► TrackingRegistry + RouteCache + ReportStore
//! ```
//!
//! Each shared structure has its own lock; no method holds more than one
//! at a time, so report submission never stalls route computation for
//! longer than a single critical section.

use crate::conditions::{TrafficConditionSampler, TrafficConditions};
use crate::config::EngineConfig;
use crate::congestion::{CongestionModel, CongestionZone, Severity};
use crate::error::EngineError;
use crate::geo_math::Coordinate;
use crate::reports::{PublicReport, ReportStatus, ReportStore, ReportType, TrafficReport, DEFAULT_LIST_LIMIT};
use crate::route_advisor::{Route, RouteAdvisor};
use crate::tracking::{TrackingRegistry, VehicleClass};
use lookout_env::{DriverId, LookoutContext, ReportId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

// ============================================================================
// REQUESTS
// ============================================================================

/// Body of a `tracking/toggle` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingToggle {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
}

/// Body of a `reports/submit` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub report_type: ReportType,
    pub location: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub proof_text: Option<String>,
    pub has_proof_image: bool,
}

impl ReportSubmission {
    pub fn new(report_type: ReportType, location: &str, description: &str) -> Self {
        Self {
            report_type,
            location: location.to_string(),
            description: description.to_string(),
            latitude: None,
            longitude: None,
            proof_text: None,
            has_proof_image: false,
        }
    }
    
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }
}

/// Body of a `navigation/route` request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingStatus {
    pub is_tracking: bool,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportReceipt {
    pub report_id: ReportId,
    
    /// Zone created by the report, for accident/congestion reports
    pub zone: Option<CongestionZone>,
    
    /// Cached routes dropped because of this report
    pub routes_invalidated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportListing {
    pub reports: Vec<PublicReport>,
    pub total_active: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAdvice {
    pub route: Arc<Route>,
    pub traffic_conditions: TrafficConditions,
    pub emergency_priority: bool,
    pub calculated_at: SystemTime,
}

/// Congestion zone as shown on the live map (provenance stripped).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicZone {
    pub id: u64,
    pub location: String,
    pub severity: Severity,
    pub lat: f64,
    pub lng: f64,
    pub created_at: Option<SystemTime>,
}

impl From<&CongestionZone> for PublicZone {
    fn from(zone: &CongestionZone) -> Self {
        Self {
            id: zone.id,
            location: zone.location.clone(),
            severity: zone.severity,
            lat: zone.lat,
            lng: zone.lng,
            created_at: zone.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveTraffic {
    pub congestion_zones: Vec<PublicZone>,
    pub active_drivers: usize,
    pub emergency_vehicles: usize,
    pub traffic_conditions: TrafficConditions,
    pub last_updated: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub active_drivers: usize,
    pub total_reports_today: usize,
    pub emergency_vehicles_active: usize,
    /// Size of the route cache; approximate, not a true daily counter
    pub routes_optimized: usize,
    pub uptime_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: SystemTime,
    pub components: BTreeMap<&'static str, &'static str>,
}

/// Outcome of one background sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sessions_evicted: usize,
    pub reports_pruned: usize,
}

// ============================================================================
// TRAFFIC ENGINE
// ============================================================================

/// Owns every piece of traffic state and serves the request operations.
pub struct TrafficEngine<Ctx: LookoutContext> {
    context: Arc<Ctx>,
    config: EngineConfig,
    congestion: Arc<CongestionModel>,
    tracking: Arc<TrackingRegistry>,
    reports: Arc<ReportStore>,
    advisor: RouteAdvisor,
    sampler: TrafficConditionSampler<Ctx>,
    started_at: std::time::Duration,
}

impl<Ctx: LookoutContext> TrafficEngine<Ctx> {
    /// Create an engine seeded with the start-up congestion zones.
    pub fn new(context: Arc<Ctx>, config: EngineConfig) -> Self {
        Self::with_congestion(context, config, CongestionModel::seeded())
    }
    
    /// Create an engine around an explicit congestion model.
    pub fn with_congestion(context: Arc<Ctx>, config: EngineConfig, congestion: CongestionModel) -> Self {
        let congestion = Arc::new(congestion);
        let tracking = Arc::new(TrackingRegistry::new(config.h3_resolution));
        let reports = Arc::new(ReportStore::new());
        let advisor = RouteAdvisor::new(Arc::clone(&congestion), &config);
        let sampler = TrafficConditionSampler::new(
            Arc::clone(&context),
            Arc::clone(&tracking),
            Arc::clone(&reports),
            config.incident_window,
        );
        let started_at = context.now();
        
        Self {
            context,
            config,
            congestion,
            tracking,
            reports,
            advisor,
            sampler,
            started_at,
        }
    }
    
    // ========================================================================
    // ACCESSORS
    // ========================================================================
    
    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }
    
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    
    pub fn congestion(&self) -> &CongestionModel {
        &self.congestion
    }
    
    pub fn tracking(&self) -> &TrackingRegistry {
        &self.tracking
    }
    
    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }
    
    pub fn advisor(&self) -> &RouteAdvisor {
        &self.advisor
    }
    
    // ========================================================================
    // OPERATIONS
    // ========================================================================
    
    /// `POST tracking/toggle`: start or stop live tracking for a driver.
    pub fn toggle_tracking(
        &self,
        driver_id: DriverId,
        vehicle_class: VehicleClass,
        toggle: &TrackingToggle,
    ) -> Result<TrackingStatus, EngineError> {
        if !toggle.is_active {
            self.tracking.stop_session(driver_id);
            return Ok(TrackingStatus {
                is_tracking: false,
                message: "Live tracking stopped",
            });
        }
        
        let position = self.position_or_default(toggle.latitude, toggle.longitude)?;
        self.tracking
            .start_session(driver_id, vehicle_class, position, self.context.system_time())?;
        
        Ok(TrackingStatus {
            is_tracking: true,
            message: "Live tracking started",
        })
    }
    
    /// Location push from a tracked driver. Returns false when the driver
    /// is not currently tracked.
    pub fn push_location(&self, driver_id: DriverId, lat: f64, lng: f64) -> Result<bool, EngineError> {
        let position = validate(lat, lng)?;
        self.tracking
            .update_location(driver_id, position, self.context.system_time())
    }
    
    /// `POST reports/submit`: store the report; accident and congestion
    /// reports also add a congestion zone and clear the route cache.
    pub fn submit_report(
        &self,
        driver_id: DriverId,
        vehicle_class: VehicleClass,
        submission: ReportSubmission,
    ) -> Result<ReportReceipt, EngineError> {
        if submission.location.trim().is_empty() {
            warn!(driver = %driver_id, "report rejected: empty location");
            return Err(EngineError::EmptyLocation);
        }
        let position = self.position_or_default(submission.latitude, submission.longitude)?;
        let now = self.context.system_time();
        
        let verification_score = if vehicle_class.is_emergency() {
            1.0
        } else {
            self.context.random_unit() * 0.8 + 0.2
        };
        
        let report = TrafficReport {
            id: ReportId::new(),
            driver_id,
            report_type: submission.report_type,
            location: submission.location,
            description: submission.description,
            lat: position.lat,
            lng: position.lng,
            vehicle_class,
            proof_text: submission.proof_text,
            has_proof_image: submission.has_proof_image,
            timestamp: now,
            status: ReportStatus::Active,
            verification_score,
        };
        let report_id = report.id;
        let severity = report.report_type.zone_severity();
        let location = report.location.clone();
        
        info!(report = %report_id, kind = report.report_type.as_str(), "traffic report submitted");
        self.reports.push(report);
        
        let (zone, routes_invalidated) = match severity {
            Some(severity) => {
                let zone = self.congestion.add_zone_from_report(&location, severity, position, now);
                (Some(zone), self.advisor.invalidate())
            }
            None => (None, 0),
        };
        
        Ok(ReportReceipt {
            report_id,
            zone,
            routes_invalidated,
        })
    }
    
    /// `GET reports`: newest-first public feed.
    pub fn list_reports(&self, limit: Option<usize>, report_type: Option<&ReportType>) -> ReportListing {
        ReportListing {
            reports: self.reports.list(limit.unwrap_or(DEFAULT_LIST_LIMIT), report_type),
            total_active: self.reports.total_active(),
        }
    }
    
    /// `POST navigation/route`: priority-aware route plus a conditions sample.
    pub fn route(&self, vehicle_class: VehicleClass, request: &RouteRequest) -> Result<RouteAdvice, EngineError> {
        let start = validate(request.start_lat, request.start_lng)?;
        let end = validate(request.end_lat, request.end_lng)?;
        let now = self.context.system_time();
        
        let route = self.advisor.compute_route(start, end, vehicle_class, now);
        
        Ok(RouteAdvice {
            route,
            traffic_conditions: self.sampler.sample(now),
            emergency_priority: vehicle_class.is_emergency(),
            calculated_at: now,
        })
    }
    
    /// `GET traffic/live`: zone snapshot plus current conditions.
    pub fn live_traffic(&self) -> LiveTraffic {
        let now = self.context.system_time();
        
        LiveTraffic {
            congestion_zones: self.congestion.snapshot().iter().map(PublicZone::from).collect(),
            active_drivers: self.tracking.active_count(),
            emergency_vehicles: self.tracking.active_emergency_count(),
            traffic_conditions: self.sampler.sample(now),
            last_updated: now,
        }
    }
    
    /// `GET stats`: dashboard counters.
    pub fn stats(&self) -> EngineStats {
        let now = self.context.system_time();
        
        EngineStats {
            active_drivers: self.tracking.active_count(),
            total_reports_today: self.reports.count_on_day(now),
            emergency_vehicles_active: self.tracking.active_emergency_count(),
            routes_optimized: self.advisor.cache().len(),
            uptime_secs: self.context.now().saturating_sub(self.started_at).as_secs_f64(),
        }
    }
    
    /// `GET health`
    pub fn health(&self) -> HealthStatus {
        let components = ["congestion_model", "tracking_registry", "route_advisor", "report_store"]
            .into_iter()
            .map(|name| (name, "operational"))
            .collect();
        
        HealthStatus {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: self.context.system_time(),
            components,
        }
    }
    
    /// Drivers tracked within `k` H3 rings of a point.
    pub fn drivers_near(&self, lat: f64, lng: f64, k: u32) -> Result<Vec<DriverId>, EngineError> {
        self.tracking.sessions_near(validate(lat, lng)?, k)
    }
    
    /// Evict idle tracking sessions and age out old reports.
    ///
    /// Takes the registry lock and the report lock one after the other,
    /// never both.
    pub fn sweep(&self, now: SystemTime) -> SweepReport {
        let sessions_evicted = self.tracking.evict_stale(now, self.config.session_timeout).len();
        let reports_pruned = self.reports.prune_older_than(now, self.config.report_retention);
        
        SweepReport {
            sessions_evicted,
            reports_pruned,
        }
    }
    
    fn position_or_default(&self, lat: Option<f64>, lng: Option<f64>) -> Result<Coordinate, EngineError> {
        Coordinate::or_default(lat, lng, self.config.default_location).map_err(|err| {
            warn!(%err, "request rejected");
            err
        })
    }
}

fn validate(lat: f64, lng: f64) -> Result<Coordinate, EngineError> {
    Coordinate::new(lat, lng).map_err(|err| {
        warn!(%err, "request rejected");
        err
    })
}
