//! Traffic Lookout Core - Traffic-State and Route-Advisory Engine
//!
//! Maintains a live model of the road network as drivers see it and
//! answers routing questions against it:
//! 1. **Congestion Model**: seeded and driver-reported congestion zones
//! 2. **Tracking Registry**: one live session per on-duty driver, H3-indexed
//! 3. **Route Advisor**: priority-aware routing with a coarse-invalidated cache
//!
//! All state is in memory and lives for the lifetime of the process.

pub mod geo_math;
pub mod congestion;
pub mod tracking;
pub mod route_cache;
pub mod route_advisor;
pub mod conditions;
pub mod reports;
pub mod engine;
pub mod sweeper;
pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use geo_math::{distance_km, Coordinate};
pub use congestion::{CongestionModel, CongestionZone, Severity, ZoneSource};
pub use tracking::{TrackingRegistry, TrackingSession, VehicleClass};
pub use route_cache::{RouteCache, RouteKey};
pub use route_advisor::{Route, RouteAdvisor, TrafficCondition, Waypoint};
pub use conditions::{TrafficConditionSampler, TrafficConditions};
pub use reports::{PublicReport, ReportStore, ReportType, TrafficReport};
pub use engine::{
    EngineStats, HealthStatus, LiveTraffic, ReportReceipt, ReportSubmission, RouteAdvice,
    RouteRequest, SweepReport, TrackingToggle, TrafficEngine,
};
pub use sweeper::Sweeper;
pub use config::EngineConfig;
pub use error::EngineError;
