//! Engine configuration.

use crate::geo_math::Coordinate;
use h3o::Resolution;
use std::time::Duration;

/// Runtime configuration for the [`TrafficEngine`](crate::TrafficEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a computed route stays servable from the cache (default: 5 min)
    pub route_cache_ttl: Duration,
    
    /// Idle time after which a tracking session is evicted (default: 30 min)
    pub session_timeout: Duration,
    
    /// Look-back window for the incident count in conditions (default: 30 min)
    pub incident_window: Duration,
    
    /// Age after which reports are dropped by the sweep (default: 24 h)
    pub report_retention: Duration,
    
    /// Period of the background sweep (default: 5 min)
    pub sweep_interval: Duration,
    
    /// Zones closer than this to a route midpoint add delay (default: 2 km)
    pub congestion_radius_km: f64,
    
    /// Multiplier applied to accumulated delay for emergency vehicles (default: 0.3)
    pub emergency_delay_factor: f64,
    
    /// H3 resolution for the session spatial index
    /// (default: Resolution::Nine, ~174m edge, neighbourhood scale)
    pub h3_resolution: Resolution,
    
    /// Position used when a tracking toggle or report omits coordinates
    pub default_location: Coordinate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            route_cache_ttl: Duration::from_secs(5 * 60),
            session_timeout: Duration::from_secs(30 * 60),
            incident_window: Duration::from_secs(30 * 60),
            report_retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            congestion_radius_km: 2.0,
            emergency_delay_factor: 0.3,
            h3_resolution: Resolution::Nine,
            default_location: Coordinate::SAN_FRANCISCO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.route_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.session_timeout, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.congestion_radius_km, 2.0);
        assert_eq!(config.emergency_delay_factor, 0.3);
        assert_eq!(config.default_location.lat, 37.7749);
    }
}
