//! Great-circle math on WGS84 coordinates.
//!
//! The route model is a straight-line heuristic, so everything the advisor
//! needs is here: haversine distance, midpoint and linear interpolation.

use crate::error::EngineError;
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Downtown San Francisco, the fallback position for requests without one.
    pub const SAN_FRANCISCO: Coordinate = Coordinate { lat: 37.7749, lng: -122.4194 };
    
    /// Validate and build a coordinate.
    ///
    /// Rejects non-finite values and anything outside
    /// `[-90, 90] x [-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, EngineError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        
        if valid {
            Ok(Self { lat, lng })
        } else {
            Err(EngineError::InvalidCoordinate { lat, lng })
        }
    }
    
    /// Build a coordinate from optional request fields, falling back to
    /// `default` when either half is missing.
    pub fn or_default(
        lat: Option<f64>,
        lng: Option<f64>,
        default: Coordinate,
    ) -> Result<Self, EngineError> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng),
            _ => Ok(default),
        }
    }
    
    /// Haversine distance to another coordinate in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(self.lat, self.lng, other.lat, other.lng)
    }
    
    /// H3 cell containing this coordinate.
    pub fn to_cell(&self, resolution: Resolution) -> Result<CellIndex, EngineError> {
        let latlng = LatLng::new(self.lat, self.lng)
            .map_err(|_| EngineError::InvalidCoordinate { lat: self.lat, lng: self.lng })?;
        Ok(latlng.to_cell(resolution))
    }
}

/// Great-circle distance in kilometres (haversine, R = 6371 km).
///
/// Returns exactly `0.0` for identical points and is bit-for-bit symmetric
/// in its two endpoints.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    // abs() keeps the half-angle sines identical under argument swap
    let half_dlat = ((lat2 - lat1).to_radians() / 2.0).abs();
    let half_dlng = ((lng2 - lng1).to_radians() / 2.0).abs();
    
    let a = (half_dlat.sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * half_dlng.sin().powi(2))
        .min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    
    EARTH_RADIUS_KM * c
}

/// Arithmetic midpoint of two coordinates (not the great-circle midpoint).
pub fn midpoint(a: &Coordinate, b: &Coordinate) -> Coordinate {
    Coordinate {
        lat: (a.lat + b.lat) / 2.0,
        lng: (a.lng + b.lng) / 2.0,
    }
}

/// Point at fraction `t` along the straight line from `a` to `b`.
pub fn interpolate(a: &Coordinate, b: &Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lat: a.lat + (b.lat - a.lat) * t,
        lng: a.lng + (b.lng - a.lng) * t,
    }
}
