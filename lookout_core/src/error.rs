//! Error taxonomy for the traffic engine.
//!
//! The algorithms themselves cannot fail on valid input; everything here is
//! raised at the engine boundary while turning raw request values into
//! validated domain types.

use thiserror::Error;

/// Errors surfaced by the engine facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Latitude/longitude is non-finite or out of range
    #[error("Invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
    
    /// A report arrived without a location label
    #[error("Report location must not be empty")]
    EmptyLocation,
}
