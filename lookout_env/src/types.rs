//! Common identifier types shared by the engine and its collaborators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a registered driver.
///
/// Issued by the (external) registration service; the engine only uses it
/// as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub Uuid);

impl DriverId {
    /// Creates a new random DriverId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a DriverId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
    
    /// Creates a deterministic DriverId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        Self(uuid_from_seed(seed))
    }
    
    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a submitted traffic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    /// Creates a new random ReportId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic ReportId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        Self(uuid_from_seed(seed))
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn uuid_from_seed(seed: u64) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
    Uuid::from_bytes(bytes)
}
