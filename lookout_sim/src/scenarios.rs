//! Traffic scenarios driven through the engine under simulated time.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Many regular drivers reporting and routing across the city
    RushHour,
    
    /// SIM-002: Emergency units routed through the same corridors as regular traffic
    EmergencyDispatch,
    
    /// SIM-003: Drivers going silent and getting evicted by the sweeper
    StaleSessions,
    
    /// SIM-004: Repeated identical route requests across TTL expiry and invalidation
    CacheChurn,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::RushHour,
            ScenarioId::EmergencyDispatch,
            ScenarioId::StaleSessions,
            ScenarioId::CacheChurn,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::RushHour => "rush_hour",
            ScenarioId::EmergencyDispatch => "emergency_dispatch",
            ScenarioId::StaleSessions => "stale_sessions",
            ScenarioId::CacheChurn => "cache_churn",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::RushHour => "Drivers submit reports and request routes; fresh routes must match an uncached plan",
            ScenarioId::EmergencyDispatch => "Emergency routes must carry priority and never be slower than regular ones",
            ScenarioId::StaleSessions => "Silent drivers are evicted after the session timeout and never before",
            ScenarioId::CacheChurn => "Cache hits inside the TTL, misses after it, cleared by congestion reports only",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rush_hour" | "rushhour" | "sim-001" => Ok(ScenarioId::RushHour),
            "emergency_dispatch" | "emergencydispatch" | "sim-002" => Ok(ScenarioId::EmergencyDispatch),
            "stale_sessions" | "stalesessions" | "sim-003" => Ok(ScenarioId::StaleSessions),
            "cache_churn" | "cachechurn" | "sim-004" => Ok(ScenarioId::CacheChurn),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
