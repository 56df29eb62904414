//! Traffic Lookout Deterministic Simulation Harness
//!
//! Runs the traffic engine against a virtual clock and a seeded RNG so
//! that every run of a scenario is reproducible from its seed alone.
//!
//! # Core Principle
//!
//! All sources of non-determinism in the engine come through
//! [`lookout_env::LookoutContext`]; [`SimContext`] replaces them:
//! - **Time**: virtual clock, advanced explicitly one tick at a time
//! - **Randomness**: ChaCha8 stream derived from the run seed
//!
//! # Usage
//!
//! ```ignore
//! use lookout_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 20).run(ScenarioId::RushHour);
//! assert!(result.passed);
//! ```

mod context;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
