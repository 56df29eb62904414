//! Core environment context trait for the Lookout engine.

use async_trait::async_trait;
use crate::error::EnvError;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the traffic engine can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `thread_rng`
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
#[async_trait]
pub trait LookoutContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;
    
    /// Returns the wall-clock time used to stamp sessions, reports and
    /// cache entries.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);
    
    /// Spawns a named background task.
    ///
    /// Fails with [`EnvError::NoRuntime`] when there is no executor to
    /// run the task on.
    fn spawn<F>(&self, name: &str, future: F) -> Result<(), EnvError>
    where
        F: Future<Output = ()> + Send + 'static;
    
    /// Draws a uniformly distributed value in `[0, 1)`.
    fn random_unit(&self) -> f64;
    
    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
