//! Production implementation of LookoutContext using Tokio.

use crate::{EnvError, LookoutContext};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Production context backed by Tokio and the thread-local RNG.
///
/// Time comes from the system clock, randomness from `thread_rng`.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    
    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LookoutContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
    
    fn spawn<F>(&self, name: &str, future: F) -> Result<(), EnvError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| EnvError::no_runtime(name))?;
        handle.spawn(future);
        Ok(())
    }
    
    fn random_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
    
    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
