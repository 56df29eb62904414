//! Hand-cranked context for unit tests.

use async_trait::async_trait;
use lookout_env::{EnvError, LookoutContext};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Virtual clock starting at 2024-01-01T00:00:00Z plus a seeded RNG.
pub struct ManualContext {
    seed: u64,
    elapsed: Mutex<Duration>,
    rng: Mutex<StdRng>,
}

impl ManualContext {
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            seed,
            elapsed: Mutex::new(Duration::ZERO),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }
    
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

#[async_trait]
impl LookoutContext for ManualContext {
    fn now(&self) -> Duration {
        *self.elapsed.lock()
    }
    
    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_704_067_200) + self.now()
    }
    
    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
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
        self.rng.lock().gen::<f64>()
    }
    
    fn seed(&self) -> u64 {
        self.seed
    }
}
