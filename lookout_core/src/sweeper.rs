//! Sweeper Runtime - periodic cleanup driven by the environment context.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Sweeper                    │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        Context: LookoutContext         │  │
//! │  │  • sleep() → sweep interval            │  │
//! │  │  • system_time() → staleness cutoff    │  │
//! │  └────────────────────────────────────────┘  │
//! │                     │                        │
//! │  ┌──────────────────▼─────────────────────┐  │
//! │  │  TrafficEngine::sweep                  │  │
//! │  │  • evict idle tracking sessions        │  │
//! │  │  • age out reports past retention      │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The sweep is idempotent and holds each lock only for its own pass, so
//! it can run alongside request handling and be dropped at shutdown
//! without draining.
//!
//! # Usage
//!
//! ```ignore
//! let ctx = TokioContext::shared();
//! let engine = Arc::new(TrafficEngine::new(ctx, EngineConfig::default()));
//! Sweeper::new(engine).spawn()?;
//! ```

use crate::engine::{SweepReport, TrafficEngine};
use lookout_env::{EnvError, LookoutContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Background task that periodically sweeps a [`TrafficEngine`].
pub struct Sweeper<Ctx: LookoutContext> {
    engine: Arc<TrafficEngine<Ctx>>,
    interval: Duration,
    sweep_count: u64,
}

impl<Ctx: LookoutContext> Sweeper<Ctx> {
    /// Sweeper running at the engine's configured interval.
    pub fn new(engine: Arc<TrafficEngine<Ctx>>) -> Self {
        let interval = engine.config().sweep_interval;
        Self {
            engine,
            interval,
            sweep_count: 0,
        }
    }
    
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
    
    pub fn interval(&self) -> Duration {
        self.interval
    }
    
    /// Number of sweeps performed so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }
    
    /// Sweep once, immediately.
    pub fn sweep_now(&mut self) -> SweepReport {
        let now = self.engine.context().system_time();
        let report = self.engine.sweep(now);
        self.sweep_count += 1;
        
        if report.sessions_evicted > 0 || report.reports_pruned > 0 {
            info!(
                sweep = self.sweep_count,
                sessions_evicted = report.sessions_evicted,
                reports_pruned = report.reports_pruned,
                "sweep complete"
            );
        }
        report
    }
    
    /// Wait one interval then sweep, `ticks` times.
    pub async fn run_ticks(&mut self, ticks: u64) -> SweepReport {
        let mut total = SweepReport::default();
        for _ in 0..ticks {
            self.engine.context().sleep(self.interval).await;
            let report = self.sweep_now();
            total.sessions_evicted += report.sessions_evicted;
            total.reports_pruned += report.reports_pruned;
        }
        total
    }
    
    /// Sweep every interval until the process exits.
    pub async fn run(mut self) {
        loop {
            self.engine.context().sleep(self.interval).await;
            self.sweep_now();
        }
    }
    
    /// Hand the sweep loop to the context's executor.
    pub fn spawn(self) -> Result<(), EnvError> {
        let context = Arc::clone(self.engine.context());
        context.spawn("lookout-sweeper", self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{ReportSubmission, TrackingToggle};
    use crate::reports::ReportType;
    use crate::testing::ManualContext;
    use crate::tracking::VehicleClass;
    use lookout_env::DriverId;
    
    const MINUTE: Duration = Duration::from_secs(60);
    
    fn tracked_engine() -> (Arc<ManualContext>, Arc<TrafficEngine<ManualContext>>) {
        let ctx = ManualContext::shared(3);
        let engine = Arc::new(TrafficEngine::new(Arc::clone(&ctx), EngineConfig::default()));
        engine
            .toggle_tracking(DriverId::from_seed(1), VehicleClass::Regular, &TrackingToggle { is_active: true, ..Default::default() })
            .unwrap();
        (ctx, engine)
    }
    
    #[test]
    fn test_sweeper_uses_configured_interval() {
        let (_ctx, engine) = tracked_engine();
        let sweeper = Sweeper::new(engine);
        assert_eq!(sweeper.interval(), 5 * MINUTE);
        assert_eq!(sweeper.with_interval(MINUTE).interval(), MINUTE);
    }
    
    #[tokio::test]
    async fn test_run_ticks_evicts_after_timeout() {
        let (ctx, engine) = tracked_engine();
        let mut sweeper = Sweeper::new(Arc::clone(&engine));
        
        // Six sweeps = 30 min idle: not yet stale
        let report = sweeper.run_ticks(6).await;
        assert_eq!(report.sessions_evicted, 0);
        assert_eq!(engine.tracking().active_count(), 1);
        
        // Seventh sweep at 35 min evicts
        let report = sweeper.run_ticks(1).await;
        assert_eq!(report.sessions_evicted, 1);
        assert_eq!(engine.tracking().active_count(), 0);
        assert_eq!(sweeper.sweep_count(), 7);
        assert_eq!(ctx.now(), 35 * MINUTE);
    }
    
    #[tokio::test]
    async fn test_run_ticks_prunes_old_reports() {
        let (_ctx, engine) = tracked_engine();
        engine
            .submit_report(DriverId::from_seed(2), VehicleClass::Regular, ReportSubmission::new(ReportType::Hazard, "Lombard St", "Debris"))
            .unwrap();
        
        let mut sweeper = Sweeper::new(Arc::clone(&engine)).with_interval(Duration::from_secs(6 * 3600));
        let report = sweeper.run_ticks(5).await;
        
        assert_eq!(report.reports_pruned, 1);
        assert!(engine.reports().is_empty());
    }
    
    #[tokio::test]
    async fn test_spawned_sweeper_runs_in_background() {
        let (ctx, engine) = tracked_engine();
        Sweeper::new(Arc::clone(&engine)).spawn().unwrap();
        
        // Each yield lets the sweeper advance the manual clock by one interval
        for _ in 0..32 {
            tokio::task::yield_now().await;
            if engine.tracking().active_count() == 0 {
                break;
            }
        }
        
        assert_eq!(engine.tracking().active_count(), 0);
        assert!(ctx.now() > 30 * MINUTE);
    }
    
    #[test]
    fn test_spawn_without_runtime_fails() {
        let (_ctx, engine) = tracked_engine();
        assert!(matches!(Sweeper::new(engine).spawn(), Err(EnvError::NoRuntime(_))));
    }
}
