//! Traffic Lookout Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Lookout engine
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! The engine never reads the wall clock or an OS RNG directly. Everything
//! that would make a run non-reproducible goes through [`LookoutContext`]:
//! - Time (`system_time()`, `sleep()`)
//! - Background work (`spawn()`)
//! - Randomness (`random_unit()`)
//!
//! # Example
//!
//! ```ignore
//! use lookout_env::{LookoutContext, TokioContext};
//!
//! async fn sweep_loop<Ctx: LookoutContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_secs(300)).await;
//!         engine.sweep(ctx.system_time());
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::LookoutContext;
pub use types::{DriverId, ReportId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
