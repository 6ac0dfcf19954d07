//! Fleet Engine: the single entry point collaborators use to drive the
//! simulation.
//!
//! # Invariants
//! - Fleet, queue, subscribers and the scheduler live behind one lock; every
//!   public operation is atomic with respect to the others.
//! - At most one tick source is active at any time.
//! - Once `stop()` returns, no tick mutates the fleet or publishes until the
//!   next `start()`.
//! - Every tick and every externally triggered mutation publishes a snapshot.

mod config;
mod engine;
mod error;
mod scheduler;

pub use config::{ConfigError, DEFAULT_TICK_INTERVAL, EngineConfig, MIN_TICK_INTERVAL};
pub use engine::{Engine, SnapshotSubscription};
pub use error::EngineError;
pub use scheduler::TickScheduler;

pub use fleetsim_kernel::{Bot, Perturbation, Snapshot, Task, TaskRequest, ValidationError};
pub use fleetsim_stream::SubscriberId;
