//! Fleet Kernel: authoritative bot state, the pending task queue and snapshots.
//!
//! # Invariants
//! - Battery stays within `[0, 100]` for every bot at every observation.
//! - A bot carries a current task only while it is busy.
//! - The task queue is strictly FIFO; priority never reorders it.
//! - Snapshots are owned copies, detached from later mutation.

pub mod fleet;
pub mod queue;
pub mod snapshot;

pub use fleet::{Bot, Fleet, Perturbation, RandomWalk};
pub use queue::{NewTask, Task, TaskQueue, TaskRequest, ValidationError};
pub use snapshot::Snapshot;
