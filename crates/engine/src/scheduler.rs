//! Two-state tick source: **Stopped** (initial) and **Running**.
//!
//! A running scheduler owns exactly one tokio task that calls back into the
//! engine once per interval. Each start hands the task a fresh generation
//! number; callbacks carry it back so the engine can reject ticks from a task
//! that was stopped or replaced while it was waiting for the lock.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::MIN_TICK_INTERVAL;
use crate::error::EngineError;

#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    generation: u64,
    active: Option<JoinHandle<()>>,
}

impl TickScheduler {
    /// A stopped scheduler. The interval is not validated here; the engine
    /// validates its configuration before building one.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            active: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a tick fired by the task of `generation` may still be applied.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active.is_some() && self.generation == generation
    }

    /// Begin calling `on_tick` every interval, first one interval from now.
    /// The task ends when `on_tick` returns false. Returns false (and drops
    /// `on_tick`) if already running.
    pub fn start<F>(&mut self, runtime: &Handle, on_tick: F) -> bool
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        if self.active.is_some() {
            return false;
        }
        self.generation += 1;
        let generation = self.generation;
        let period = self.interval;
        self.active = Some(runtime.spawn(run_ticker(generation, period, on_tick)));
        tracing::info!(
            generation,
            interval_ms = period.as_millis() as u64,
            "tick scheduler started"
        );
        true
    }

    /// Cancel the pending tick. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(handle) => {
                handle.abort();
                tracing::info!(generation = self.generation, "tick scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Replace the interval. A running scheduler has its task cancelled
    /// before the replacement is spawned; a stopped one stays stopped.
    /// Intervals below [`MIN_TICK_INTERVAL`] leave everything untouched.
    pub fn reconfigure<F>(
        &mut self,
        interval: Duration,
        runtime: &Handle,
        on_tick: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        if interval < MIN_TICK_INTERVAL {
            return Err(EngineError::InvalidInterval {
                ms: interval.as_millis() as u64,
                min_ms: MIN_TICK_INTERVAL.as_millis() as u64,
            });
        }
        let was_running = self.stop();
        self.interval = interval;
        if was_running {
            self.start(runtime, on_tick);
        }
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            running = was_running,
            "tick interval reconfigured"
        );
        Ok(())
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.abort();
        }
    }
}

async fn run_ticker<F>(generation: u64, period: Duration, mut on_tick: F)
where
    F: FnMut(u64) -> bool,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !on_tick(generation) {
            tracing::debug!(generation, "ticker retired");
            break;
        }
    }
}
