//! Engine configuration and its validation.

use std::time::Duration;

/// Shortest tick interval the scheduler accepts.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Tick interval used when none is configured.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10_000);

/// Startup parameters for an [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Time between ticks. Default: 10 s. Must be at least [`MIN_TICK_INTERVAL`].
    pub tick_interval: Duration,
    /// Number of bots created at startup. Default: 10.
    pub fleet_size: usize,
    /// Number of starter tasks placed in the queue. Default: 4.
    pub initial_tasks: usize,
    /// RNG seed for reproducible runs. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Start ticking as soon as the engine is built. Default: true.
    pub autostart: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            fleet_size: 10,
            initial_tasks: 4,
            seed: None,
            autostart: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval < MIN_TICK_INTERVAL {
            return Err(ConfigError::IntervalTooShort {
                configured_ms: self.tick_interval.as_millis() as u64,
            });
        }
        if self.fleet_size == 0 {
            return Err(ConfigError::EmptyFleet);
        }
        Ok(())
    }
}

/// Errors detected by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("tick interval {configured_ms} ms is below the 100 ms minimum")]
    IntervalTooShort { configured_ms: u64 },
    #[error("fleet must contain at least one bot")]
    EmptyFleet,
}
