//! Shared vocabulary for the fleet simulation: identifiers, the fixed
//! enumerations for bot status, task kind and priority, 2-D positions and the
//! wall clock used to stamp mutations.

mod clock;
mod types;

pub use clock::now_millis;
pub use types::{BotId, BotStatus, ParseEnumError, Position, Priority, TaskId, TaskKind};
