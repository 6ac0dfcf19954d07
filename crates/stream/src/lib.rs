//! Streaming: fan-out of snapshots to push-channel subscribers.
//!
//! # Invariants
//! - A subscriber's first message is the state current when it joined.
//! - Every subscriber sees messages in publish order, none skipped.
//! - One subscriber going away never affects delivery to the others.

mod hub;

pub use hub::{BroadcastHub, DeliveryFailure, PublishReport, SubscriberId, Subscription};
