//! Normalizes silent world mutation into discrete, subscribable events.
//!
//! Hosts mutate entity and block state without announcing it. This crate
//! watches that state from the outside, once per tick, and turns what changed
//! into `Added`, `Removed`, `Moved`, `QuantityChanged` and `BlockChanged`
//! events delivered synchronously to handlers registered on a per-world
//! [`event::Dispatcher`].

pub mod block_diff;
pub mod config;
pub mod detect;
pub mod entity;
pub mod error;
pub mod event;
pub mod host;
pub mod lifecycle;
pub mod schedule;
pub mod world;

pub use config::WatchConfig;
pub use error::{ConfigError, EngineError, ScheduleError};
pub use host::{TickInfo, TickReport, WorldHost};
