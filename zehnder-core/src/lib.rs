//! Board-agnostic pairing and polling engine for Zehnder RF units
//!
//! This crate contains all protocol logic that does not depend on a
//! specific radio driver or storage medium:
//!
//! - Link transmitter (single in-flight frame, airway wait, retries)
//! - Pairing state machine (join handshake, backoff)
//! - Operational state machine (polling, speed/timer requests)
//! - Health classifier (error code from protocol symptoms)
//! - Engine tying the above to a transceiver, a store and a tick
//! - Configuration and persisted record types
//!
//! Everything is advanced from one cooperative [`Engine::tick`]; driver
//! callbacks only enqueue [`zehnder_hal::RadioEvent`]s.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod link;
pub mod record;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineEvent, RadioChannel};
pub use health::ErrorCode;
pub use record::PairingRecord;
pub use state::{Settings, SpeedRequest};
pub use storage::{KvPairingStore, PairingStore};
