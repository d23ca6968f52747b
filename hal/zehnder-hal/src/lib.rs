//! Zehnder RF Hardware Abstraction Layer
//!
//! This crate defines the collaborator traits the protocol engine is
//! written against. Board support code implements them on top of a
//! concrete radio driver and flash layout.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  zehnder-core (pairing/polling engine)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  zehnder-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ nRF905 driver │       │ flash / NVS   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`radio::Transceiver`] - Packet radio (configure, carrier sense, send)
//! - [`storage::KeyValueStorage`] - Persistent storage

#![no_std]
#![deny(unsafe_code)]

pub mod radio;
pub mod storage;

// Re-export key types at crate root for convenience
pub use radio::{Band, CrcMode, RadioConfig, RadioEvent, RxBuffer, Transceiver, TxPower, MAX_RX_LEN};
pub use storage::{KeyValueStorage, StorageError, StorageKey};
