//! Zehnder RF frame protocol
//!
//! This crate defines the over-the-air frame format used between a
//! controller (remote, thermostat, automation hub) and a ventilation
//! main unit. Every frame is exactly 16 bytes, the fixed payload width
//! of the nRF905 transceiver the units are built around:
//!
//! ```text
//! ┌──────┬──────┬──────┬──────┬─────┬─────┬───────┬──────────────┐
//! │ DEST │ DEST │ SRC  │ SRC  │ TTL │ CMD │ NPARM │ PARAMETERS   │
//! │ TYPE │ ID   │ TYPE │ ID   │     │     │       │ (zero-padded)│
//! │ 1B   │ 1B   │ 1B   │ 1B   │ 1B  │ 1B  │ 1B    │ 9B           │
//! └──────┴──────┴──────┴──────┴─────┴─────┴───────┴──────────────┘
//! ```
//!
//! There is no checksum in the frame itself; the transceiver's CRC
//! covers the air link. Integrity at this layer comes from the fixed
//! width and from checking `NPARM` against the shape of each command.
//!
//! Multi-byte parameters (network ids) are little-endian.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod frame;
pub mod payload;

pub use frame::{DecodeError, Frame, Header, FRAME_SIZE, HEADER_SIZE, PAYLOAD_SIZE};
pub use payload::{Command, Payload, Preset};

/// Default time-to-live written into outbound frames
pub const DEFAULT_TTL: u8 = 250;

/// Network address used by both sides while a join is in progress
pub const NETWORK_LINK_ID: u32 = 0xA55A_5AA5;

/// Power-on address of an nRF905 that has not been configured yet
pub const NETWORK_DEFAULT_ID: u32 = 0xE7E7_E7E7;

/// Device type identifiers carried in the routing header
pub mod device_type {
    /// Addressed to every device type
    pub const BROADCAST: u8 = 0x00;
    /// The ventilation unit itself
    pub const MAIN_UNIT: u8 = 0x01;
    /// Handheld or wall remote (what this engine presents itself as)
    pub const REMOTE_CONTROL: u8 = 0x03;
    /// CO2 sensor accessory
    pub const CO2_SENSOR: u8 = 0x18;
}
