//! Link layer
//!
//! Owns the single outstanding frame on the half-duplex channel.

pub mod transmitter;

pub use transmitter::{Delivery, LinkCompletion, LinkState, LinkTransmitter};
