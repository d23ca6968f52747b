//! Protocol state machines
//!
//! The pairing machine runs until a bound identity exists, then the
//! operational machine takes over. Both send through the shared
//! [`crate::link::LinkTransmitter`] and never touch the transceiver
//! directly.

pub mod operational;
pub mod pairing;

pub use operational::{OperationalEvent, OperationalMachine, OperationalPhase, Settings, SpeedRequest};
pub use pairing::{PairingMachine, PairingPhase, PairingStep};
