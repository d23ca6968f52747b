//! Protocol fault taxonomy
//!
//! Faults are recovered locally where possible and otherwise fed to the
//! health classifier; none of them abort the engine.

use core::fmt;

use zehnder_hal::StorageError;
use zehnder_protocol::{Command, DecodeError};

/// A send attempt that did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportFailure {
    /// Every retransmission timed out waiting for a reply
    NoReply,
    /// The driver never reported transmit completion
    NoTransmitComplete,
    /// The channel stayed busy past the airway timeout
    AirwayBusy,
    /// The driver refused the frame
    Driver,
}

/// A well-formed frame that does not fit the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMismatch {
    /// Routing header names another device or an unknown sender
    Routing { src_type: u8, src_id: u8 },
    /// Command not expected in the current phase
    UnexpectedCommand(Command),
}

/// Configuration could not be loaded or applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigFailure {
    /// Persisted data could not be read
    LoadFailed(StorageError),
    /// Persisted data could not be written
    SaveFailed(StorageError),
    /// The transceiver rejected a configuration or address write
    RadioRejected,
}

impl ConfigFailure {
    /// Check if the failure came from the transceiver
    pub fn is_radio(&self) -> bool {
        matches!(self, ConfigFailure::RadioRejected)
    }
}

/// A second submission while an attempt is outstanding
///
/// The machines never submit unless the link is idle, so seeing this is a
/// programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Busy;

/// Any protocol-level fault observed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    Transport(TransportFailure),
    Mismatch(ProtocolMismatch),
    Decode(DecodeError),
    Config(ConfigFailure),
}

impl Fault {
    /// Check if this fault counts as a communication symptom
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Fault::Transport(_) | Fault::Mismatch(_) | Fault::Decode(_)
        )
    }
}

impl From<TransportFailure> for Fault {
    fn from(e: TransportFailure) -> Self {
        Fault::Transport(e)
    }
}

impl From<ProtocolMismatch> for Fault {
    fn from(e: ProtocolMismatch) -> Self {
        Fault::Mismatch(e)
    }
}

impl From<DecodeError> for Fault {
    fn from(e: DecodeError) -> Self {
        Fault::Decode(e)
    }
}

impl From<ConfigFailure> for Fault {
    fn from(e: ConfigFailure) -> Self {
        Fault::Config(e)
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportFailure::NoReply => "no reply",
            TransportFailure::NoTransmitComplete => "no transmit completion",
            TransportFailure::AirwayBusy => "airway busy",
            TransportFailure::Driver => "driver rejected frame",
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Transport(e) => write!(f, "transport failure: {}", e),
            Fault::Mismatch(ProtocolMismatch::Routing { src_type, src_id }) => write!(
                f,
                "frame from unexpected device {:#04x}/{:#04x}",
                src_type, src_id
            ),
            Fault::Mismatch(ProtocolMismatch::UnexpectedCommand(cmd)) => {
                write!(f, "unexpected command {:#04x}", cmd.as_u8())
            }
            Fault::Decode(e) => write!(f, "decode failure: {}", e),
            Fault::Config(ConfigFailure::LoadFailed(e)) => write!(f, "config load failed: {:?}", e),
            Fault::Config(ConfigFailure::SaveFailed(e)) => write!(f, "config save failed: {:?}", e),
            Fault::Config(ConfigFailure::RadioRejected) => f.write_str("transceiver rejected configuration"),
        }
    }
}
