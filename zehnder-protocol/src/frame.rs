//! Frame encoding and decoding
//!
//! Frame format (16 bytes, no padding between fields):
//! - DEST TYPE / DEST ID (2 bytes): routing target
//! - SRC TYPE / SRC ID (2 bytes): sender
//! - TTL (1 byte)
//! - COMMAND (1 byte): selects the payload shape
//! - PARAMETER COUNT (1 byte): must equal the shape's width
//! - PARAMETERS (9 bytes): zero-padded

use core::fmt;

use crate::payload::{Command, Payload};
use crate::DEFAULT_TTL;

/// Complete frame size in bytes
pub const FRAME_SIZE: usize = 16;

/// Routing header + command + parameter count
pub const HEADER_SIZE: usize = 7;

/// Parameter area size in bytes
pub const PAYLOAD_SIZE: usize = FRAME_SIZE - HEADER_SIZE;

const CMD_OFFSET: usize = 5;
const NPARM_OFFSET: usize = 6;

/// Errors that can occur while decoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Input was not exactly `FRAME_SIZE` bytes
    BadLength(usize),
    /// Command byte has no registered payload shape
    UnknownCommand(u8),
    /// Parameter count disagrees with the command's shape
    ParameterCount { command: u8, expected: u8, actual: u8 },
    /// Preset byte outside the known presets
    InvalidPreset(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::BadLength(len) => {
                write!(f, "frame is {} bytes, expected {}", len, FRAME_SIZE)
            }
            DecodeError::UnknownCommand(cmd) => write!(f, "unknown command {:#04x}", cmd),
            DecodeError::ParameterCount {
                command,
                expected,
                actual,
            } => write!(
                f,
                "command {:#04x} carries {} parameters, expected {}",
                command, actual, expected
            ),
            DecodeError::InvalidPreset(value) => write!(f, "invalid preset {:#04x}", value),
        }
    }
}

/// Routing header of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub dest_type: u8,
    pub dest_id: u8,
    pub src_type: u8,
    pub src_id: u8,
    pub ttl: u8,
}

impl Header {
    /// Create a header with the default TTL
    pub const fn new(dest_type: u8, dest_id: u8, src_type: u8, src_id: u8) -> Self {
        Self {
            dest_type,
            dest_id,
            src_type,
            src_id,
            ttl: DEFAULT_TTL,
        }
    }

    /// Replace the TTL
    pub const fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Check if the frame is addressed to the given device
    pub fn is_addressed_to(&self, device_type: u8, device_id: u8) -> bool {
        self.dest_type == device_type && self.dest_id == device_id
    }

    /// Check if the frame was sent by the given device
    pub fn is_from(&self, device_type: u8, device_id: u8) -> bool {
        self.src_type == device_type && self.src_id == device_id
    }
}

/// A parsed or constructed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub header: Header,
    pub payload: Payload,
}

impl Frame {
    /// Create a frame; the parameter count always follows the payload
    pub const fn new(header: Header, payload: Payload) -> Self {
        Self { header, payload }
    }

    /// Command carried by this frame
    pub fn command(&self) -> Command {
        self.payload.command()
    }

    /// Parameter count written on the wire
    pub fn parameter_count(&self) -> u8 {
        self.payload.parameter_count()
    }

    /// Encode this frame into its fixed wire representation
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut buffer = [0u8; FRAME_SIZE];
        buffer[0] = self.header.dest_type;
        buffer[1] = self.header.dest_id;
        buffer[2] = self.header.src_type;
        buffer[3] = self.header.src_id;
        buffer[4] = self.header.ttl;
        buffer[CMD_OFFSET] = self.command().as_u8();
        buffer[NPARM_OFFSET] = self.parameter_count();

        let mut params = [0u8; PAYLOAD_SIZE];
        self.payload.write(&mut params);
        buffer[HEADER_SIZE..].copy_from_slice(&params);
        buffer
    }

    /// Decode a frame from received bytes
    ///
    /// Exactly `FRAME_SIZE` bytes are required. Bytes past the parameter
    /// count are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; FRAME_SIZE] = bytes
            .try_into()
            .map_err(|_| DecodeError::BadLength(bytes.len()))?;

        let raw_command = bytes[CMD_OFFSET];
        let command = Command::from_u8(raw_command).ok_or(DecodeError::UnknownCommand(raw_command))?;

        let expected = command.parameter_count();
        let actual = bytes[NPARM_OFFSET];
        if actual != expected {
            return Err(DecodeError::ParameterCount {
                command: raw_command,
                expected,
                actual,
            });
        }

        let mut params = [0u8; PAYLOAD_SIZE];
        params[..expected as usize].copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + expected as usize]);

        Ok(Self {
            header: Header {
                dest_type: bytes[0],
                dest_id: bytes[1],
                src_type: bytes[2],
                src_id: bytes[3],
                ttl: bytes[4],
            },
            payload: Payload::read(command, &params)?,
        })
    }
}
