//! Commands and their payload shapes
//!
//! Each command has exactly one parameter layout. The layout is chosen by
//! the command byte alone; a frame whose parameter count disagrees with
//! that layout is rejected instead of being reinterpreted.

use crate::frame::{DecodeError, PAYLOAD_SIZE};

/// Command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    SetVoltage = 0x01,
    SetSpeed = 0x02,
    SetTimer = 0x03,
    JoinRequest = 0x04,
    SetSpeedReply = 0x05,
    JoinOpen = 0x06,
    SettingsReport = 0x07,
    /// Closing frame a controller sends after a set exchange
    SetSpeedConfirm = 0x0B,
    JoinAck = 0x0C,
    QueryNetwork = 0x0D,
    QueryDevice = 0x10,
}

impl Command {
    /// Get the command as its wire byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up a command by its wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Command::SetVoltage),
            0x02 => Some(Command::SetSpeed),
            0x03 => Some(Command::SetTimer),
            0x04 => Some(Command::JoinRequest),
            0x05 => Some(Command::SetSpeedReply),
            0x06 => Some(Command::JoinOpen),
            0x07 => Some(Command::SettingsReport),
            0x0B => Some(Command::SetSpeedConfirm),
            0x0C => Some(Command::JoinAck),
            0x0D => Some(Command::QueryNetwork),
            0x10 => Some(Command::QueryDevice),
            _ => None,
        }
    }

    /// Number of parameter bytes this command carries
    pub const fn parameter_count(self) -> u8 {
        match self {
            Command::SetVoltage | Command::SetSpeed => 1,
            Command::SetTimer => 2,
            Command::SettingsReport => 3,
            Command::JoinRequest | Command::JoinOpen | Command::JoinAck => 4,
            Command::SetSpeedReply
            | Command::SetSpeedConfirm
            | Command::QueryNetwork
            | Command::QueryDevice => 0,
        }
    }
}

/// Fan speed presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Preset {
    #[default]
    Auto = 0x00,
    Low = 0x01,
    Medium = 0x02,
    High = 0x03,
    Max = 0x04,
}

impl Preset {
    /// Get the preset as its wire byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up a preset by its wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Preset::Auto),
            0x01 => Some(Preset::Low),
            0x02 => Some(Preset::Medium),
            0x03 => Some(Preset::High),
            0x04 => Some(Preset::Max),
            _ => None,
        }
    }

    fn decode(value: u8) -> Result<Self, DecodeError> {
        Self::from_u8(value).ok_or(DecodeError::InvalidPreset(value))
    }
}

/// Frame payload, tagged by command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Payload {
    /// Set the fan voltage directly (percent)
    SetVoltage { voltage: u8 },
    /// Select a speed preset
    SetSpeed { speed: Preset },
    /// Select a preset for a limited time, then fall back
    SetTimer { speed: Preset, minutes: u8 },
    /// Ask a main unit to open its network for joining
    JoinRequest { network_id: u32 },
    /// Unit acknowledges a set request
    SetSpeedReply,
    /// Unit offers its network for joining
    JoinOpen { network_id: u32 },
    /// Current settings of the unit
    SettingsReport { speed: Preset, voltage: u8, timer: u8 },
    /// Controller closes a set exchange
    SetSpeedConfirm,
    /// Join acknowledgement (sent by both sides)
    JoinAck { network_id: u32 },
    QueryNetwork,
    QueryDevice,
}

impl Payload {
    /// Command byte for this payload
    pub fn command(&self) -> Command {
        match self {
            Payload::SetVoltage { .. } => Command::SetVoltage,
            Payload::SetSpeed { .. } => Command::SetSpeed,
            Payload::SetTimer { .. } => Command::SetTimer,
            Payload::JoinRequest { .. } => Command::JoinRequest,
            Payload::SetSpeedReply => Command::SetSpeedReply,
            Payload::JoinOpen { .. } => Command::JoinOpen,
            Payload::SettingsReport { .. } => Command::SettingsReport,
            Payload::SetSpeedConfirm => Command::SetSpeedConfirm,
            Payload::JoinAck { .. } => Command::JoinAck,
            Payload::QueryNetwork => Command::QueryNetwork,
            Payload::QueryDevice => Command::QueryDevice,
        }
    }

    /// Exact number of parameter bytes written for this payload
    pub fn parameter_count(&self) -> u8 {
        self.command().parameter_count()
    }

    /// Write the parameters into a zeroed payload area
    pub(crate) fn write(&self, out: &mut [u8; PAYLOAD_SIZE]) {
        match *self {
            Payload::SetVoltage { voltage } => out[0] = voltage,
            Payload::SetSpeed { speed } => out[0] = speed.as_u8(),
            Payload::SetTimer { speed, minutes } => {
                out[0] = speed.as_u8();
                out[1] = minutes;
            }
            Payload::JoinRequest { network_id }
            | Payload::JoinOpen { network_id }
            | Payload::JoinAck { network_id } => {
                out[..4].copy_from_slice(&network_id.to_le_bytes());
            }
            Payload::SettingsReport {
                speed,
                voltage,
                timer,
            } => {
                out[0] = speed.as_u8();
                out[1] = voltage;
                out[2] = timer;
            }
            Payload::SetSpeedReply
            | Payload::SetSpeedConfirm
            | Payload::QueryNetwork
            | Payload::QueryDevice => {}
        }
    }

    /// Read the parameters for `command`
    ///
    /// The caller has already checked that the parameter count matches.
    pub(crate) fn read(command: Command, params: &[u8; PAYLOAD_SIZE]) -> Result<Self, DecodeError> {
        let network_id = || u32::from_le_bytes([params[0], params[1], params[2], params[3]]);

        Ok(match command {
            Command::SetVoltage => Payload::SetVoltage { voltage: params[0] },
            Command::SetSpeed => Payload::SetSpeed {
                speed: Preset::decode(params[0])?,
            },
            Command::SetTimer => Payload::SetTimer {
                speed: Preset::decode(params[0])?,
                minutes: params[1],
            },
            Command::JoinRequest => Payload::JoinRequest {
                network_id: network_id(),
            },
            Command::SetSpeedReply => Payload::SetSpeedReply,
            Command::JoinOpen => Payload::JoinOpen {
                network_id: network_id(),
            },
            Command::SettingsReport => Payload::SettingsReport {
                speed: Preset::decode(params[0])?,
                voltage: params[1],
                timer: params[2],
            },
            Command::SetSpeedConfirm => Payload::SetSpeedConfirm,
            Command::JoinAck => Payload::JoinAck {
                network_id: network_id(),
            },
            Command::QueryNetwork => Payload::QueryNetwork,
            Command::QueryDevice => Payload::QueryDevice,
        })
    }
}
