//! Health monitor implementation
//!
//! Tracks communication, fan, filter and configuration symptoms and
//! derives the current error code.

use core::fmt;

use zehnder_protocol::Preset;

use crate::clock::{elapsed, Millis};
use crate::error::Fault;

/// Error codes surfaced to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    /// No symptom within the healthy interval
    #[default]
    None = 0,
    /// Unit not answering or answering out of turn (E01)
    CommunicationError = 1,
    /// Unit reports a preset but no fan voltage (E03)
    FanMalfunction = 3,
    /// Filter runtime above threshold (E05)
    FilterReplacementNeeded = 5,
    /// Persisted configuration or transceiver setup failed
    ConfigError = 6,
}

impl ErrorCode {
    /// Numeric display code
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this code reports a problem
    pub fn is_error(&self) -> bool {
        *self != ErrorCode::None
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::None => f.write_str("OK"),
            ErrorCode::ConfigError => f.write_str("config error"),
            code => write!(f, "E{:02}", code.as_u8()),
        }
    }
}

/// Snapshot of active symptoms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthInputs {
    pub config_fault: bool,
    pub communication_fault: bool,
    pub fan_malfunction: bool,
    pub filter_due: bool,
}

/// Derive the error code from active symptoms
///
/// The most severe symptom wins.
pub fn classify(inputs: &HealthInputs) -> ErrorCode {
    if inputs.config_fault {
        ErrorCode::ConfigError
    } else if inputs.communication_fault {
        ErrorCode::CommunicationError
    } else if inputs.fan_malfunction {
        ErrorCode::FanMalfunction
    } else if inputs.filter_due {
        ErrorCode::FilterReplacementNeeded
    } else {
        ErrorCode::None
    }
}

/// Health monitor for error code derivation
///
/// Communication and fan symptoms are timestamped and stay active for one
/// healthy interval after they were last seen. Configuration faults stay
/// active until the failing area is written successfully.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    healthy_interval_ms: u32,
    filter_threshold_hours: Option<u32>,
    /// Last communication symptom
    last_communication_fault: Option<Millis>,
    /// Last report with a preset but zero voltage
    last_fan_fault: Option<Millis>,
    /// Transceiver rejected its configuration
    radio_fault: bool,
    /// Persisted data could not be loaded or saved
    storage_fault: bool,
    filter_runtime_hours: u32,
}

impl HealthMonitor {
    /// Create a monitor with no active symptoms
    pub fn new(healthy_interval_ms: u32, filter_threshold_hours: Option<u32>) -> Self {
        Self {
            healthy_interval_ms,
            filter_threshold_hours,
            last_communication_fault: None,
            last_fan_fault: None,
            radio_fault: false,
            storage_fault: false,
            filter_runtime_hours: 0,
        }
    }

    /// Record a protocol fault
    pub fn observe(&mut self, fault: &Fault, now: Millis) {
        match fault {
            Fault::Config(failure) if failure.is_radio() => self.radio_fault = true,
            Fault::Config(_) => self.storage_fault = true,
            _ => self.last_communication_fault = Some(now),
        }
    }

    /// Record the settings reported by the unit
    pub fn observe_settings(&mut self, speed: Preset, voltage: u8, now: Millis) {
        if speed != Preset::Auto && voltage == 0 {
            warn!("Unit reports {:?} with no fan voltage", speed);
            self.last_fan_fault = Some(now);
        }
    }

    /// Transceiver accepted a configuration or address write
    pub fn radio_config_ok(&mut self) {
        self.radio_fault = false;
    }

    /// Persisted data was written successfully
    pub fn storage_ok(&mut self) {
        self.storage_fault = false;
    }

    /// Update the externally tracked filter runtime
    pub fn set_filter_runtime_hours(&mut self, hours: u32) {
        self.filter_runtime_hours = hours;
    }

    /// Drop symptoms older than the healthy interval
    ///
    /// Must run every tick so a stale timestamp never looks recent again
    /// after the clock wraps.
    pub fn tick(&mut self, now: Millis) {
        let interval = self.healthy_interval_ms;
        for slot in [&mut self.last_communication_fault, &mut self.last_fan_fault] {
            if matches!(*slot, Some(seen) if elapsed(now, seen) >= interval) {
                *slot = None;
            }
        }
    }

    /// Active symptoms at `now`
    pub fn inputs(&self, now: Millis) -> HealthInputs {
        let recent = |seen: Option<Millis>| {
            seen.is_some_and(|seen| elapsed(now, seen) < self.healthy_interval_ms)
        };

        HealthInputs {
            config_fault: self.radio_fault || self.storage_fault,
            communication_fault: recent(self.last_communication_fault),
            fan_malfunction: recent(self.last_fan_fault),
            filter_due: self
                .filter_threshold_hours
                .is_some_and(|limit| self.filter_runtime_hours > limit),
        }
    }

    /// Current error code
    pub fn error_code(&self, now: Millis) -> ErrorCode {
        classify(&self.inputs(now))
    }
}
