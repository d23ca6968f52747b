//! Operational state machine
//!
//! Runs once bound. Two exchanges share the link:
//!
//! ```text
//! Idle ─QUERY_DEVICE─▶ AwaitingQueryReply ─SETTINGS_REPORT─▶ Idle
//! Idle ─SET_SPEED/SET_TIMER─▶ AwaitingSetReply ─report─▶ AwaitingSetConfirm ─sent─▶ Idle
//! ```
//!
//! A pending speed request always goes before a poll. A request is only
//! dropped once the unit replied and our closing frame went out; any
//! failure on the way leaves it pending for the next tick.

use zehnder_protocol::{Frame, Payload, Preset};

use crate::clock::{Millis, Timeout};
use crate::config::EngineConfig;
use crate::error::{ProtocolMismatch, TransportFailure};
use crate::link::{Delivery, LinkCompletion, LinkTransmitter};
use crate::record::PairingRecord;

/// Operational phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationalPhase {
    /// Nothing outstanding
    Idle,
    /// QUERY_DEVICE sent
    AwaitingQueryReply,
    /// SET_SPEED or SET_TIMER sent
    AwaitingSetReply,
    /// Unit replied, SET_SPEED_CONFIRM on its way out
    AwaitingSetConfirm,
}

/// Last settings known for the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub speed: Preset,
    /// Fan voltage in percent
    pub voltage: u8,
    /// Remaining timer in minutes, 0 when no timer runs
    pub timer: u8,
}

/// Speed change requested by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedRequest {
    pub speed: Preset,
    /// 0 selects the preset permanently
    pub timer_minutes: u8,
}

impl SpeedRequest {
    fn payload(&self) -> Payload {
        if self.timer_minutes == 0 {
            Payload::SetSpeed { speed: self.speed }
        } else {
            Payload::SetTimer {
                speed: self.speed,
                minutes: self.timer_minutes,
            }
        }
    }
}

/// Outcomes reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationalEvent {
    /// Settings changed; `reported` is false when derived from a bare
    /// SET_SPEED_REPLY rather than a full report
    SettingsUpdated { settings: Settings, reported: bool },
    /// Unit confirmed the request
    RequestApplied(SpeedRequest),
    /// Request exchange failed; it stays pending
    RequestFailed(SpeedRequest, TransportFailure),
    /// Settings query failed
    QueryFailed(TransportFailure),
    /// Frame discarded
    Mismatch(ProtocolMismatch),
}

/// Poll and set driver
#[derive(Debug)]
pub struct OperationalMachine {
    phase: OperationalPhase,
    settings: Settings,
    /// Latest request not yet applied
    pending: Option<SpeedRequest>,
    /// Request of the current set exchange
    in_flight: Option<SpeedRequest>,
    /// Armed when a query is sent; `None` polls right away
    poll_timer: Option<Timeout>,
    poll_interval_ms: u32,
    tx_retries: u8,
    ttl: u8,
}

impl OperationalMachine {
    /// Create an idle machine
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            phase: OperationalPhase::Idle,
            settings: Settings::default(),
            pending: None,
            in_flight: None,
            poll_timer: None,
            poll_interval_ms: config.poll_interval_ms,
            tx_retries: config.tx_retries,
            ttl: config.ttl,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> OperationalPhase {
        self.phase
    }

    /// Last known settings
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Request waiting to be applied
    pub fn pending_request(&self) -> Option<SpeedRequest> {
        self.pending
    }

    /// Queue a speed change, replacing any request not yet applied
    pub fn request(&mut self, speed: Preset, timer_minutes: u8) {
        let request = SpeedRequest {
            speed,
            timer_minutes,
        };
        if let Some(previous) = self.pending.replace(request) {
            debug!("Request {:?} superseded", previous);
        }
    }

    /// Forget everything tied to the current peer
    pub fn reset(&mut self) {
        self.phase = OperationalPhase::Idle;
        self.settings = Settings::default();
        self.pending = None;
        self.in_flight = None;
        self.poll_timer = None;
    }

    /// Send a pending request or a due poll
    pub fn tick(&mut self, now: Millis, record: &PairingRecord, link: &mut LinkTransmitter) {
        if self.phase != OperationalPhase::Idle || !link.is_idle() {
            return;
        }

        if let Some(request) = self.pending {
            let frame = record.frame_to_peer(request.payload(), self.ttl);
            if link.submit(&frame, self.tx_retries, now).is_ok() {
                debug!("Sending {:?}", request);
                self.in_flight = Some(request);
                self.phase = OperationalPhase::AwaitingSetReply;
            }
            return;
        }

        let due = self.poll_timer.map_or(true, |t| t.is_expired(now));
        if due {
            let frame = record.frame_to_peer(Payload::QueryDevice, self.ttl);
            if link.submit(&frame, self.tx_retries, now).is_ok() {
                trace!("Polling unit");
                self.poll_timer = Some(Timeout::start(now, self.poll_interval_ms));
                self.phase = OperationalPhase::AwaitingQueryReply;
            }
        }
    }

    /// Process a frame received while bound
    pub fn handle_frame(
        &mut self,
        frame: &Frame,
        now: Millis,
        record: &PairingRecord,
        link: &mut LinkTransmitter,
    ) -> Option<OperationalEvent> {
        if !record.routes_to_us(&frame.header) {
            debug!(
                "Dropping frame from {:#x}/{:#x}",
                frame.header.src_type, frame.header.src_id
            );
            return Some(OperationalEvent::Mismatch(ProtocolMismatch::Routing {
                src_type: frame.header.src_type,
                src_id: frame.header.src_id,
            }));
        }

        match (self.phase, frame.payload) {
            (
                OperationalPhase::AwaitingQueryReply,
                Payload::SettingsReport {
                    speed,
                    voltage,
                    timer,
                },
            ) => {
                link.on_reply();
                self.phase = OperationalPhase::Idle;
                Some(self.update(speed, voltage, timer, true))
            }
            (
                OperationalPhase::AwaitingSetReply,
                Payload::SettingsReport {
                    speed,
                    voltage,
                    timer,
                },
            ) => {
                let event = self.update(speed, voltage, timer, true);
                self.confirm(now, record, link);
                Some(event)
            }
            (OperationalPhase::AwaitingSetReply, Payload::SetSpeedReply) => {
                let request = self.in_flight?;
                let voltage = self.settings.voltage;
                let event = self.update(request.speed, voltage, request.timer_minutes, false);
                self.confirm(now, record, link);
                Some(event)
            }
            (
                OperationalPhase::Idle | OperationalPhase::AwaitingSetConfirm,
                Payload::SettingsReport {
                    speed,
                    voltage,
                    timer,
                },
            ) => {
                trace!("Unsolicited settings report");
                Some(self.update(speed, voltage, timer, true))
            }
            (_, Payload::QueryNetwork) => None,
            (_, payload) => {
                debug!("Unexpected {:?} in {:?}", payload.command(), self.phase);
                Some(OperationalEvent::Mismatch(ProtocolMismatch::UnexpectedCommand(
                    payload.command(),
                )))
            }
        }
    }

    /// Process a link completion
    pub fn handle_link(&mut self, completion: LinkCompletion) -> Option<OperationalEvent> {
        match (self.phase, completion) {
            (OperationalPhase::AwaitingSetConfirm, Ok(Delivery::Sent)) => {
                self.phase = OperationalPhase::Idle;
                let request = self.in_flight.take()?;
                if self.pending == Some(request) {
                    self.pending = None;
                }
                info!("Applied {:?}", request);
                Some(OperationalEvent::RequestApplied(request))
            }
            (OperationalPhase::AwaitingQueryReply, Err(failure)) => {
                warn!("Settings query failed: {:?}", failure);
                self.phase = OperationalPhase::Idle;
                Some(OperationalEvent::QueryFailed(failure))
            }
            (OperationalPhase::AwaitingSetReply | OperationalPhase::AwaitingSetConfirm, Err(failure)) => {
                warn!("Set exchange failed: {:?}", failure);
                self.phase = OperationalPhase::Idle;
                let request = self.in_flight.take()?;
                Some(OperationalEvent::RequestFailed(request, failure))
            }
            _ => None,
        }
    }

    fn update(&mut self, speed: Preset, voltage: u8, timer: u8, reported: bool) -> OperationalEvent {
        self.settings = Settings {
            speed,
            voltage,
            timer,
        };
        OperationalEvent::SettingsUpdated {
            settings: self.settings,
            reported,
        }
    }

    fn confirm(&mut self, now: Millis, record: &PairingRecord, link: &mut LinkTransmitter) {
        link.on_reply();
        link.cancel();

        let frame = record.frame_to_peer(Payload::SetSpeedConfirm, self.ttl);
        if link.submit(&frame, 0, now).is_ok() {
            self.phase = OperationalPhase::AwaitingSetConfirm;
        } else {
            self.phase = OperationalPhase::Idle;
            self.in_flight = None;
        }
    }
}
