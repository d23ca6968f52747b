//! Pairing state machine
//!
//! Joins a main unit's network:
//!
//! ```text
//! Unbound ─JOIN_REQUEST─▶ AwaitingLinkRequest ─JOIN_OPEN / JOIN_ACK─▶ AwaitingJoinAck
//!    ▲                          │                                        │
//!    └──── timeout or link failure, after backoff ◀─────────────────────┤
//!                                                                        ▼
//!                                      JOIN_ACK echo or SETTINGS_REPORT: Bound
//! ```
//!
//! The machine only proposes a record. Reprogramming the transceiver and
//! persisting the record is left to the caller, which then commits with
//! [`PairingMachine::complete`] or rolls back with [`PairingMachine::abort`].

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use zehnder_protocol::device_type::{BROADCAST, MAIN_UNIT, REMOTE_CONTROL};
use zehnder_protocol::{Frame, Header, Payload, NETWORK_LINK_ID};

use crate::clock::{Millis, Timeout};
use crate::config::EngineConfig;
use crate::link::{LinkCompletion, LinkTransmitter};
use crate::record::PairingRecord;

/// Highest device id a controller may pick
const MAX_DEVICE_ID: u8 = 0xFD;

/// Pairing phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingPhase {
    /// No identity; a join attempt starts once the backoff elapsed
    Unbound,
    /// JOIN_REQUEST sent, waiting for a unit to open its network
    AwaitingLinkRequest,
    /// JOIN_ACK sent, waiting for the unit to confirm
    AwaitingJoinAck,
    /// Identity established
    Bound,
}

/// Result of handing a frame to the pairing machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingStep {
    /// Frame does not belong to the current join
    Ignored,
    /// Join advanced to the next phase
    Progressed,
    /// Unit confirmed; the record must be applied and persisted
    Joined(PairingRecord),
}

/// Join handshake driver
#[derive(Debug)]
pub struct PairingMachine {
    phase: PairingPhase,
    record: Option<PairingRecord>,
    /// Peer and network learned from JOIN_OPEN
    candidate: Option<PairingRecord>,
    local_device_id: u8,
    rng: SmallRng,
    /// Join timeout for the current phase
    step_timer: Option<Timeout>,
    /// Earliest start of the next attempt
    backoff_timer: Option<Timeout>,
    backoff_ms: u32,
    failed_attempts: u32,
    join_retries: u8,
    join_timeout_ms: u32,
    join_backoff_ms: u32,
    join_backoff_max_ms: u32,
    ttl: u8,
}

impl PairingMachine {
    /// Create an unbound machine
    ///
    /// `seed` should be unique per controller (e.g. from a chip id) so two
    /// controllers powered up together draw different device ids.
    pub fn new(config: &EngineConfig, seed: u64) -> Self {
        Self {
            phase: PairingPhase::Unbound,
            record: None,
            candidate: None,
            local_device_id: 0,
            rng: SmallRng::seed_from_u64(seed),
            step_timer: None,
            backoff_timer: None,
            backoff_ms: config.join_backoff_ms,
            failed_attempts: 0,
            join_retries: config.join_retries,
            join_timeout_ms: config.join_timeout_ms,
            join_backoff_ms: config.join_backoff_ms,
            join_backoff_max_ms: config.join_backoff_max_ms,
            ttl: config.ttl,
        }
    }

    /// Adopt a previously persisted record
    pub fn restore(&mut self, record: PairingRecord) {
        info!("Restored pairing on network {:#x}", record.network_id);
        self.local_device_id = record.local_device_id;
        self.record = Some(record);
        self.candidate = None;
        self.step_timer = None;
        self.phase = PairingPhase::Bound;
    }

    /// Get current phase
    pub fn phase(&self) -> PairingPhase {
        self.phase
    }

    /// Get the bound record
    pub fn record(&self) -> Option<PairingRecord> {
        self.record
    }

    /// Check if an identity is established
    pub fn is_bound(&self) -> bool {
        self.phase == PairingPhase::Bound
    }

    /// Join attempts that ended without a record since the last success
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Device id used by the current or last join attempt
    pub fn local_device_id(&self) -> u8 {
        self.local_device_id
    }

    /// Start a join attempt or time out the current one
    pub fn tick(&mut self, now: Millis, link: &mut LinkTransmitter) {
        match self.phase {
            PairingPhase::Unbound => {
                let ready = self.backoff_timer.map_or(true, |t| t.is_expired(now));
                if ready && link.is_idle() {
                    self.start_attempt(now, link);
                }
            }
            PairingPhase::AwaitingLinkRequest | PairingPhase::AwaitingJoinAck => {
                if self.step_timer.is_some_and(|t| t.is_expired(now)) {
                    warn!("Join timed out in {:?}", self.phase);
                    link.cancel();
                    self.fail_attempt(now);
                }
            }
            PairingPhase::Bound => {}
        }
    }

    /// Process a frame received while unbound
    pub fn handle_frame(&mut self, frame: &Frame, now: Millis, link: &mut LinkTransmitter) -> PairingStep {
        match (self.phase, frame.payload) {
            (PairingPhase::AwaitingLinkRequest, Payload::JoinOpen { network_id }) => {
                self.on_join_open(&frame.header, network_id, now, link)
            }
            (PairingPhase::AwaitingJoinAck, payload) => {
                let Some(candidate) = self.candidate else {
                    return PairingStep::Ignored;
                };
                if !candidate.routes_to_us(&frame.header) {
                    return PairingStep::Ignored;
                }
                let confirmed = match payload {
                    Payload::JoinAck { network_id } => network_id == candidate.network_id,
                    Payload::SettingsReport { .. } => true,
                    _ => false,
                };
                if confirmed {
                    link.on_reply();
                    info!("Unit {:#x} confirmed join", candidate.peer_device_id);
                    PairingStep::Joined(candidate)
                } else {
                    PairingStep::Ignored
                }
            }
            _ => PairingStep::Ignored,
        }
    }

    /// Process a link completion for a join frame
    pub fn handle_link(&mut self, completion: LinkCompletion, now: Millis) {
        if let Err(failure) = completion {
            if matches!(
                self.phase,
                PairingPhase::AwaitingLinkRequest | PairingPhase::AwaitingJoinAck
            ) {
                warn!("Join frame failed: {:?}", failure);
                self.fail_attempt(now);
            }
        }
    }

    /// Commit a record after it was applied and persisted
    pub fn complete(&mut self, record: PairingRecord) {
        info!(
            "Bound to unit {:#x} on network {:#x} after {} failed attempts",
            record.peer_device_id, record.network_id, self.failed_attempts
        );
        self.record = Some(record);
        self.candidate = None;
        self.step_timer = None;
        self.backoff_timer = None;
        self.backoff_ms = self.join_backoff_ms;
        self.failed_attempts = 0;
        self.phase = PairingPhase::Bound;
    }

    /// Roll back a join whose record could not be applied
    pub fn abort(&mut self, now: Millis) {
        warn!("Join aborted, record not applied");
        self.fail_attempt(now);
    }

    /// Forget the bound identity and start joining again
    pub fn unpair(&mut self, link: &mut LinkTransmitter) {
        info!("Unpairing");
        link.cancel();
        self.record = None;
        self.candidate = None;
        self.step_timer = None;
        self.backoff_timer = None;
        self.backoff_ms = self.join_backoff_ms;
        self.failed_attempts = 0;
        self.phase = PairingPhase::Unbound;
    }

    fn start_attempt(&mut self, now: Millis, link: &mut LinkTransmitter) {
        self.local_device_id = self.rng.gen_range(1..=MAX_DEVICE_ID);
        self.candidate = None;

        let header = Header::new(MAIN_UNIT, 0, REMOTE_CONTROL, self.local_device_id).with_ttl(self.ttl);
        let frame = Frame::new(
            header,
            Payload::JoinRequest {
                network_id: NETWORK_LINK_ID,
            },
        );
        if link.submit(&frame, self.join_retries, now).is_err() {
            return;
        }

        debug!("Join attempt as device {:#x}", self.local_device_id);
        self.step_timer = Some(Timeout::start(now, self.join_timeout_ms));
        self.phase = PairingPhase::AwaitingLinkRequest;
    }

    fn on_join_open(
        &mut self,
        header: &Header,
        network_id: u32,
        now: Millis,
        link: &mut LinkTransmitter,
    ) -> PairingStep {
        let to_us = header.is_addressed_to(REMOTE_CONTROL, self.local_device_id)
            || header.dest_type == BROADCAST;
        if !to_us {
            return PairingStep::Ignored;
        }

        let Some(candidate) = PairingRecord::new(
            network_id,
            REMOTE_CONTROL,
            self.local_device_id,
            header.src_type,
            header.src_id,
        ) else {
            warn!("Ignoring JOIN_OPEN with unusable identity");
            return PairingStep::Ignored;
        };

        link.on_reply();
        link.cancel();

        let ack = candidate.frame_to_peer(Payload::JoinAck { network_id }, self.ttl);
        if link.submit(&ack, self.join_retries, now).is_err() {
            return PairingStep::Ignored;
        }

        debug!(
            "Unit {:#x} opened network {:#x}",
            candidate.peer_device_id, network_id
        );
        self.candidate = Some(candidate);
        self.step_timer = Some(Timeout::start(now, self.join_timeout_ms));
        self.phase = PairingPhase::AwaitingJoinAck;
        PairingStep::Progressed
    }

    fn fail_attempt(&mut self, now: Millis) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        warn!(
            "Join attempt {} failed, next in {} ms",
            self.failed_attempts, self.backoff_ms
        );

        self.candidate = None;
        self.step_timer = None;
        self.backoff_timer = Some(Timeout::start(now, self.backoff_ms));
        self.backoff_ms = self
            .backoff_ms
            .saturating_mul(2)
            .min(self.join_backoff_max_ms);
        self.phase = PairingPhase::Unbound;
    }
}
