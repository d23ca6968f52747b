//! Engine composition and tick driver
//!
//! Owns the transceiver, the pairing store, both state machines, the link
//! transmitter and the health monitor. The host calls [`Engine::tick`]
//! periodically; driver callbacks only post [`RadioEvent`]s into the
//! borrowed [`RadioChannel`].
//!
//! Each tick:
//! 1. drains queued radio events
//! 2. advances link timeouts
//! 3. lets the active state machine send
//! 4. pushes the new frame onto the air
//! 5. expires old health symptoms and publishes the error code

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Deque;
use zehnder_hal::{RadioEvent, StorageError, Transceiver};
use zehnder_protocol::{Frame, Preset, NETWORK_LINK_ID};

use crate::clock::Millis;
use crate::config::{ConfigError, EngineConfig};
use crate::error::{ConfigFailure, Fault, TransportFailure};
use crate::health::{ErrorCode, HealthMonitor};
use crate::link::{LinkCompletion, LinkState, LinkTransmitter};
use crate::record::PairingRecord;
use crate::state::{
    OperationalEvent, OperationalMachine, OperationalPhase, PairingMachine, PairingPhase, PairingStep,
    Settings, SpeedRequest,
};
use crate::storage::PairingStore;

/// Radio events buffered between ticks
pub const RADIO_QUEUE_DEPTH: usize = 8;

/// Consumer events buffered between polls
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Queue between driver callbacks and the engine
pub type RadioChannel<M> = Channel<M, RadioEvent, RADIO_QUEUE_DEPTH>;

/// Notifications for the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineEvent {
    /// Pairing established or restored
    Bound(PairingRecord),
    /// Pairing dropped
    Unbound,
    /// New settings known for the unit
    SettingsUpdated(Settings),
    /// Speed request confirmed by the unit
    RequestApplied(SpeedRequest),
    /// Speed request exchange failed; it will be retried
    RequestFailed(SpeedRequest),
    /// Current error code changed
    ErrorCodeChanged(ErrorCode),
}

/// Pairing and polling engine
pub struct Engine<'a, T, S, M>
where
    T: Transceiver,
    S: PairingStore,
    M: RawMutex,
{
    radio: T,
    store: S,
    radio_events: &'a RadioChannel<M>,
    config: EngineConfig,
    link: LinkTransmitter,
    pairing: PairingMachine,
    operational: OperationalMachine,
    health: HealthMonitor,
    error_code: ErrorCode,
    events: Deque<EngineEvent, EVENT_QUEUE_DEPTH>,
}

impl<'a, T, S, M> Engine<'a, T, S, M>
where
    T: Transceiver,
    S: PairingStore,
    M: RawMutex,
{
    /// Create an engine
    ///
    /// `seed` feeds device id generation and should differ between
    /// controllers.
    pub fn new(
        radio: T,
        store: S,
        radio_events: &'a RadioChannel<M>,
        config: EngineConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            radio,
            store,
            radio_events,
            link: LinkTransmitter::new(config.link_timings()),
            pairing: PairingMachine::new(&config, seed),
            operational: OperationalMachine::new(&config),
            health: HealthMonitor::new(config.healthy_interval_ms, config.filter_threshold_hours),
            error_code: ErrorCode::None,
            events: Deque::new(),
            config,
        })
    }

    /// Load the stored pairing and configure the transceiver
    pub fn start(&mut self, now: Millis) {
        match self.store.load() {
            Ok(Some(record)) if record.is_valid() => {
                self.pairing.restore(record);
                self.push_event(EngineEvent::Bound(record));
            }
            Ok(Some(_)) => warn!("Stored pairing record is incomplete, pairing again"),
            Ok(None) => info!("No stored pairing"),
            Err(e) => {
                error!("Failed to load pairing: {:?}", e);
                self.record_fault(ConfigFailure::LoadFailed(e).into(), now);
            }
        }

        let address = self.pairing.record().map_or(NETWORK_LINK_ID, |r| r.network_id);
        let radio_config = self.config.radio.with_address(address);
        if self.radio.configure(&radio_config).is_ok() {
            debug!("Transceiver listening on {:#x}", address);
            self.health.radio_config_ok();
        } else {
            error!("Transceiver rejected configuration");
            self.record_fault(ConfigFailure::RadioRejected.into(), now);
        }

        self.publish_error_code(now);
    }

    /// Advance the engine
    pub fn tick(&mut self, now: Millis) {
        while let Ok(event) = self.radio_events.try_receive() {
            self.handle_radio_event(event, now);
        }

        self.poll_link(now);

        match self.pairing.record() {
            Some(record) => self.operational.tick(now, &record, &mut self.link),
            None => self.pairing.tick(now, &mut self.link),
        }

        self.poll_link(now);

        self.health.tick(now);
        self.publish_error_code(now);
    }

    /// Queue a speed change; replaces any request not yet applied
    pub fn request_speed(&mut self, speed: Preset, timer_minutes: u8) {
        self.operational.request(speed, timer_minutes);
    }

    /// Last known settings of the unit
    pub fn current_settings(&self) -> Settings {
        self.operational.settings()
    }

    /// Error code as of the last tick
    pub fn current_error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Check if a pairing is established
    pub fn is_bound(&self) -> bool {
        self.pairing.is_bound()
    }

    /// The established pairing, if any
    pub fn pairing_record(&self) -> Option<PairingRecord> {
        self.pairing.record()
    }

    /// Request not yet confirmed by the unit
    pub fn pending_request(&self) -> Option<SpeedRequest> {
        self.operational.pending_request()
    }

    /// Take the oldest consumer event
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Drop the current pairing, erase it from storage and start joining
    pub fn unpair(&mut self, now: Millis) {
        self.pairing.unpair(&mut self.link);
        self.operational.reset();

        match self.store.clear() {
            Ok(()) => self.health.storage_ok(),
            Err(e) => {
                error!("Failed to erase pairing: {:?}", e);
                self.record_fault(ConfigFailure::SaveFailed(e).into(), now);
            }
        }

        if self.radio.write_address(NETWORK_LINK_ID).is_ok() {
            self.health.radio_config_ok();
        } else {
            error!("Transceiver rejected link address");
            self.record_fault(ConfigFailure::RadioRejected.into(), now);
        }

        self.push_event(EngineEvent::Unbound);
        self.publish_error_code(now);
    }

    /// Update the externally tracked filter runtime
    pub fn set_filter_runtime_hours(&mut self, hours: u32) {
        self.health.set_filter_runtime_hours(hours);
    }

    /// Report that persisted host configuration failed to load
    pub fn report_config_failure(&mut self, error: StorageError, now: Millis) {
        error!("Configuration load failed: {:?}", error);
        self.record_fault(ConfigFailure::LoadFailed(error).into(), now);
        self.publish_error_code(now);
    }

    /// Report that persisted host configuration was written
    pub fn report_config_saved(&mut self, now: Millis) {
        self.health.storage_ok();
        self.publish_error_code(now);
    }

    /// Get the current pairing phase
    pub fn pairing_phase(&self) -> PairingPhase {
        self.pairing.phase()
    }

    /// Get the current operational phase
    pub fn operational_phase(&self) -> OperationalPhase {
        self.operational.phase()
    }

    /// Get the link transmitter state
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Join attempts that failed since the last success
    pub fn failed_join_attempts(&self) -> u32 {
        self.pairing.failed_attempts()
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get access to the transceiver
    pub fn radio(&self) -> &T {
        &self.radio
    }

    /// Get mutable access to the transceiver
    pub fn radio_mut(&mut self) -> &mut T {
        &mut self.radio
    }

    /// Get access to the pairing store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn poll_link(&mut self, now: Millis) {
        let completion = self.link.poll(&mut self.radio, now);
        if self.link.take_missed_reply() && self.pairing.is_bound() {
            debug!("Unit missed its reply window");
            self.record_fault(TransportFailure::NoReply.into(), now);
        }
        if let Some(completion) = completion {
            self.handle_link(completion, now);
        }
    }

    fn handle_radio_event(&mut self, event: RadioEvent, now: Millis) {
        match event {
            RadioEvent::TransmitComplete => {
                if let Some(completion) = self.link.on_transmit_complete(now) {
                    self.handle_link(completion, now);
                }
            }
            RadioEvent::Received(bytes) => match Frame::decode(&bytes) {
                Ok(frame) => self.handle_frame(&frame, now),
                Err(e) => {
                    debug!("Dropping undecodable frame: {:?}", e);
                    self.record_fault(e.into(), now);
                }
            },
        }
    }

    fn handle_frame(&mut self, frame: &Frame, now: Millis) {
        trace!("Received {:?}", frame.command());

        if let Some(record) = self.pairing.record() {
            let event = self
                .operational
                .handle_frame(frame, now, &record, &mut self.link);
            if let Some(event) = event {
                self.handle_operational(event, now);
            }
            return;
        }

        if let PairingStep::Joined(record) = self.pairing.handle_frame(frame, now, &mut self.link) {
            self.finish_join(record, now);
        }
    }

    fn handle_link(&mut self, completion: LinkCompletion, now: Millis) {
        if self.pairing.is_bound() {
            if let Some(event) = self.operational.handle_link(completion) {
                self.handle_operational(event, now);
            }
        } else {
            self.pairing.handle_link(completion, now);
        }
    }

    fn handle_operational(&mut self, event: OperationalEvent, now: Millis) {
        match event {
            OperationalEvent::SettingsUpdated { settings, reported } => {
                if reported {
                    self.health.observe_settings(settings.speed, settings.voltage, now);
                }
                self.push_event(EngineEvent::SettingsUpdated(settings));
            }
            OperationalEvent::RequestApplied(request) => {
                self.push_event(EngineEvent::RequestApplied(request));
            }
            OperationalEvent::RequestFailed(request, failure) => {
                self.record_fault(failure.into(), now);
                self.push_event(EngineEvent::RequestFailed(request));
            }
            OperationalEvent::QueryFailed(failure) => self.record_fault(failure.into(), now),
            OperationalEvent::Mismatch(mismatch) => self.record_fault(mismatch.into(), now),
        }
    }

    /// Apply and persist a joined record, rolling back on failure
    fn finish_join(&mut self, record: PairingRecord, now: Millis) {
        self.link.cancel();

        if self.radio.write_address(record.network_id).is_err() {
            error!("Transceiver rejected network {:#x}", record.network_id);
            self.record_fault(ConfigFailure::RadioRejected.into(), now);
            self.pairing.abort(now);
            return;
        }
        self.health.radio_config_ok();

        if let Err(e) = self.store.save(&record) {
            error!("Failed to save pairing: {:?}", e);
            self.record_fault(ConfigFailure::SaveFailed(e).into(), now);
            if self.radio.write_address(NETWORK_LINK_ID).is_err() {
                self.record_fault(ConfigFailure::RadioRejected.into(), now);
            }
            self.pairing.abort(now);
            return;
        }
        self.health.storage_ok();

        self.pairing.complete(record);
        self.operational.reset();
        self.push_event(EngineEvent::Bound(record));
    }

    fn record_fault(&mut self, fault: Fault, now: Millis) {
        self.health.observe(&fault, now);
    }

    fn publish_error_code(&mut self, now: Millis) {
        let code = self.health.error_code(now);
        if code != self.error_code {
            if code.is_error() {
                warn!("Error code {:?} -> {:?}", self.error_code, code);
            } else {
                info!("Error code {:?} -> {:?}", self.error_code, code);
            }
            self.error_code = code;
            self.push_event(EngineEvent::ErrorCodeChanged(code));
        }
    }

    fn push_event(&mut self, event: EngineEvent) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        // Cannot fail: room was made above
        let _ = self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rx, MemPairingStore, MockRadio};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use zehnder_protocol::device_type::{MAIN_UNIT, REMOTE_CONTROL};
    use zehnder_protocol::{Command, Payload};

    type TestEngine<'a> = Engine<'a, MockRadio, MemPairingStore, NoopRawMutex>;

    const NETWORK: u32 = 0x1234_5678;
    const US: (u8, u8) = (REMOTE_CONTROL, 0x10);
    const PEER: (u8, u8) = (MAIN_UNIT, 0x20);

    fn record() -> PairingRecord {
        PairingRecord::new(NETWORK, US.0, US.1, PEER.0, PEER.1).unwrap()
    }

    fn engine(channel: &RadioChannel<NoopRawMutex>, store: MemPairingStore) -> TestEngine<'_> {
        Engine::new(MockRadio::default(), store, channel, EngineConfig::default(), 7).unwrap()
    }

    fn bound_store() -> MemPairingStore {
        MemPairingStore {
            record: Some(record()),
            ..Default::default()
        }
    }

    /// Tick once and acknowledge every frame the engine put on the air
    fn step(engine: &mut TestEngine<'_>, channel: &RadioChannel<NoopRawMutex>, now: Millis) -> Vec<Frame> {
        let before = engine.radio().sent.len();
        engine.tick(now);
        let frames = engine.radio().frames().split_off(before);
        for _ in &frames {
            channel.try_send(RadioEvent::TransmitComplete).unwrap();
        }
        frames
    }

    fn drain(engine: &mut TestEngine<'_>) -> Vec<EngineEvent> {
        core::iter::from_fn(|| engine.poll_event()).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let channel = RadioChannel::<NoopRawMutex>::new();
        let config = EngineConfig {
            tx_retries: 0,
            ..Default::default()
        };
        let result = TestEngine::new(MockRadio::default(), MemPairingStore::default(), &channel, config, 1);
        assert!(matches!(result, Err(ConfigError::ZeroRetries)));
    }

    #[test]
    fn test_pairs_with_cooperative_unit() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, MemPairingStore::default());
        engine.start(0);
        assert_eq!(engine.radio().address, Some(NETWORK_LINK_ID));

        let sent = step(&mut engine, &channel, 0);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].payload,
            Payload::JoinRequest {
                network_id: NETWORK_LINK_ID
            }
        );
        let local = (REMOTE_CONTROL, sent[0].header.src_id);

        channel
            .try_send(rx(local, PEER, Payload::JoinOpen { network_id: 0xCAFE_F00D }))
            .unwrap();
        let sent = step(&mut engine, &channel, 10);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, Payload::JoinAck { network_id: 0xCAFE_F00D });
        assert!(sent[0].header.is_addressed_to(PEER.0, PEER.1));

        channel
            .try_send(rx(local, PEER, Payload::JoinAck { network_id: 0xCAFE_F00D }))
            .unwrap();
        let sent = step(&mut engine, &channel, 20);

        let expected = PairingRecord::new(0xCAFE_F00D, local.0, local.1, PEER.0, PEER.1).unwrap();
        assert!(engine.is_bound());
        assert_eq!(engine.pairing_record(), Some(expected));
        assert_eq!(engine.radio().address, Some(0xCAFE_F00D));
        assert_eq!(engine.store().record, Some(expected));
        assert_eq!(drain(&mut engine), vec![EngineEvent::Bound(expected)]);

        // Polling starts right away on the new network
        assert_eq!(sent, vec![expected.frame_to_peer(Payload::QueryDevice, 250)]);
    }

    #[test]
    fn test_silent_unit_keeps_stored_record() {
        let channel = RadioChannel::new();
        let stale = PairingRecord {
            peer_device_id: 0,
            ..record()
        };
        let store = MemPairingStore {
            record: Some(stale),
            ..Default::default()
        };
        let mut engine = engine(&channel, store);
        engine.start(0);
        assert!(!engine.is_bound());
        assert_eq!(engine.radio().address, Some(NETWORK_LINK_ID));

        let mut now = 0;
        while now < 120_000 {
            step(&mut engine, &channel, now);
            now += 100;
        }

        assert!(!engine.is_bound());
        assert!(engine.failed_join_attempts() >= 3);
        assert!(engine
            .radio()
            .frames()
            .iter()
            .all(|f| f.command() == Command::JoinRequest));
        assert_eq!(engine.store().record, Some(stale));
        assert_eq!(engine.store().saves, 0);
        assert_eq!(engine.current_error_code(), ErrorCode::None);
    }

    #[test]
    fn test_unpair_survives_restart() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        engine.unpair(10);
        assert!(!engine.is_bound());
        assert_eq!(engine.radio().address, Some(NETWORK_LINK_ID));
        assert_eq!(engine.store().record, None);

        engine.start(20);
        assert!(!engine.is_bound());
        let sent = step(&mut engine, &channel, 20);
        assert_eq!(sent[0].command(), Command::JoinRequest);
    }

    #[test]
    fn test_unpair_erase_failure_is_config_error() {
        let channel = RadioChannel::new();
        let store = MemPairingStore {
            clear_error: Some(StorageError::Storage),
            ..bound_store()
        };
        let mut engine = engine(&channel, store);
        engine.start(0);
        engine.unpair(10);
        assert!(!engine.is_bound());
        assert_eq!(engine.current_error_code(), ErrorCode::ConfigError);
    }

    #[test]
    fn test_missed_reply_raises_communication_error() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        let sent = step(&mut engine, &channel, 0);
        assert_eq!(sent[0].payload, Payload::QueryDevice);

        // Stay quiet until the first retransmission
        let mut now = 0;
        while engine.radio().sent.len() < 2 {
            now += 100;
            step(&mut engine, &channel, now);
            assert!(now < 5_000);
        }
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);
        assert_eq!(engine.radio().frame(1), engine.radio().frame(0));

        channel
            .try_send(rx(
                US,
                PEER,
                Payload::SettingsReport {
                    speed: Preset::Low,
                    voltage: 30,
                    timer: 0,
                },
            ))
            .unwrap();
        step(&mut engine, &channel, now + 10);
        assert_eq!(engine.current_settings().speed, Preset::Low);
        assert_eq!(engine.link_state(), LinkState::Idle);
        assert_eq!(engine.radio().sent.len(), 2);

        // The symptom clears one healthy interval after the missed reply
        step(&mut engine, &channel, now + 9_999);
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);
        step(&mut engine, &channel, now + 10_000);
        assert_eq!(engine.current_error_code(), ErrorCode::None);
    }

    #[test]
    fn test_settings_report() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        assert!(engine.is_bound());
        assert_eq!(engine.radio().address, Some(NETWORK));

        let sent = step(&mut engine, &channel, 0);
        assert_eq!(sent[0].payload, Payload::QueryDevice);

        channel
            .try_send(rx(
                US,
                PEER,
                Payload::SettingsReport {
                    speed: Preset::Medium,
                    voltage: 50,
                    timer: 0,
                },
            ))
            .unwrap();
        step(&mut engine, &channel, 10);

        let expected = Settings {
            speed: Preset::Medium,
            voltage: 50,
            timer: 0,
        };
        assert_eq!(engine.current_settings(), expected);
        assert_eq!(
            drain(&mut engine),
            vec![EngineEvent::Bound(record()), EngineEvent::SettingsUpdated(expected)]
        );
        assert_eq!(engine.current_error_code(), ErrorCode::None);
    }

    #[test]
    fn test_requests_coalesce() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);

        engine.request_speed(Preset::Low, 0);
        engine.request_speed(Preset::High, 0);
        let sent = step(&mut engine, &channel, 0);

        assert_eq!(sent, vec![record().frame_to_peer(Payload::SetSpeed { speed: Preset::High }, 250)]);
    }

    #[test]
    fn test_set_flow() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        engine.request_speed(Preset::High, 0);
        step(&mut engine, &channel, 0);

        channel.try_send(rx(US, PEER, Payload::SetSpeedReply)).unwrap();
        let sent = step(&mut engine, &channel, 10);
        assert_eq!(sent[0].payload, Payload::SetSpeedConfirm);

        step(&mut engine, &channel, 20);
        let request = SpeedRequest {
            speed: Preset::High,
            timer_minutes: 0,
        };
        assert!(drain(&mut engine).contains(&EngineEvent::RequestApplied(request)));
        assert_eq!(engine.pending_request(), None);
        assert_eq!(engine.current_settings().speed, Preset::High);
    }

    #[test]
    fn test_failed_request_stays_pending() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        engine.radio_mut().airway_free = false;
        engine.request_speed(Preset::Max, 0);

        let mut now = 0;
        while now <= 5_000 {
            step(&mut engine, &channel, now);
            now += 100;
        }

        let events = drain(&mut engine);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::RequestFailed(_))));
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);
        assert!(engine.pending_request().is_some());

        engine.radio_mut().airway_free = true;
        let sent = step(&mut engine, &channel, now);
        assert_eq!(sent[0].payload, Payload::SetSpeed { speed: Preset::Max });
    }

    #[test]
    fn test_mismatch_raises_and_clears_communication_error() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        step(&mut engine, &channel, 0);

        let stranger = (MAIN_UNIT, 0x99);
        channel
            .try_send(rx(US, stranger, Payload::SetSpeedReply))
            .unwrap();
        step(&mut engine, &channel, 10);
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);

        channel
            .try_send(rx(
                US,
                PEER,
                Payload::SettingsReport {
                    speed: Preset::Low,
                    voltage: 30,
                    timer: 0,
                },
            ))
            .unwrap();
        step(&mut engine, &channel, 20);
        step(&mut engine, &channel, 10_009);
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);

        step(&mut engine, &channel, 10_010);
        assert_eq!(engine.current_error_code(), ErrorCode::None);
        let events = drain(&mut engine);
        assert!(events.contains(&EngineEvent::ErrorCodeChanged(ErrorCode::CommunicationError)));
        assert_eq!(events.last(), Some(&EngineEvent::ErrorCodeChanged(ErrorCode::None)));
    }

    #[test]
    fn test_undecodable_frame_is_communication_symptom() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        channel.try_send(RadioEvent::received(&[0x03, 0x10, 0x01])).unwrap();
        step(&mut engine, &channel, 0);
        assert_eq!(engine.current_error_code(), ErrorCode::CommunicationError);
    }

    #[test]
    fn test_fan_malfunction() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        step(&mut engine, &channel, 0);

        channel
            .try_send(rx(
                US,
                PEER,
                Payload::SettingsReport {
                    speed: Preset::High,
                    voltage: 0,
                    timer: 0,
                },
            ))
            .unwrap();
        step(&mut engine, &channel, 10);
        assert_eq!(engine.current_error_code(), ErrorCode::FanMalfunction);
    }

    #[test]
    fn test_configure_failure_is_config_error() {
        let channel = RadioChannel::new();
        let radio = MockRadio {
            fail_configure: true,
            ..Default::default()
        };
        let mut engine =
            TestEngine::new(radio, bound_store(), &channel, EngineConfig::default(), 1).unwrap();
        engine.start(0);
        assert_eq!(engine.current_error_code(), ErrorCode::ConfigError);
        assert_eq!(
            engine.poll_event(),
            Some(EngineEvent::Bound(record()))
        );
        assert_eq!(
            engine.poll_event(),
            Some(EngineEvent::ErrorCodeChanged(ErrorCode::ConfigError))
        );
    }

    #[test]
    fn test_config_error_wins_over_fan_malfunction() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, bound_store());
        engine.start(0);
        step(&mut engine, &channel, 0);
        channel
            .try_send(rx(
                US,
                PEER,
                Payload::SettingsReport {
                    speed: Preset::High,
                    voltage: 0,
                    timer: 0,
                },
            ))
            .unwrap();
        step(&mut engine, &channel, 10);

        engine.report_config_failure(StorageError::Corrupted, 20);
        assert_eq!(engine.current_error_code(), ErrorCode::ConfigError);

        engine.report_config_saved(30);
        assert_eq!(engine.current_error_code(), ErrorCode::FanMalfunction);
    }

    #[test]
    fn test_invalid_stored_record_starts_unbound() {
        let channel = RadioChannel::new();
        let store = MemPairingStore {
            record: Some(PairingRecord {
                peer_device_id: 0,
                ..record()
            }),
            ..Default::default()
        };
        let mut engine = engine(&channel, store);
        engine.start(0);

        assert!(!engine.is_bound());
        let sent = step(&mut engine, &channel, 0);
        assert_eq!(sent[0].command(), Command::JoinRequest);
    }

    #[test]
    fn test_load_failure() {
        let channel = RadioChannel::new();
        let store = MemPairingStore {
            load_error: Some(StorageError::Storage),
            ..Default::default()
        };
        let mut engine = engine(&channel, store);
        engine.start(0);
        assert!(!engine.is_bound());
        assert_eq!(engine.current_error_code(), ErrorCode::ConfigError);
    }

    #[test]
    fn test_address_write_failure_aborts_join() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, MemPairingStore::default());
        engine.start(0);
        engine.radio_mut().fail_address = true;

        let sent = step(&mut engine, &channel, 0);
        let local = (REMOTE_CONTROL, sent[0].header.src_id);
        channel
            .try_send(rx(local, PEER, Payload::JoinOpen { network_id: 0xCAFE_F00D }))
            .unwrap();
        step(&mut engine, &channel, 10);
        channel
            .try_send(rx(local, PEER, Payload::JoinAck { network_id: 0xCAFE_F00D }))
            .unwrap();
        step(&mut engine, &channel, 20);

        assert!(!engine.is_bound());
        assert_eq!(engine.pairing_phase(), PairingPhase::Unbound);
        assert_eq!(engine.failed_join_attempts(), 1);
        assert_eq!(engine.store().saves, 0);
        assert_eq!(engine.current_error_code(), ErrorCode::ConfigError);
    }

    #[test]
    fn test_event_queue_drops_oldest() {
        let channel = RadioChannel::new();
        let mut engine = engine(&channel, MemPairingStore::default());
        for _ in 0..EVENT_QUEUE_DEPTH + 2 {
            engine.push_event(EngineEvent::Unbound);
        }
        engine.push_event(EngineEvent::Bound(record()));
        let events = drain(&mut engine);
        assert_eq!(events.len(), EVENT_QUEUE_DEPTH);
        assert_eq!(events.last(), Some(&EngineEvent::Bound(record())));
    }
}
