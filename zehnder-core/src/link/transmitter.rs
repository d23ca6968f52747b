//! Link transmitter
//!
//! Drives one frame at a time through carrier sense, transmission and
//! reply wait:
//!
//! ```text
//! Idle ─submit─▶ WaitAirwayFree ─airway free─▶ TxBusy ─tx complete─▶ RxWait
//!  ▲                  ▲                          │                    │
//!  │                  └──── reply timeout, retries left ◀─────────────┤
//!  └──── reply / no reply expected / retries exhausted ◀──────────────┘
//! ```
//!
//! `max_retries` is the number of transmissions that wait for a reply.
//! Zero means the frame is fire-and-forget: the attempt completes as soon
//! as the driver reports transmission.
//!
//! The transmitter never looks at received frames. The state machine that
//! recognises a reply calls [`LinkTransmitter::on_reply`].
//!
//! A reply timeout that leads to a retransmission is not a completion, but
//! it is still a missed reply; the owner collects it with
//! [`LinkTransmitter::take_missed_reply`].

use zehnder_hal::Transceiver;
use zehnder_protocol::{Command, Frame, FRAME_SIZE};

use crate::clock::{Millis, Timeout};
use crate::config::LinkTimings;
use crate::error::{Busy, TransportFailure};

/// Link transmitter states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing outstanding
    Idle,
    /// Waiting for carrier sense to report a free channel
    WaitAirwayFree,
    /// Frame handed to the driver, waiting for transmit-complete
    TxBusy,
    /// Frame sent, waiting for the peer's reply
    RxWait,
}

/// How a successful attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Transmitted, no reply was expected
    Sent,
    /// A matching reply was received
    Replied,
}

/// Outcome of an attempt, reported exactly once
pub type LinkCompletion = Result<Delivery, TransportFailure>;

/// The outstanding attempt
#[derive(Debug, Clone)]
struct TransmitAttempt {
    bytes: [u8; FRAME_SIZE],
    command: Command,
    retries_remaining: u8,
    expects_reply: bool,
    /// Armed on entry to each state
    timer: Timeout,
}

/// Single in-flight frame sender
#[derive(Debug)]
pub struct LinkTransmitter {
    state: LinkState,
    attempt: Option<TransmitAttempt>,
    /// Reply timeout followed by a retransmission, not yet collected
    missed_reply: bool,
    timings: LinkTimings,
}

impl LinkTransmitter {
    /// Create an idle transmitter
    pub fn new(timings: LinkTimings) -> Self {
        Self {
            state: LinkState::Idle,
            attempt: None,
            missed_reply: false,
            timings,
        }
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Check if a new frame can be submitted
    pub fn is_idle(&self) -> bool {
        self.attempt.is_none()
    }

    /// Transmissions left for the outstanding attempt
    pub fn retries_remaining(&self) -> Option<u8> {
        self.attempt.as_ref().map(|a| a.retries_remaining)
    }

    /// Collect a reply timeout that was answered by retransmitting
    ///
    /// Exhausted retries are reported as a `NoReply` completion instead.
    pub fn take_missed_reply(&mut self) -> bool {
        core::mem::take(&mut self.missed_reply)
    }

    /// Queue a frame for transmission
    ///
    /// The frame is encoded once; retransmissions resend the same bytes.
    pub fn submit(&mut self, frame: &Frame, max_retries: u8, now: Millis) -> Result<(), Busy> {
        if self.attempt.is_some() {
            error!("Link busy, dropping {:?}", frame.command());
            debug_assert!(cfg!(test), "link submit while an attempt is outstanding");
            return Err(Busy);
        }

        trace!("Link submit {:?} (retries {})", frame.command(), max_retries);
        self.attempt = Some(TransmitAttempt {
            bytes: frame.encode(),
            command: frame.command(),
            retries_remaining: max_retries,
            expects_reply: max_retries > 0,
            timer: Timeout::start(now, self.timings.airway_timeout_ms),
        });
        self.missed_reply = false;
        self.state = LinkState::WaitAirwayFree;
        Ok(())
    }

    /// Advance carrier sense and timeouts
    pub fn poll<T: Transceiver>(&mut self, radio: &mut T, now: Millis) -> Option<LinkCompletion> {
        match self.state {
            LinkState::Idle => None,
            LinkState::WaitAirwayFree => self.poll_airway(radio, now),
            LinkState::TxBusy => {
                let expired = self.attempt.as_ref()?.timer.is_expired(now);
                if expired {
                    warn!("No transmit-complete from driver");
                    self.retry_or_fail(now, TransportFailure::NoTransmitComplete)
                } else {
                    None
                }
            }
            LinkState::RxWait => {
                let expired = self.attempt.as_ref()?.timer.is_expired(now);
                if expired {
                    debug!("Receive timeout");
                    self.retry_or_fail(now, TransportFailure::NoReply)
                } else {
                    None
                }
            }
        }
    }

    /// Driver reported that the frame left the antenna
    pub fn on_transmit_complete(&mut self, now: Millis) -> Option<LinkCompletion> {
        if self.state != LinkState::TxBusy {
            trace!("Spurious transmit-complete in {:?}", self.state);
            return None;
        }
        let attempt = self.attempt.as_mut()?;

        if attempt.expects_reply {
            attempt.timer = Timeout::start(now, self.timings.reply_timeout_ms);
            self.state = LinkState::RxWait;
            None
        } else {
            self.finish(Ok(Delivery::Sent))
        }
    }

    /// A state machine recognised the reply to the outstanding frame
    ///
    /// Accepted in `TxBusy` as well, since the reply can be queued right
    /// behind the transmit-complete event.
    pub fn on_reply(&mut self) -> Option<LinkCompletion> {
        let expects_reply = self.attempt.as_ref()?.expects_reply;
        match self.state {
            LinkState::RxWait | LinkState::TxBusy if expects_reply => self.finish(Ok(Delivery::Replied)),
            _ => None,
        }
    }

    /// Drop the outstanding attempt without reporting a completion
    ///
    /// Returns true if something was outstanding.
    pub fn cancel(&mut self) -> bool {
        self.state = LinkState::Idle;
        self.missed_reply = false;
        self.attempt.take().is_some()
    }

    fn poll_airway<T: Transceiver>(&mut self, radio: &mut T, now: Millis) -> Option<LinkCompletion> {
        let attempt = self.attempt.as_mut()?;

        if radio.is_airway_free() {
            if radio.start_send(&attempt.bytes).is_err() {
                warn!("Driver rejected {:?}", attempt.command);
                return self.finish(Err(TransportFailure::Driver));
            }
            attempt.timer = Timeout::start(now, self.timings.transmit_timeout_ms);
            self.state = LinkState::TxBusy;
            None
        } else if attempt.timer.is_expired(now) {
            warn!("Airway too busy, giving up on {:?}", attempt.command);
            self.finish(Err(TransportFailure::AirwayBusy))
        } else {
            None
        }
    }

    fn retry_or_fail(&mut self, now: Millis, failure: TransportFailure) -> Option<LinkCompletion> {
        let attempt = self.attempt.as_mut()?;
        attempt.retries_remaining = attempt.retries_remaining.saturating_sub(1);

        if attempt.retries_remaining > 0 {
            debug!(
                "Retransmitting {:?} (left: {})",
                attempt.command, attempt.retries_remaining
            );
            attempt.timer = Timeout::start(now, self.timings.airway_timeout_ms);
            self.missed_reply |= failure == TransportFailure::NoReply;
            self.state = LinkState::WaitAirwayFree;
            None
        } else {
            debug!("Giving up on {:?}: {:?}", attempt.command, failure);
            self.finish(Err(failure))
        }
    }

    fn finish(&mut self, result: LinkCompletion) -> Option<LinkCompletion> {
        self.attempt = None;
        self.state = LinkState::Idle;
        Some(result)
    }
}
