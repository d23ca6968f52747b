//! Packet radio abstractions
//!
//! Provides the transceiver trait the link layer drives, plus the
//! configuration and event types exchanged with the driver.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest payload a driver may hand back in one receive event
pub const MAX_RX_LEN: usize = 32;

/// Raw bytes of one received payload
pub type RxBuffer = Vec<u8, MAX_RX_LEN>;

/// Events raised by the driver, usually from interrupt context
///
/// These are queued and consumed on the next engine tick rather than
/// acted on inside the driver callback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// The frame passed to [`Transceiver::start_send`] has left the antenna
    TransmitComplete,
    /// A payload was received on the configured address
    Received(RxBuffer),
}

impl RadioEvent {
    /// Build a receive event, truncating anything past `MAX_RX_LEN`
    pub fn received(data: &[u8]) -> Self {
        let len = data.len().min(MAX_RX_LEN);
        let mut buffer = Vec::new();
        // Cannot fail: len is clamped to capacity
        let _ = buffer.extend_from_slice(&data[..len]);
        RadioEvent::Received(buffer)
    }
}

/// Frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Band {
    Mhz433,
    Mhz868,
    Mhz915,
}

/// On-air CRC mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrcMode {
    Disabled,
    Crc8,
    Crc16,
}

/// Transmit output power
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TxPower {
    /// -10 dBm
    Minus10dBm,
    /// -2 dBm
    Minus2dBm,
    /// +6 dBm
    Plus6dBm,
    /// +10 dBm
    Plus10dBm,
}

/// Radio configuration
///
/// The meaning of `channel` is driver specific; the engine only passes
/// it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RadioConfig {
    pub band: Band,
    pub channel: u16,
    pub crc: CrcMode,
    pub tx_power: TxPower,
    /// Address this radio listens on
    pub rx_address: u32,
    /// Address written into outbound packets
    pub tx_address: u32,
    /// Fixed payload width in bytes
    pub payload_width: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            band: Band::Mhz868,
            channel: 117,
            crc: CrcMode::Crc16,
            tx_power: TxPower::Plus10dBm,
            // nRF905 power-on address
            rx_address: 0xE7E7_E7E7,
            tx_address: 0xE7E7_E7E7,
            payload_width: 16,
        }
    }
}

impl RadioConfig {
    /// Same configuration with both addresses set to `address`
    pub fn with_address(mut self, address: u32) -> Self {
        self.rx_address = address;
        self.tx_address = address;
        self
    }
}

/// Half-duplex packet transceiver
///
/// Sending is asynchronous: `start_send` only hands the bytes to the
/// chip, and completion is reported later as
/// [`RadioEvent::TransmitComplete`]. Received payloads are reported as
/// [`RadioEvent::Received`].
pub trait Transceiver {
    /// Error type for driver operations
    type Error;

    /// Apply a full configuration (band, channel, CRC, power, addressing)
    fn configure(&mut self, config: &RadioConfig) -> Result<(), Self::Error>;

    /// Change the rx/tx address without touching the rest
    fn write_address(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Carrier sense: true when nobody else is transmitting
    fn is_airway_free(&mut self) -> bool;

    /// Start transmitting one payload
    fn start_send(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}
