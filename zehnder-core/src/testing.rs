//! Test doubles shared by the unit tests

use std::collections::BTreeMap;
use std::vec::Vec;

use zehnder_hal::{KeyValueStorage, RadioConfig, RadioEvent, StorageError, StorageKey, Transceiver};
use zehnder_protocol::{Frame, Header, Payload, FRAME_SIZE};

use crate::record::PairingRecord;
use crate::storage::PairingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockRadioError;

/// Transceiver that records every frame handed to it
pub struct MockRadio {
    pub sent: Vec<[u8; FRAME_SIZE]>,
    pub airway_free: bool,
    pub fail_send: bool,
    pub fail_configure: bool,
    pub fail_address: bool,
    pub config: Option<RadioConfig>,
    pub address: Option<u32>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            airway_free: true,
            fail_send: false,
            fail_configure: false,
            fail_address: false,
            config: None,
            address: None,
        }
    }
}

impl MockRadio {
    /// Decode the n-th sent frame
    pub fn frame(&self, index: usize) -> Frame {
        Frame::decode(&self.sent[index]).unwrap()
    }

    /// Decode the most recently sent frame
    pub fn last_frame(&self) -> Frame {
        self.frame(self.sent.len() - 1)
    }

    /// All sent frames, decoded
    pub fn frames(&self) -> Vec<Frame> {
        self.sent.iter().map(|b| Frame::decode(b).unwrap()).collect()
    }
}

impl Transceiver for MockRadio {
    type Error = MockRadioError;

    fn configure(&mut self, config: &RadioConfig) -> Result<(), Self::Error> {
        if self.fail_configure {
            return Err(MockRadioError);
        }
        self.config = Some(*config);
        self.address = Some(config.rx_address);
        Ok(())
    }

    fn write_address(&mut self, address: u32) -> Result<(), Self::Error> {
        if self.fail_address {
            return Err(MockRadioError);
        }
        self.address = Some(address);
        Ok(())
    }

    fn is_airway_free(&mut self) -> bool {
        self.airway_free
    }

    fn start_send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err(MockRadioError);
        }
        self.sent.push(data.try_into().map_err(|_| MockRadioError)?);
        Ok(())
    }
}

/// In-memory key-value storage
#[derive(Default)]
pub struct MemStorage {
    pub values: BTreeMap<u8, Vec<u8>>,
    pub fail_reads: bool,
}

impl KeyValueStorage for MemStorage {
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Storage);
        }
        let value = self.values.get(&key.as_u8()).ok_or(StorageError::NotFound)?;
        if buffer.len() < value.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buffer[..value.len()].copy_from_slice(value);
        Ok(value.len())
    }

    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError> {
        self.values.insert(key.as_u8(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: StorageKey) -> Result<(), StorageError> {
        self.values.remove(&key.as_u8());
        Ok(())
    }
}

/// Pairing store with injectable failures
#[derive(Default)]
pub struct MemPairingStore {
    pub record: Option<PairingRecord>,
    pub load_error: Option<StorageError>,
    pub clear_error: Option<StorageError>,
    pub saves: usize,
}

impl PairingStore for MemPairingStore {
    fn load(&mut self) -> Result<Option<PairingRecord>, StorageError> {
        match self.load_error {
            Some(e) => Err(e),
            None => Ok(self.record),
        }
    }

    fn save(&mut self, record: &PairingRecord) -> Result<(), StorageError> {
        self.record = Some(*record);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        if let Some(e) = self.clear_error {
            return Err(e);
        }
        self.record = None;
        Ok(())
    }
}

/// Frame from `src` to `dest` as the radio would deliver it
pub fn rx(dest: (u8, u8), src: (u8, u8), payload: Payload) -> RadioEvent {
    let frame = Frame::new(Header::new(dest.0, dest.1, src.0, src.1), payload);
    RadioEvent::received(&frame.encode())
}
