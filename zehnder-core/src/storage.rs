//! Persistence of the pairing record and configuration
//!
//! The engine only needs [`PairingStore`]. [`KvPairingStore`] implements
//! it on top of any [`KeyValueStorage`] using postcard encoding.

use serde::de::DeserializeOwned;
use serde::Serialize;
use zehnder_hal::{KeyValueStorage, StorageError, StorageKey};

use crate::config::EngineConfig;
use crate::record::PairingRecord;

/// Maximum serialized pairing record size
const MAX_RECORD_SIZE: usize = 16;

/// Maximum serialized config size
const MAX_CONFIG_SIZE: usize = 96;

/// Persistence collaborator for the learned pairing
pub trait PairingStore {
    /// Load the stored record, `Ok(None)` when nothing was stored
    fn load(&mut self) -> Result<Option<PairingRecord>, StorageError>;

    /// Store a record, replacing any previous one
    fn save(&mut self, record: &PairingRecord) -> Result<(), StorageError>;

    /// Erase the stored record; erasing nothing is not an error
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Pairing store backed by key-value storage
pub struct KvPairingStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> KvPairingStore<S> {
    /// Create a new store
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S: KeyValueStorage> PairingStore for KvPairingStore<S> {
    fn load(&mut self) -> Result<Option<PairingRecord>, StorageError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        load_value(&mut self.storage, StorageKey::PairingRecord, &mut buffer)
    }

    fn save(&mut self, record: &PairingRecord) -> Result<(), StorageError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        save_value(&mut self.storage, StorageKey::PairingRecord, record, &mut buffer)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.remove(StorageKey::PairingRecord)
    }
}

/// Load persisted engine configuration
///
/// Returns `Ok(None)` when nothing is stored. A stored configuration that
/// fails validation is reported as `Corrupted`.
pub fn load_config<S: KeyValueStorage>(storage: &mut S) -> Result<Option<EngineConfig>, StorageError> {
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    let config: Option<EngineConfig> = load_value(storage, StorageKey::EngineConfig, &mut buffer)?;
    match config {
        Some(config) if config.validate().is_err() => Err(StorageError::Corrupted),
        other => Ok(other),
    }
}

/// Persist engine configuration
pub fn save_config<S: KeyValueStorage>(storage: &mut S, config: &EngineConfig) -> Result<(), StorageError> {
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    save_value(storage, StorageKey::EngineConfig, config, &mut buffer)
}

fn load_value<S: KeyValueStorage, T: DeserializeOwned>(
    storage: &mut S,
    key: StorageKey,
    buffer: &mut [u8],
) -> Result<Option<T>, StorageError> {
    let len = match storage.read(key, buffer) {
        Ok(len) => len,
        Err(StorageError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    postcard::from_bytes(&buffer[..len])
        .map(Some)
        .map_err(|_| StorageError::Corrupted)
}

fn save_value<S: KeyValueStorage, T: Serialize>(
    storage: &mut S,
    key: StorageKey,
    value: &T,
    buffer: &mut [u8],
) -> Result<(), StorageError> {
    let used = postcard::to_slice(value, buffer).map_err(|_| StorageError::BufferTooSmall)?;
    storage.write(key, used)
}
