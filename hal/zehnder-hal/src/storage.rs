//! Persistent storage abstractions
//!
//! Provides a small key-value interface that board code implements on
//! top of flash, NVS or a file.

/// Storage keys for persisted data
///
/// These keys identify the records stored by the engine. The actual
/// storage implementation handles wear leveling and data integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Learned pairing record (binary postcard format)
    PairingRecord = 0,
    /// Engine configuration overrides (binary postcard format)
    EngineConfig = 1,
}

impl StorageKey {
    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::PairingRecord),
            1 => Some(StorageKey::EngineConfig),
            _ => None,
        }
    }
}

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Underlying medium failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Key-value storage trait
///
/// Implementations should handle:
/// - Wear leveling across flash sectors
/// - Data integrity (CRC or similar)
/// - Atomic replacement of a key's value where possible
pub trait KeyValueStorage {
    /// Read a value by key into the provided buffer
    ///
    /// Returns the number of bytes read.
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError>;

    /// Write (or replace) a value by key
    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&mut self, key: StorageKey) -> Result<(), StorageError>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: StorageKey) -> bool {
        let mut probe = [0u8; 0];
        !matches!(self.read(key, &mut probe), Err(StorageError::NotFound))
    }
}
