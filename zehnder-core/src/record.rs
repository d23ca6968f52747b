//! Pairing record
//!
//! The identity learned during a join. A record is either complete or
//! absent; any zero field makes the whole record invalid.

use serde::{Deserialize, Serialize};
use zehnder_protocol::{Frame, Header, Payload};

/// Network binding between this controller and one main unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingRecord {
    pub network_id: u32,
    pub local_device_type: u8,
    pub local_device_id: u8,
    pub peer_device_type: u8,
    pub peer_device_id: u8,
}

impl PairingRecord {
    /// Create a record, rejecting any zero field
    pub fn new(
        network_id: u32,
        local_device_type: u8,
        local_device_id: u8,
        peer_device_type: u8,
        peer_device_id: u8,
    ) -> Option<Self> {
        let record = Self {
            network_id,
            local_device_type,
            local_device_id,
            peer_device_type,
            peer_device_id,
        };
        record.is_valid().then_some(record)
    }

    /// Check that every field is set
    pub fn is_valid(&self) -> bool {
        self.network_id != 0
            && self.local_device_type != 0
            && self.local_device_id != 0
            && self.peer_device_type != 0
            && self.peer_device_id != 0
    }

    /// Header for a frame from us to the peer
    pub fn header_to_peer(&self, ttl: u8) -> Header {
        Header::new(
            self.peer_device_type,
            self.peer_device_id,
            self.local_device_type,
            self.local_device_id,
        )
        .with_ttl(ttl)
    }

    /// Frame from us to the peer
    pub fn frame_to_peer(&self, payload: Payload, ttl: u8) -> Frame {
        Frame::new(self.header_to_peer(ttl), payload)
    }

    /// Check that a header routes from the peer to us
    pub fn routes_to_us(&self, header: &Header) -> bool {
        header.is_addressed_to(self.local_device_type, self.local_device_id)
            && header.is_from(self.peer_device_type, self.peer_device_id)
    }
}
