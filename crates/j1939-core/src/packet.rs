//! Raw packets as received from the vehicle bus

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::address::GLOBAL_ADDR;
use crate::pgn::is_pdu1;

/// Default priority for diagnostic messages
pub const DEFAULT_PRIORITY: u8 = 6;

/// A complete (already reassembled) J1939 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Message priority (0-7)
    pub priority: u8,
    /// Parameter group number
    pub pgn: u32,
    /// Transmitting source address
    pub source: u8,
    /// Destination address; `GLOBAL_ADDR` for broadcasts
    pub destination: u8,
    /// Message data
    pub payload: Bytes,
    /// Receive time
    pub timestamp: DateTime<Utc>,
}

impl Packet {
    /// Create a broadcast packet with default priority and an epoch timestamp
    pub fn new(pgn: u32, source: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            pgn,
            source,
            destination: GLOBAL_ADDR,
            payload: payload.into(),
            timestamp: DateTime::<Utc>::default(),
        }
    }

    pub fn with_destination(mut self, destination: u8) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & 0x07;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// 29-bit CAN identifier
    pub fn id(&self) -> u32 {
        let pgn = if is_pdu1(self.pgn) {
            (self.pgn & 0x3FF00) | self.destination as u32
        } else {
            self.pgn & 0x3FFFF
        };
        ((self.priority as u32) << 26) | (pgn << 8) | self.source as u32
    }

    pub fn get_u8(&self, index: usize) -> Option<u8> {
        self.payload.get(index).copied()
    }

    /// Little-endian 16-bit value at `index`
    pub fn get_u16(&self, index: usize) -> Option<u16> {
        let bytes = self.payload.get(index..index + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Little-endian 32-bit value at `index`
    pub fn get_u32(&self, index: usize) -> Option<u32> {
        let bytes = self.payload.get(index..index + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Whether two packets carry the same data, ignoring timing and routing
    pub fn same_data(&self, other: &Packet) -> bool {
        self.pgn == other.pgn && self.source == other.source && self.payload == other.payload
    }
}

impl fmt::Display for Packet {
    /// Renders `HH:MM:SS.ffff 18FECE00 [8] 00 00 14 37 E0 1E E0 1E`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04} {:08X} [{}]",
            self.timestamp.format("%H:%M:%S"),
            self.timestamp.timestamp_subsec_micros() / 100,
            self.id(),
            self.payload.len()
        )?;
        for byte in self.payload.iter() {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}
