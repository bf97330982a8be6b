//! DM24 - SPN Support

use serde::{Deserialize, Serialize};

use super::{require_len, ParsedPacket};
use crate::error::{DecodeError, DecodeResult};
use crate::packet::Packet;
use crate::pgn;

const RECORD_LEN: usize = 4;

/// One SPN declared by a module, and the contexts it may be reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedSpn {
    pub spn: u32,
    /// Reported in the data stream (broadcast or on request)
    pub data_stream: bool,
    /// Reported in DM25 expanded freeze frames
    pub freeze_frame: bool,
    /// Reported in DM30 scaled test results
    pub scaled_test_results: bool,
    /// Data length in bytes
    pub length: u8,
}

impl SupportedSpn {
    pub fn new(spn: u32, data_stream: bool, freeze_frame: bool, scaled_test_results: bool, length: u8) -> Self {
        Self {
            spn,
            data_stream,
            freeze_frame,
            scaled_test_results,
            length,
        }
    }

    /// Supported in the data stream only
    pub fn data_stream(spn: u32, length: u8) -> Self {
        Self::new(spn, true, false, false, length)
    }

    fn from_record(record: &[u8]) -> Self {
        let spn = record[0] as u32 | (record[1] as u32) << 8 | ((record[2] as u32 >> 5) & 0x07) << 16;
        // flags are active-low
        Self {
            spn,
            scaled_test_results: record[2] & 0x01 == 0,
            data_stream: record[2] & 0x02 == 0,
            freeze_frame: record[2] & 0x04 == 0,
            length: record[3],
        }
    }

    /// Encode as a 4-byte DM24 record
    pub fn to_bytes(self) -> [u8; 4] {
        let mut flags = 0x18 | (((self.spn >> 16) & 0x07) as u8) << 5;
        if !self.scaled_test_results {
            flags |= 0x01;
        }
        if !self.data_stream {
            flags |= 0x02;
        }
        if !self.freeze_frame {
            flags |= 0x04;
        }
        [self.spn as u8, (self.spn >> 8) as u8, flags, self.length]
    }
}

/// Decoded DM24
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm24 {
    packet: Packet,
    pub supported_spns: Vec<SupportedSpn>,
}

impl Dm24 {
    pub fn create(source: u8, spns: &[SupportedSpn]) -> Self {
        let payload: Vec<u8> = spns.iter().flat_map(|s| s.to_bytes()).collect();
        Self {
            packet: Packet::new(pgn::DM24, source, payload),
            supported_spns: spns.to_vec(),
        }
    }

    /// SPNs supported in the data stream
    pub fn data_stream_spns(&self) -> impl Iterator<Item = &SupportedSpn> {
        self.supported_spns.iter().filter(|s| s.data_stream)
    }
}

impl ParsedPacket for Dm24 {
    const PGN: u32 = pgn::DM24;
    const NAME: &'static str = "DM24";

    fn parse(packet: Packet) -> DecodeResult<Self> {
        require_len(&packet, RECORD_LEN)?;
        let len = packet.len();
        if len % RECORD_LEN != 0 {
            return Err(DecodeError::Truncated {
                pgn: packet.pgn,
                expected: len.next_multiple_of(RECORD_LEN),
                actual: len,
            });
        }
        let supported_spns = packet
            .payload
            .chunks_exact(RECORD_LEN)
            // single-frame DM24s are padded with 0xFF
            .filter(|record| record.iter().any(|&b| b != 0xFF))
            .map(SupportedSpn::from_record)
            .collect();
        Ok(Self {
            packet,
            supported_spns,
        })
    }

    fn packet(&self) -> &Packet {
        &self.packet
    }
}
