//! Reassembly of multi-frame messages
//!
//! Wide arrays arrive as a connection announcement (TP.CM, BAM or RTS) followed
//! by numbered TP.DT frames, each carrying a sequence number and seven data
//! bytes. A frame that never arrives leaves its bytes as 0xFF, so every slot
//! overlapping it decodes as not available instead of failing the message.

use std::collections::BTreeMap;
use std::ops::Range;

use j1939_core::Packet;
use tracing::warn;

use crate::error::{ConvError, ConvResult};

/// Data bytes carried by one TP.DT frame
pub const FRAME_DATA_LEN: usize = 7;

const CM_RTS: u8 = 0x10;
const CM_BAM: u8 = 0x20;

/// Frames collected for one multi-frame message
#[derive(Debug, Clone)]
pub struct FrameSet {
    pgn: u32,
    source: u8,
    total_len: usize,
    frames: BTreeMap<u8, [u8; FRAME_DATA_LEN]>,
}

impl FrameSet {
    pub fn new(pgn: u32, source: u8, total_len: usize) -> Self {
        Self {
            pgn,
            source,
            total_len,
            frames: BTreeMap::new(),
        }
    }

    /// Start from a TP.CM announcement (BAM or RTS)
    pub fn from_announcement(source: u8, cm: &[u8]) -> ConvResult<Self> {
        if cm.len() < 8 || !matches!(cm[0], CM_RTS | CM_BAM) {
            return Err(ConvError::InvalidFrame(format!(
                "not a connection announcement: {:02X?}",
                cm
            )));
        }
        let total_len = u16::from_le_bytes([cm[1], cm[2]]) as usize;
        let pgn = u32::from_le_bytes([cm[5], cm[6], cm[7], 0]);
        Ok(Self::new(pgn, source, total_len))
    }

    pub fn pgn(&self) -> u32 {
        self.pgn
    }

    /// Number of TP.DT frames the message needs
    pub fn expected_frames(&self) -> usize {
        self.total_len.div_ceil(FRAME_DATA_LEN)
    }

    /// Add one TP.DT frame: sequence number followed by up to seven bytes
    pub fn add_frame(&mut self, frame: &[u8]) -> ConvResult<()> {
        let (&seq, data) = frame
            .split_first()
            .ok_or_else(|| ConvError::InvalidFrame("empty frame".to_string()))?;
        if seq == 0 || seq as usize > self.expected_frames() {
            return Err(ConvError::InvalidFrame(format!(
                "sequence {} outside 1..={} for PGN {}",
                seq,
                self.expected_frames(),
                self.pgn
            )));
        }
        let mut bytes = [0xFF; FRAME_DATA_LEN];
        let n = data.len().min(FRAME_DATA_LEN);
        bytes[..n].copy_from_slice(&data[..n]);
        self.frames.insert(seq, bytes);
        Ok(())
    }

    /// Sequence numbers not yet received
    pub fn missing_frames(&self) -> Vec<u8> {
        (1..=self.expected_frames())
            .filter_map(|seq| u8::try_from(seq).ok())
            .filter(|seq| !self.frames.contains_key(seq))
            .collect()
    }

    /// Payload byte ranges covered by missing frames
    pub fn missing_ranges(&self) -> Vec<Range<usize>> {
        self.missing_frames()
            .into_iter()
            .map(|seq| {
                let start = (seq as usize - 1) * FRAME_DATA_LEN;
                start..(start + FRAME_DATA_LEN).min(self.total_len)
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.frames.len() == self.expected_frames()
    }

    /// Assemble the payload, filling missing frames with 0xFF
    pub fn assemble(&self) -> Packet {
        let missing = self.missing_frames();
        if !missing.is_empty() {
            warn!(pgn = self.pgn, source = self.source, ?missing, "Assembling with missing frames");
        }

        let mut payload = vec![0xFF; self.expected_frames() * FRAME_DATA_LEN];
        for (&seq, bytes) in &self.frames {
            let start = (seq as usize - 1) * FRAME_DATA_LEN;
            payload[start..start + FRAME_DATA_LEN].copy_from_slice(bytes);
        }
        payload.truncate(self.total_len);
        Packet::new(self.pgn, self.source, payload)
    }
}
