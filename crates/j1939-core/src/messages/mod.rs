//! Typed diagnostic messages decoded from raw packets
//!
//! Contract: `decode(pgn, source, payload) -> message | DecodeError`. Each
//! message keeps the packet it was decoded from so reports can print it.

mod ack;
mod dm24;
mod dm26;
mod dm5;

pub use ack::{AckControl, Acknowledgment};
pub use dm24::{Dm24, SupportedSpn};
pub use dm26::Dm26;
pub use dm5::Dm5;

use crate::error::{DecodeError, DecodeResult};
use crate::packet::Packet;
use crate::pgn;

/// A message type that can be decoded from a raw packet
pub trait ParsedPacket: Sized + Clone + Send + Sync + 'static {
    /// PGN this type decodes
    const PGN: u32;

    /// Short name used in progress messages and reports ("DM5")
    const NAME: &'static str;

    /// Decode the packet payload; the PGN has already been checked
    fn parse(packet: Packet) -> DecodeResult<Self>;

    /// The packet this message was decoded from
    fn packet(&self) -> &Packet;

    /// Check the PGN, then decode
    fn from_packet(packet: Packet) -> DecodeResult<Self> {
        if packet.pgn != Self::PGN {
            return Err(DecodeError::UnexpectedPgn {
                expected: Self::PGN,
                actual: packet.pgn,
            });
        }
        Self::parse(packet)
    }

    fn source(&self) -> u8 {
        self.packet().source
    }
}

/// Fail with `Truncated` unless the payload holds at least `expected` bytes
pub(crate) fn require_len(packet: &Packet, expected: usize) -> DecodeResult<()> {
    if packet.len() < expected {
        Err(DecodeError::Truncated {
            pgn: packet.pgn,
            expected,
            actual: packet.len(),
        })
    } else {
        Ok(())
    }
}

/// Any diagnostic message this crate knows how to decode
#[derive(Debug, Clone)]
pub enum DiagnosticMessage {
    Dm5(Dm5),
    Dm24(Dm24),
    Dm26(Dm26),
    Acknowledgment(Acknowledgment),
}

impl DiagnosticMessage {
    /// Decode a packet by dispatching on its PGN
    pub fn decode(packet: Packet) -> DecodeResult<Self> {
        match packet.pgn {
            pgn::DM5 => Dm5::parse(packet).map(DiagnosticMessage::Dm5),
            pgn::DM24 => Dm24::parse(packet).map(DiagnosticMessage::Dm24),
            pgn::DM26 => Dm26::parse(packet).map(DiagnosticMessage::Dm26),
            pgn::ACKNOWLEDGMENT => Acknowledgment::parse(packet).map(DiagnosticMessage::Acknowledgment),
            other => Err(DecodeError::UnsupportedPgn(other)),
        }
    }

    /// Convenience wrapper taking the pieces of a packet separately
    pub fn decode_parts(pgn: u32, source: u8, payload: &[u8]) -> DecodeResult<Self> {
        Self::decode(Packet::new(pgn, source, payload.to_vec()))
    }

    pub fn packet(&self) -> &Packet {
        match self {
            DiagnosticMessage::Dm5(m) => m.packet(),
            DiagnosticMessage::Dm24(m) => m.packet(),
            DiagnosticMessage::Dm26(m) => m.packet(),
            DiagnosticMessage::Acknowledgment(m) => m.packet(),
        }
    }
}
