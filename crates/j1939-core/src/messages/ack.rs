//! Acknowledgment (PGN 59392)

use std::fmt;

use super::{require_len, ParsedPacket};
use crate::address::TOOL_ADDR;
use crate::error::DecodeResult;
use crate::packet::Packet;
use crate::pgn;

/// Acknowledgment control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckControl {
    Ack,
    Nack,
    AccessDenied,
    CannotRespond,
    /// Reserved control value
    Unknown(u8),
}

impl From<u8> for AckControl {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ack,
            1 => Self::Nack,
            2 => Self::AccessDenied,
            3 => Self::CannotRespond,
            other => Self::Unknown(other),
        }
    }
}

impl From<AckControl> for u8 {
    fn from(control: AckControl) -> u8 {
        match control {
            AckControl::Ack => 0,
            AckControl::Nack => 1,
            AckControl::AccessDenied => 2,
            AckControl::CannotRespond => 3,
            AckControl::Unknown(v) => v,
        }
    }
}

impl fmt::Display for AckControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckControl::Ack => write!(f, "ACK"),
            AckControl::Nack => write!(f, "NACK"),
            AckControl::AccessDenied => write!(f, "Access Denied"),
            AckControl::CannotRespond => write!(f, "Cannot Respond"),
            AckControl::Unknown(v) => write!(f, "Unknown ({})", v),
        }
    }
}

/// Decoded acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    packet: Packet,
    pub control: AckControl,
    pub group_function: u8,
    /// Address the acknowledgment is directed to
    pub address: u8,
    /// PGN being acknowledged
    pub acknowledged_pgn: u32,
}

impl Acknowledgment {
    pub fn create(source: u8, control: AckControl, acknowledged_pgn: u32, address: u8) -> Self {
        let pgn_bytes = acknowledged_pgn.to_le_bytes();
        let payload = vec![
            control.into(),
            0xFF,
            0xFF,
            0xFF,
            address,
            pgn_bytes[0],
            pgn_bytes[1],
            pgn_bytes[2],
        ];
        Self {
            packet: Packet::new(pgn::ACKNOWLEDGMENT, source, payload),
            control,
            group_function: 0xFF,
            address,
            acknowledged_pgn,
        }
    }

    /// NACK from `source` to the tool for `acknowledged_pgn`
    pub fn create_nack(source: u8, acknowledged_pgn: u32) -> Self {
        Self::create(source, AckControl::Nack, acknowledged_pgn, TOOL_ADDR)
    }

    pub fn is_nack(&self) -> bool {
        self.control == AckControl::Nack
    }
}

impl fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acknowledgment from {}: Response: {}, Group Function: {}, Address Acknowledged: {}, PGN Requested: {}",
            crate::address::module_name(self.packet.source),
            self.control,
            self.group_function,
            self.address,
            self.acknowledged_pgn
        )
    }
}

impl ParsedPacket for Acknowledgment {
    const PGN: u32 = pgn::ACKNOWLEDGMENT;
    const NAME: &'static str = "Acknowledgment";

    fn parse(packet: Packet) -> DecodeResult<Self> {
        require_len(&packet, 8)?;
        let payload = &packet.payload;
        let acknowledged_pgn = u32::from_le_bytes([payload[5], payload[6], payload[7], 0]);
        Ok(Self {
            control: AckControl::from(payload[0]),
            group_function: payload[1],
            address: payload[4],
            acknowledged_pgn,
            packet,
        })
    }

    fn packet(&self) -> &Packet {
        &self.packet
    }
}
