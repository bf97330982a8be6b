//! DM5 - Diagnostic Readiness 1

use super::{require_len, ParsedPacket};
use crate::composite::{CompositeSystem, SystemSet};
use crate::error::DecodeResult;
use crate::packet::Packet;
use crate::pgn;

/// OBD compliance value meaning "not intended to meet OBD requirements"
pub const NOT_OBD_COMPLIANT: u8 = 5;

/// Decoded DM5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm5 {
    packet: Packet,
    pub active_count: u8,
    pub previously_active_count: u8,
    pub obd_compliance: u8,
    pub supported: SystemSet,
    /// Systems whose status bit reads "complete"
    pub complete: SystemSet,
}

impl Dm5 {
    /// Build a DM5 from field values
    pub fn create(
        source: u8,
        active_count: u8,
        previously_active_count: u8,
        obd_compliance: u8,
        supported: SystemSet,
        complete: SystemSet,
    ) -> Self {
        let mut payload = [0u8; 8];
        payload[0] = active_count;
        payload[1] = previously_active_count;
        payload[2] = obd_compliance;
        supported.write_payload(&mut payload, CompositeSystem::support_bit);
        complete.complement().write_payload(&mut payload, CompositeSystem::status_bit);
        Self {
            packet: Packet::new(pgn::DM5, source, payload.to_vec()),
            active_count,
            previously_active_count,
            obd_compliance,
            supported,
            complete,
        }
    }

    /// Whether the compliance byte claims any OBD standard
    pub fn is_obd(&self) -> bool {
        !matches!(self.obd_compliance, 0 | NOT_OBD_COMPLIANT | 0xFB..=0xFF)
    }
}

impl ParsedPacket for Dm5 {
    const PGN: u32 = pgn::DM5;
    const NAME: &'static str = "DM5";

    fn parse(packet: Packet) -> DecodeResult<Self> {
        require_len(&packet, 8)?;
        let payload = &packet.payload;
        let supported = SystemSet::from_payload(payload, CompositeSystem::support_bit);
        // status bit 0 = complete
        let complete = SystemSet::from_payload(payload, CompositeSystem::status_bit).complement();
        Ok(Self {
            active_count: payload[0],
            previously_active_count: payload[1],
            obd_compliance: payload[2],
            supported,
            complete,
            packet,
        })
    }

    fn packet(&self) -> &Packet {
        &self.packet
    }
}
