//! DM26 - Diagnostic Readiness 3 (current drive cycle)

use super::{require_len, ParsedPacket};
use crate::composite::{CompositeSystem, MonitoredSystem, SystemSet};
use crate::error::DecodeResult;
use crate::packet::Packet;
use crate::pgn;

/// Decoded DM26
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm26 {
    packet: Packet,
    /// Seconds since engine start; `None` when not available
    pub time_since_engine_start: Option<u16>,
    /// `None` when not available
    pub warm_ups_since_clear: Option<u8>,
    /// Monitors enabled for the rest of this cycle
    pub enabled: SystemSet,
    /// Monitors complete this cycle
    pub complete: SystemSet,
}

impl Dm26 {
    pub fn create(
        source: u8,
        time_since_engine_start: u16,
        warm_ups_since_clear: u8,
        enabled: SystemSet,
        complete: SystemSet,
    ) -> Self {
        let mut payload = [0u8; 8];
        payload[..2].copy_from_slice(&time_since_engine_start.to_le_bytes());
        payload[2] = warm_ups_since_clear;
        enabled.write_payload(&mut payload, CompositeSystem::support_bit);
        complete.complement().write_payload(&mut payload, CompositeSystem::status_bit);
        let packet = Packet::new(pgn::DM26, source, payload.to_vec());
        Self {
            packet,
            time_since_engine_start: (time_since_engine_start <= 0xFAFF).then_some(time_since_engine_start),
            warm_ups_since_clear: (warm_ups_since_clear <= 0xFA).then_some(warm_ups_since_clear),
            enabled,
            complete,
        }
    }

    pub fn monitored_systems(&self) -> Vec<MonitoredSystem> {
        CompositeSystem::ALL
            .iter()
            .map(|&system| MonitoredSystem {
                system,
                source: self.packet.source,
                enabled: self.enabled.contains(system),
                complete: self.complete.contains(system),
            })
            .collect()
    }
}

impl ParsedPacket for Dm26 {
    const PGN: u32 = pgn::DM26;
    const NAME: &'static str = "DM26";

    fn parse(packet: Packet) -> DecodeResult<Self> {
        require_len(&packet, 8)?;
        let payload = &packet.payload;
        let time = u16::from_le_bytes([payload[0], payload[1]]);
        let warm_ups = payload[2];
        let enabled = SystemSet::from_payload(payload, CompositeSystem::support_bit);
        let complete = SystemSet::from_payload(payload, CompositeSystem::status_bit).complement();
        Ok(Self {
            time_since_engine_start: (time <= 0xFAFF).then_some(time),
            warm_ups_since_clear: (warm_ups <= 0xFA).then_some(warm_ups),
            enabled,
            complete,
            packet,
        })
    }

    fn packet(&self) -> &Packet {
        &self.packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let payload = vec![0x3C, 0x00, 0x02, 0x07, 0x01, 0x00, 0x01, 0x00];
        let dm26 = Dm26::from_packet(Packet::new(pgn::DM26, 0, payload)).unwrap();

        assert_eq!(dm26.time_since_engine_start, Some(60));
        assert_eq!(dm26.warm_ups_since_clear, Some(2));
        assert!(dm26.enabled.contains(CompositeSystem::Misfire));
        assert!(dm26.enabled.contains(CompositeSystem::FuelSystem));
        assert!(dm26.enabled.contains(CompositeSystem::ComprehensiveComponent));
        assert!(dm26.enabled.contains(CompositeSystem::Catalyst));
        assert_eq!(dm26.enabled.len(), 4);
        assert!(dm26.complete.contains(CompositeSystem::Misfire));
        assert!(!dm26.complete.contains(CompositeSystem::Catalyst));
    }

    #[test]
    fn test_not_available_fields() {
        let payload = vec![0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00];
        let dm26 = Dm26::from_packet(Packet::new(pgn::DM26, 0, payload)).unwrap();
        assert_eq!(dm26.time_since_engine_start, None);
        assert_eq!(dm26.warm_ups_since_clear, None);
    }

    #[test]
    fn test_create() {
        let enabled = SystemSet::EMPTY.with(CompositeSystem::EgrVvtSystem);
        let dm26 = Dm26::create(0, 120, 0, enabled, SystemSet::EMPTY);
        let parsed = Dm26::from_packet(dm26.packet().clone()).unwrap();
        assert_eq!(parsed, dm26);
    }
}
