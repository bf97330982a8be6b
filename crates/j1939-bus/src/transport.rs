//! Exchange transport trait
//!
//! Abstracts the bus: a production implementation drives a CAN interface, the
//! [`crate::mock::MockExchangeTransport`] replays scripted traffic. Every
//! exchange returns a lazily produced, finite packet stream; consumers may stop
//! pulling at any point.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use j1939_core::{pgn, Packet};

/// Lazily produced packets of one exchange or capture window
pub type PacketStream = BoxStream<'static, Packet>;

/// Transport-agnostic interface for J1939 exchanges
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    /// Request `pgn` from every module; yields all responses (including acknowledgments)
    async fn global_request(&self, pgn: u32) -> PacketStream;

    /// Request `pgn` from one module; an empty stream means no response
    async fn ds_request(&self, pgn: u32, address: u8, progress_label: &str) -> PacketStream;

    /// Passively capture bus traffic for `duration`
    async fn read_bus(&self, duration: Duration, section: &str) -> PacketStream;

    /// Another transmitter has been seen using the tool's source address
    fn imposter_detected(&self) -> bool;
}

/// Build the Request (PGN 59904) packet for `requested` sent to `destination`
pub fn request_packet(requested: u32, destination: u8, tool_address: u8) -> Packet {
    let bytes = requested.to_le_bytes();
    Packet::new(pgn::REQUEST, tool_address, vec![bytes[0], bytes[1], bytes[2]]).with_destination(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use j1939_core::{GLOBAL_ADDR, TOOL_ADDR};

    #[test]
    fn test_request_packet() {
        let packet = request_packet(pgn::DM5, GLOBAL_ADDR, TOOL_ADDR);
        assert_eq!(&packet.payload[..], &[0xCE, 0xFE, 0x00]);
        assert_eq!(packet.id(), 0x18EAFFF9);

        let packet = request_packet(pgn::DM26, 0x00, TOOL_ADDR);
        assert_eq!(packet.id(), 0x18EA00F9);
    }
}
