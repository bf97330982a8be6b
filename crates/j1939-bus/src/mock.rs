//! Mock exchange transport for testing
//!
//! Replays scripted responses: global responses per PGN, destination-specific
//! responses per (PGN, address) and a fixed broadcast capture. Unscripted
//! requests yield an empty stream, i.e. no response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use j1939_core::{Packet, GLOBAL_ADDR, TOOL_ADDR};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::{request_packet, ExchangeTransport, PacketStream};

/// Kind of exchange the mock was asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Global,
    DestinationSpecific { address: u8, label: String },
    ReadBus { duration: Duration, section: String },
}

/// One exchange made against the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub kind: RequestKind,
    /// Request packet that would have been transmitted (none for captures)
    pub request: Option<Packet>,
}

impl RequestRecord {
    pub fn pgn(&self) -> Option<u32> {
        let payload = &self.request.as_ref()?.payload;
        match payload.get(..3)? {
            [b0, b1, b2] => Some(u32::from_le_bytes([*b0, *b1, *b2, 0])),
            _ => None,
        }
    }
}

/// Cancel a token once a capture has yielded a number of packets
#[derive(Debug, Clone)]
struct CancelTrigger {
    after: usize,
    token: CancellationToken,
}

/// Scripted transport
pub struct MockExchangeTransport {
    global: RwLock<HashMap<u32, Vec<Packet>>>,
    ds: RwLock<HashMap<(u32, u8), Vec<Packet>>>,
    broadcast: RwLock<Vec<Packet>>,
    imposter: AtomicBool,
    cancel_trigger: RwLock<Option<CancelTrigger>>,
    ds_cancel: RwLock<Option<(u32, u8, CancellationToken)>>,
    log: RwLock<Vec<RequestRecord>>,
}

impl Default for MockExchangeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchangeTransport {
    pub fn new() -> Self {
        Self {
            global: RwLock::new(HashMap::new()),
            ds: RwLock::new(HashMap::new()),
            broadcast: RwLock::new(Vec::new()),
            imposter: AtomicBool::new(false),
            cancel_trigger: RwLock::new(None),
            ds_cancel: RwLock::new(None),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Responses to a global request for `pgn` (appended to any already scripted)
    pub fn add_global_response(&self, pgn: u32, packets: impl IntoIterator<Item = Packet>) {
        self.global.write().entry(pgn).or_default().extend(packets);
    }

    /// Responses to a DS request for `pgn` sent to `address`
    pub fn add_ds_response(&self, pgn: u32, address: u8, packets: impl IntoIterator<Item = Packet>) {
        let packets = packets.into_iter().map(|p| p.with_destination(TOOL_ADDR));
        self.ds.write().entry((pgn, address)).or_default().extend(packets);
    }

    /// Traffic yielded by every `read_bus` call
    pub fn set_broadcast(&self, packets: Vec<Packet>) {
        *self.broadcast.write() = packets;
    }

    pub fn set_imposter(&self, detected: bool) {
        self.imposter.store(detected, Ordering::SeqCst);
    }

    /// Cancel `token` from inside the capture once `after` packets were yielded
    pub fn cancel_capture_after(&self, after: usize, token: CancellationToken) {
        *self.cancel_trigger.write() = Some(CancelTrigger { after, token });
    }

    /// Cancel `token` as soon as a DS request for `pgn` is sent to `address`
    pub fn cancel_ds_at(&self, pgn: u32, address: u8, token: CancellationToken) {
        *self.ds_cancel.write() = Some((pgn, address, token));
    }

    /// Exchanges made so far
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.log.read().clone()
    }

    fn record(&self, kind: RequestKind, request: Option<Packet>) {
        self.log.write().push(RequestRecord { kind, request });
    }

    fn replay(&self, packets: Vec<Packet>, trigger: Option<CancelTrigger>) -> PacketStream {
        Box::pin(stream! {
            for (i, packet) in packets.into_iter().enumerate() {
                if let Some(trigger) = &trigger {
                    if i == trigger.after {
                        debug!(yielded = i, "Mock transport: cancelling capture");
                        trigger.token.cancel();
                    }
                }
                yield packet;
            }
        })
    }
}

#[async_trait]
impl ExchangeTransport for MockExchangeTransport {
    async fn global_request(&self, pgn: u32) -> PacketStream {
        self.record(RequestKind::Global, Some(request_packet(pgn, GLOBAL_ADDR, TOOL_ADDR)));
        let packets = self.global.read().get(&pgn).cloned().unwrap_or_default();
        debug!(pgn, responses = packets.len(), "Mock transport: global request");
        self.replay(packets, None)
    }

    async fn ds_request(&self, pgn: u32, address: u8, progress_label: &str) -> PacketStream {
        self.record(
            RequestKind::DestinationSpecific {
                address,
                label: progress_label.to_string(),
            },
            Some(request_packet(pgn, address, TOOL_ADDR)),
        );
        if let Some((_, _, token)) = self.ds_cancel.read().as_ref().filter(|(p, a, _)| *p == pgn && *a == address) {
            debug!(pgn, address, "Mock transport: cancelling at DS request");
            token.cancel();
        }
        let packets = self.ds.read().get(&(pgn, address)).cloned().unwrap_or_default();
        debug!(pgn, address, responses = packets.len(), "Mock transport: DS request");
        self.replay(packets, None)
    }

    async fn read_bus(&self, duration: Duration, section: &str) -> PacketStream {
        self.record(
            RequestKind::ReadBus {
                duration,
                section: section.to_string(),
            },
            None,
        );
        let packets = self.broadcast.read().clone();
        let trigger = self.cancel_trigger.read().clone();
        self.replay(packets, trigger)
    }

    fn imposter_detected(&self) -> bool {
        self.imposter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use j1939_core::pgn;

    fn dm5(source: u8) -> Packet {
        Packet::new(pgn::DM5, source, vec![0, 0, 0x14, 0, 0, 0, 0, 0])
    }

    #[tokio::test]
    async fn test_scripted_global_response() {
        let mock = MockExchangeTransport::new();
        mock.add_global_response(pgn::DM5, [dm5(0x00), dm5(0x17)]);

        let packets: Vec<Packet> = mock.global_request(pgn::DM5).await.collect().await;
        assert_eq!(packets.len(), 2);

        let requests = mock.requests();
        assert_eq!(requests[0].kind, RequestKind::Global);
        assert_eq!(requests[0].pgn(), Some(pgn::DM5));
    }

    #[tokio::test]
    async fn test_unscripted_request_is_silent() {
        let mock = MockExchangeTransport::new();
        let packets: Vec<Packet> = mock.ds_request(pgn::DM26, 0x00, "Requesting DM26").await.collect().await;
        assert!(packets.is_empty());
    }

    #[tokio::test]
    async fn test_ds_responses_are_addressed_to_tool() {
        let mock = MockExchangeTransport::new();
        mock.add_ds_response(pgn::DM5, 0x00, [dm5(0x00)]);
        let packets: Vec<Packet> = mock.ds_request(pgn::DM5, 0x00, "").await.collect().await;
        assert_eq!(packets[0].destination, TOOL_ADDR);
    }

    #[test]
    fn test_cancel_trigger() {
        let mock = MockExchangeTransport::new();
        mock.set_broadcast(vec![dm5(0), dm5(1), dm5(2)]);
        let token = CancellationToken::new();
        mock.cancel_capture_after(2, token.clone());

        tokio_test::block_on(async {
            let mut stream = mock.read_bus(Duration::from_secs(1), "6.1.26.1").await;
            assert!(stream.next().await.is_some());
            assert!(stream.next().await.is_some());
            assert!(!token.is_cancelled());
            assert!(stream.next().await.is_some());
            assert!(token.is_cancelled());
        });
    }

    #[tokio::test]
    async fn test_ds_cancel_point() {
        let mock = MockExchangeTransport::new();
        mock.add_ds_response(pgn::DM5, 0x01, [dm5(0x01)]);
        let token = CancellationToken::new();
        mock.cancel_ds_at(pgn::DM5, 0x01, token.clone());

        let _ = mock.ds_request(pgn::DM5, 0x00, "").await;
        let _ = mock.ds_request(pgn::DM26, 0x01, "").await;
        assert!(!token.is_cancelled());

        // the scripted answer is still replayed, dropping it is up to the reader
        let packets: Vec<Packet> = mock.ds_request(pgn::DM5, 0x01, "").await.collect().await;
        assert!(token.is_cancelled());
        assert_eq!(packets.len(), 1);
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_imposter_flag() {
        let mock = MockExchangeTransport::new();
        assert!(!mock.imposter_detected());
        mock.set_imposter(true);
        assert!(mock.imposter_detected());
    }
}
