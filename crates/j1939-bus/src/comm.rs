//! Communications module
//!
//! Drives exchanges through an [`ExchangeTransport`] and classifies what comes
//! back. Every pull from a packet stream is a cancellation point: once the
//! token is cancelled the stream is dropped and whatever was already received
//! is returned with `cancelled` set. Silence is a classification, not an error.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use j1939_core::{module_name, Acknowledgment, DecodeError, DecodeResult, Packet, ParsedPacket};
use j1939_core::pgn::ACKNOWLEDGMENT;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::BusConfig;
use crate::transport::{ExchangeTransport, PacketStream};

/// How an exchange was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// At least one response of the requested type
    Packets,
    /// Only acknowledgments were received
    Nack,
    NoResponse,
}

/// Classified result of one request exchange
#[derive(Debug, Clone)]
pub struct RequestResult<T> {
    pub pgn: u32,
    /// Decoded responses, in arrival order
    pub packets: Vec<T>,
    /// Acknowledgments for the requested PGN
    pub acks: Vec<Acknowledgment>,
    /// Responses that failed to decode, with their source address
    pub errors: Vec<(u8, DecodeError)>,
    /// The exchange was cut short by cancellation
    pub cancelled: bool,
}

impl<T> RequestResult<T> {
    fn empty(pgn: u32) -> Self {
        Self {
            pgn,
            packets: Vec::new(),
            acks: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn kind(&self) -> ResponseKind {
        if !self.packets.is_empty() {
            ResponseKind::Packets
        } else if !self.acks.is_empty() {
            ResponseKind::Nack
        } else {
            ResponseKind::NoResponse
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty() && self.acks.is_empty()
    }

    /// Acknowledgment received from `address`, if any
    pub fn ack_from(&self, address: u8) -> Option<&Acknowledgment> {
        self.acks.iter().find(|a| a.source() == address)
    }
}

impl<T: ParsedPacket> RequestResult<T> {
    /// Latest response from `address`
    pub fn packet_from(&self, address: u8) -> Option<&T> {
        self.packets.iter().rev().find(|p| p.source() == address)
    }

    /// Responding source addresses in first-response order
    pub fn sources(&self) -> Vec<u8> {
        let mut sources: Vec<u8> = Vec::new();
        for packet in &self.packets {
            if !sources.contains(&packet.source()) {
                sources.push(packet.source());
            }
        }
        sources
    }
}

impl RequestResult<Packet> {
    /// Latest raw response from `address`
    pub fn raw_from(&self, address: u8) -> Option<&Packet> {
        self.packets.iter().rev().find(|p| p.source == address)
    }
}

/// Traffic collected during a passive capture window
#[derive(Debug, Clone, Default)]
pub struct BusCapture {
    pub packets: Vec<Packet>,
    pub cancelled: bool,
}

enum Pull {
    Packet(Packet),
    Done,
    Cancelled,
}

/// Request/response exchanges on behalf of a test step
pub struct CommunicationsModule {
    transport: Arc<dyn ExchangeTransport>,
    config: BusConfig,
    cancel: CancellationToken,
}

impl CommunicationsModule {
    pub fn new(transport: Arc<dyn ExchangeTransport>, config: BusConfig) -> Self {
        Self {
            transport,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned stop token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn imposter_detected(&self) -> bool {
        self.transport.imposter_detected()
    }

    /// Global request for a typed message
    pub async fn request_global<T: ParsedPacket>(&self) -> RequestResult<T> {
        debug!(pgn = T::PGN, name = T::NAME, "Global request");
        self.request_global_with(T::PGN, T::from_packet).await
    }

    /// Destination-specific request for a typed message
    pub async fn request_ds<T: ParsedPacket>(&self, address: u8) -> RequestResult<T> {
        let label = format!("Requesting {} from {}", T::NAME, module_name(address));
        debug!(pgn = T::PGN, address, "{}", label);
        self.request_ds_with(T::PGN, address, &label, T::from_packet).await
    }

    /// Global request for a PGN without a typed decoder
    pub async fn request_global_raw(&self, pgn: u32) -> RequestResult<Packet> {
        debug!(pgn, "Global request");
        self.request_global_with(pgn, Ok).await
    }

    /// Destination-specific request for a PGN without a typed decoder
    pub async fn request_ds_raw(&self, pgn: u32, address: u8, label: &str) -> RequestResult<Packet> {
        debug!(pgn, address, "{}", label);
        self.request_ds_with(pgn, address, label, Ok).await
    }

    /// Passively collect bus traffic for `duration`
    pub async fn read_bus(&self, duration: Duration, section: &str) -> BusCapture {
        let mut capture = BusCapture::default();
        if self.is_cancelled() {
            capture.cancelled = true;
            return capture;
        }
        debug!(section, duration_ms = duration.as_millis() as u64, "Reading bus");

        let mut stream = self.transport.read_bus(duration, section).await;
        let deadline = Instant::now() + duration + self.config.ds_window();
        loop {
            match self.pull(&mut stream, deadline).await {
                Pull::Packet(packet) => capture.packets.push(packet),
                Pull::Done => break,
                Pull::Cancelled => {
                    debug!(section, received = capture.packets.len(), "Bus capture cancelled");
                    capture.cancelled = true;
                    break;
                }
            }
        }
        capture
    }

    async fn request_global_with<T>(
        &self,
        pgn: u32,
        decode: impl Fn(Packet) -> DecodeResult<T>,
    ) -> RequestResult<T> {
        if self.is_cancelled() {
            let mut result = RequestResult::empty(pgn);
            result.cancelled = true;
            return result;
        }
        let stream = self.transport.global_request(pgn).await;
        self.collect(stream, pgn, None, self.config.global_window(), decode).await
    }

    async fn request_ds_with<T>(
        &self,
        pgn: u32,
        address: u8,
        label: &str,
        decode: impl Fn(Packet) -> DecodeResult<T>,
    ) -> RequestResult<T> {
        if self.is_cancelled() {
            let mut result = RequestResult::empty(pgn);
            result.cancelled = true;
            return result;
        }
        let stream = self.transport.ds_request(pgn, address, label).await;
        self.collect(stream, pgn, Some(address), self.config.ds_window(), decode).await
    }

    async fn collect<T>(
        &self,
        mut stream: PacketStream,
        pgn: u32,
        address: Option<u8>,
        window: Duration,
        decode: impl Fn(Packet) -> DecodeResult<T>,
    ) -> RequestResult<T> {
        let mut result = RequestResult::empty(pgn);
        let deadline = Instant::now() + window;
        loop {
            let packet = match self.pull(&mut stream, deadline).await {
                Pull::Packet(packet) => packet,
                Pull::Done => break,
                Pull::Cancelled => {
                    result.cancelled = true;
                    break;
                }
            };
            if address.is_some_and(|a| a != packet.source) {
                continue;
            }
            if packet.pgn == ACKNOWLEDGMENT {
                match Acknowledgment::from_packet(packet) {
                    Ok(ack) if ack.acknowledged_pgn == pgn => result.acks.push(ack),
                    Ok(_) => {}
                    Err(e) => warn!(pgn, error = %e, "Malformed acknowledgment"),
                }
            } else if packet.pgn == pgn {
                let source = packet.source;
                match decode(packet) {
                    Ok(decoded) => result.packets.push(decoded),
                    Err(e) => {
                        warn!(pgn, source, error = %e, "Failed to decode response");
                        result.errors.push((source, e));
                    }
                }
            }
        }
        debug!(
            pgn,
            responses = result.packets.len(),
            acks = result.acks.len(),
            "Exchange complete"
        );
        result
    }

    /// Pull one packet, honouring the stop token and the response window
    async fn pull(&self, stream: &mut PacketStream, deadline: Instant) -> Pull {
        if self.cancel.is_cancelled() {
            return Pull::Cancelled;
        }
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Pull::Cancelled,
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };
        match next {
            // A packet produced after the stop request counts as never received
            Ok(Some(_)) if self.cancel.is_cancelled() => Pull::Cancelled,
            Ok(Some(packet)) => Pull::Packet(packet),
            Ok(None) | Err(_) => Pull::Done,
        }
    }
}
