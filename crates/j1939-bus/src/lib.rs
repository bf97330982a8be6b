//! j1939-bus - J1939 exchanges over an injectable transport
//!
//! The [`ExchangeTransport`] trait is the seam between the validation engine and
//! the vehicle bus. [`CommunicationsModule`] drives exchanges through it and
//! classifies the responses; [`MockExchangeTransport`] replays scripted traffic
//! for tests.

pub mod comm;
pub mod config;
pub mod error;
pub mod mock;
pub mod transport;

pub use comm::{BusCapture, CommunicationsModule, RequestResult, ResponseKind};
pub use config::BusConfig;
pub use error::{BusError, BusResult};
pub use mock::{MockExchangeTransport, RequestKind, RequestRecord};
pub use transport::{request_packet, ExchangeTransport, PacketStream};
