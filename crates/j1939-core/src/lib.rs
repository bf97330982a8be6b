//! j1939-core - Core types for J1939-84 diagnostic validation
//!
//! This crate provides the building blocks shared by the bus, conversion and
//! validation crates:
//!
//! - raw [`Packet`]s as received from the vehicle bus
//! - typed diagnostic messages (DM5, DM24, DM26, acknowledgments)
//! - the [`CompositeSystem`] monitor enumeration and its [`SystemSet`] bitset
//! - [`Outcome`] reporting through an [`OutcomeSink`]
//! - the in-memory [`DataRepository`] of per-module state
//! - an injectable [`Clock`]

pub mod address;
pub mod clock;
pub mod composite;
pub mod error;
pub mod messages;
pub mod outcome;
pub mod packet;
pub mod pgn;
pub mod repository;

pub use address::{module_name, GLOBAL_ADDR, TOOL_ADDR};
pub use clock::{Clock, ManualClock, SystemClock};
pub use composite::{CompositeSystem, MonitoredSystem, SystemSet};
pub use error::{DecodeError, DecodeResult};
pub use messages::{
    AckControl, Acknowledgment, DiagnosticMessage, Dm24, Dm26, Dm5, ParsedPacket, SupportedSpn,
};
pub use outcome::{Outcome, OutcomeRecord, OutcomeSink, RecordingSink, UrgentMessage};
pub use packet::Packet;
pub use repository::{DataRepository, FuelType, ModuleRecord, VehicleInformation};
