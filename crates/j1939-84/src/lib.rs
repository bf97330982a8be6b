//! j1939-84 - Diagnostic exchange and cross-validation engine
//!
//! Runs J1939-84 test steps against the vehicle through a
//! [`j1939_bus::CommunicationsModule`]. Each step requests data globally and
//! from every module, compares the answers with each other and with the
//! broadcast traffic, and reports clause-tagged outcomes to an
//! [`j1939_core::OutcomeSink`].
//!
//! # Building blocks
//!
//! - [`composite`] - vehicle-wide readiness from per-module DM5/DM26 bit-sets
//! - [`broadcast`] - broadcast traffic grouping, periods, missing SPNs
//! - [`table_a1`] - Table A1 value checks (N/A, implausible, duplicates, non-OBD)
//! - [`reporter`] - per-step outcome staging with commit/discard
//! - [`steps`] - the step state machine and the concrete steps
//!
//! Outcomes of a unit of work (the global phase, one module, the validation
//! phase) are staged and forwarded together; cancelling the run drops the
//! unit in flight.

pub mod broadcast;
pub mod composite;
pub mod config;
pub mod error;
pub mod reporter;
pub mod steps;
pub mod table_a1;

pub use broadcast::{BroadcastValidator, PgnPacketMap};
pub use composite::{CompositeTable, ModuleReadiness, ReadinessKind};
pub use config::ValidationConfig;
pub use error::{StepError, StepResult};
pub use reporter::StepReporter;
pub use steps::{
    Agreement, DataStreamStep, Dm24Step, Dm26Step, Dm5Step, StepContext, StepSession, StepState, StepSummary,
    TestStep, TrackingStep,
};
pub use table_a1::TableA1Validator;
