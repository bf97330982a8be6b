//! Integration tests for the J1939-84 validation engine
//!
//! Steps run end to end against [`MockExchangeTransport`] with a
//! [`RecordingSink`] collecting what a report would show. No bus hardware is
//! needed.
//!
//! # Test Structure
//!
//! - `readiness_test.rs` - DM5/DM24/DM26 steps, composites and DS/global symmetry
//! - `data_stream_test.rs` - broadcast capture, Table A1 checks and cancellation
//! - `tracking_test.rs` - GHG and NOx tracking array tables

use std::sync::Arc;

use j1939_84::{StepContext, StepResult, StepSummary, TestStep};
use j1939_bus::{BusConfig, CommunicationsModule, MockExchangeTransport};
use j1939_core::{DataRepository, ManualClock, Packet, RecordingSink, VehicleInformation};

/// Scripted vehicle plus the engine context driving it
pub struct TestBench {
    pub mock: Arc<MockExchangeTransport>,
    pub sink: Arc<RecordingSink>,
    pub ctx: StepContext,
}

impl TestBench {
    pub fn new() -> Self {
        Self::with_repository(DataRepository::new())
    }

    pub fn with_repository(repository: DataRepository) -> Self {
        let mock = Arc::new(MockExchangeTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let comm = CommunicationsModule::new(mock.clone(), BusConfig::default());
        let ctx = StepContext::new(comm, repository, sink.clone(), Arc::new(ManualClock::default()));
        Self { mock, sink, ctx }
    }

    pub fn with_vehicle(vehicle: VehicleInformation) -> Self {
        Self::with_repository(DataRepository::new().with_vehicle_information(vehicle))
    }

    /// Mark modules as OBD ECUs, in discovery order
    pub fn obd(mut self, addresses: &[u8]) -> Self {
        for &address in addresses {
            self.ctx.repository.mark_obd(address);
        }
        self
    }

    /// Script the same answer for the global and the DS request
    pub fn respond(&self, packets: Vec<Packet>) {
        let Some(pgn) = packets.first().map(|p| p.pgn) else {
            return;
        };
        for packet in &packets {
            self.mock.add_ds_response(pgn, packet.source, [packet.clone()]);
        }
        self.mock.add_global_response(pgn, packets);
    }

    pub async fn run(&mut self, step: &dyn TestStep) -> StepResult<StepSummary> {
        self.ctx.run_step(step).await
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Packet from a hex payload, e.g. `packet(65262, 0x00, "82FFFFFFFFFFFFFF")`
pub fn packet(pgn: u32, source: u8, payload: &str) -> Packet {
    Packet::new(pgn, source, hex::decode(payload).unwrap_or_default())
}

/// Fixed-field array payload whose first 4-byte field is `value`, the rest not available
pub fn first_field(pgn: u32, source: u8, value: u32, len: usize) -> Packet {
    let mut payload = value.to_le_bytes().to_vec();
    payload.resize(len, 0xFF);
    Packet::new(pgn, source, payload)
}
