//! In-memory module state store
//!
//! Records, per source address, the latest packet of each PGN and the SPNs the
//! module declared in DM24. Modules are kept in the order they were first seen;
//! DS exchanges walk them in that order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::module_name;
use crate::messages::{ParsedPacket, SupportedSpn};
use crate::packet::Packet;

/// Engine fuel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    #[default]
    Diesel,
    Gasoline,
    NaturalGas,
    HybridDiesel,
    HybridGasoline,
    Electric,
}

impl FuelType {
    pub fn is_compression_ignition(self) -> bool {
        matches!(self, FuelType::Diesel | FuelType::HybridDiesel)
    }

    pub fn is_hybrid(self) -> bool {
        matches!(self, FuelType::HybridDiesel | FuelType::HybridGasoline)
    }
}

/// Vehicle level facts entered by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInformation {
    pub vin: String,
    pub engine_model_year: u16,
    #[serde(default)]
    pub fuel_type: FuelType,
    /// When the engine was last started; `None` if unknown
    #[serde(default)]
    pub engine_start: Option<DateTime<Utc>>,
}

impl VehicleInformation {
    pub fn new(vin: impl Into<String>, engine_model_year: u16, fuel_type: FuelType) -> Self {
        Self {
            vin: vin.into(),
            engine_model_year,
            fuel_type,
            engine_start: None,
        }
    }

    pub fn with_engine_start(mut self, engine_start: DateTime<Utc>) -> Self {
        self.engine_start = Some(engine_start);
        self
    }
}

/// Everything known about one module
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub address: u8,
    packets: HashMap<u32, Packet>,
    supported_spns: Vec<SupportedSpn>,
    obd: bool,
}

impl ModuleRecord {
    fn new(address: u8) -> Self {
        Self {
            address,
            packets: HashMap::new(),
            supported_spns: Vec::new(),
            obd: false,
        }
    }

    pub fn name(&self) -> String {
        module_name(self.address)
    }

    pub fn is_obd(&self) -> bool {
        self.obd
    }

    pub fn latest_packet(&self, pgn: u32) -> Option<&Packet> {
        self.packets.get(&pgn)
    }

    /// Latest packet of the given type, decoded
    pub fn latest<T: ParsedPacket>(&self) -> Option<T> {
        self.packets.get(&T::PGN).and_then(|p| T::from_packet(p.clone()).ok())
    }

    pub fn supported_spns(&self) -> &[SupportedSpn] {
        &self.supported_spns
    }

    /// SPN ids the module declared for the data stream
    pub fn data_stream_spns(&self) -> Vec<u32> {
        self.supported_spns
            .iter()
            .filter(|s| s.data_stream)
            .map(|s| s.spn)
            .collect()
    }
}

/// Per-module state for one test run
#[derive(Debug, Clone, Default)]
pub struct DataRepository {
    modules: Vec<ModuleRecord>,
    vehicle: Option<VehicleInformation>,
}

impl DataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicle_information(mut self, vehicle: VehicleInformation) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    pub fn vehicle_information(&self) -> Option<&VehicleInformation> {
        self.vehicle.as_ref()
    }

    pub fn set_vehicle_information(&mut self, vehicle: VehicleInformation) {
        self.vehicle = Some(vehicle);
    }

    /// Record for `address`, created on first sight
    pub fn observe(&mut self, address: u8) -> &mut ModuleRecord {
        let index = match self.modules.iter().position(|m| m.address == address) {
            Some(index) => index,
            None => {
                debug!(source = address, "New module observed");
                self.modules.push(ModuleRecord::new(address));
                self.modules.len() - 1
            }
        };
        &mut self.modules[index]
    }

    /// Store `packet` as the latest of its PGN for its source (last write wins)
    pub fn record(&mut self, packet: Packet) {
        let record = self.observe(packet.source);
        record.packets.insert(packet.pgn, packet);
    }

    pub fn mark_obd(&mut self, address: u8) {
        self.observe(address).obd = true;
    }

    pub fn set_supported_spns(&mut self, address: u8, spns: Vec<SupportedSpn>) {
        self.observe(address).supported_spns = spns;
    }

    pub fn module(&self, address: u8) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.address == address)
    }

    /// All modules in discovery order
    pub fn modules(&self) -> &[ModuleRecord] {
        &self.modules
    }

    pub fn addresses(&self) -> Vec<u8> {
        self.modules.iter().map(|m| m.address).collect()
    }

    pub fn obd_modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.iter().filter(|m| m.obd)
    }

    pub fn obd_addresses(&self) -> Vec<u8> {
        self.obd_modules().map(|m| m.address).collect()
    }

    pub fn is_obd(&self, address: u8) -> bool {
        self.module(address).is_some_and(|m| m.obd)
    }

    pub fn supported_spns(&self, address: u8) -> &[SupportedSpn] {
        self.module(address).map(|m| m.supported_spns()).unwrap_or(&[])
    }
}
