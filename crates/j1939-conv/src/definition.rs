//! SPN and PGN definition structures
//!
//! Represents where an SPN lives inside its parameter group, how to scale it,
//! and which values are physically plausible. A small built-in table covers the
//! data-stream parameters exercised by the validation steps; further entries can
//! be overlaid from YAML through [`crate::SpnStore`].

use serde::{Deserialize, Serialize};

use crate::precision::precision_from_scale;

/// Definition of a single SPN slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpnDefinition {
    /// Suspect parameter number (set from the YAML key when loaded from a file)
    #[serde(default)]
    pub spn: u32,

    /// Human-readable label (e.g., "Engine Speed")
    pub label: String,

    /// Parameter group carrying this SPN
    pub pgn: u32,

    /// Byte offset of the slot within the payload
    pub start: usize,

    /// Slot width in bytes (1, 2 or 4)
    #[serde(default = "default_length")]
    pub length: usize,

    /// Scale factor: physical = raw * scale + offset
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Offset: physical = raw * scale + offset
    #[serde(default)]
    pub offset: f64,

    #[serde(default)]
    pub unit: String,

    /// Lowest physically plausible value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Highest physically plausible value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Explicit precision override (decimal places)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    /// Normally provided only by OBD modules
    #[serde(default)]
    pub obd: bool,
}

fn default_scale() -> f64 {
    1.0
}

fn default_length() -> usize {
    1
}

impl SpnDefinition {
    pub fn new(spn: u32, label: impl Into<String>, pgn: u32, start: usize, length: usize) -> Self {
        Self {
            spn,
            label: label.into(),
            pgn,
            start,
            length,
            scale: 1.0,
            offset: 0.0,
            unit: String::new(),
            min: None,
            max: None,
            precision: None,
            obd: false,
        }
    }

    /// Add scale/offset
    pub fn with_scale(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Add plausible range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Mark as normally provided by an OBD module
    pub fn obd(mut self) -> Self {
        self.obd = true;
        self
    }

    /// Get the precision to use (explicit or derived from scale)
    pub fn get_precision(&self) -> u8 {
        self.precision.unwrap_or_else(|| precision_from_scale(self.scale))
    }

    /// Whether `value` lies within the plausible range (unbounded sides always pass)
    pub fn is_plausible(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Byte range occupied in the payload
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Definition of a parameter group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgnDefinition {
    /// Parameter group number (set from the YAML key when loaded from a file)
    #[serde(default)]
    pub pgn: u32,

    pub label: String,

    /// Acronym used in reports (e.g., "EEC1")
    #[serde(default)]
    pub acronym: String,

    /// Defined transmission period for broadcast groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_period_ms: Option<u64>,

    /// Whether modules answer a request for this group
    #[serde(default)]
    pub on_request: bool,
}

impl PgnDefinition {
    /// Broadcast group with the given period
    pub fn broadcast(pgn: u32, label: impl Into<String>, acronym: impl Into<String>, period_ms: u64) -> Self {
        Self {
            pgn,
            label: label.into(),
            acronym: acronym.into(),
            broadcast_period_ms: Some(period_ms),
            on_request: false,
        }
    }

    /// Group only sent when requested
    pub fn on_request(pgn: u32, label: impl Into<String>, acronym: impl Into<String>) -> Self {
        Self {
            pgn,
            label: label.into(),
            acronym: acronym.into(),
            broadcast_period_ms: None,
            on_request: true,
        }
    }

    /// Also answer requests
    pub fn requestable(mut self) -> Self {
        self.on_request = true;
        self
    }
}

/// Built-in parameter groups
pub fn builtin_pgns() -> Vec<PgnDefinition> {
    vec![
        PgnDefinition::broadcast(61443, "Electronic Engine Controller 2", "EEC2", 50),
        PgnDefinition::broadcast(61444, "Electronic Engine Controller 1", "EEC1", 20),
        PgnDefinition::on_request(65253, "Engine Hours, Revolutions", "HOURS"),
        PgnDefinition::on_request(65257, "Fuel Consumption (Liquid)", "LFC1"),
        PgnDefinition::broadcast(65262, "Engine Temperature 1", "ET1", 1000),
        PgnDefinition::broadcast(65263, "Engine Fluid Level/Pressure 1", "EFL/P1", 500),
        PgnDefinition::broadcast(65265, "Cruise Control/Vehicle Speed 1", "CCVS1", 100),
        PgnDefinition::broadcast(65269, "Ambient Conditions", "AMB", 1000).requestable(),
        PgnDefinition::broadcast(65270, "Inlet/Exhaust Conditions 1", "IC1", 500),
    ]
}

/// Built-in SPN slots
pub fn builtin_spns() -> Vec<SpnDefinition> {
    vec![
        SpnDefinition::new(91, "Accelerator Pedal Position 1", 61443, 1, 1)
            .with_scale(0.4, 0.0)
            .with_unit("%")
            .with_range(0.0, 100.0)
            .obd(),
        SpnDefinition::new(92, "Engine Percent Load At Current Speed", 61443, 2, 1)
            .with_unit("%")
            .with_range(0.0, 125.0)
            .obd(),
        SpnDefinition::new(512, "Driver's Demand Engine - Percent Torque", 61444, 1, 1)
            .with_scale(1.0, -125.0)
            .with_unit("%")
            .with_range(-125.0, 125.0)
            .obd(),
        SpnDefinition::new(513, "Actual Engine - Percent Torque", 61444, 2, 1)
            .with_scale(1.0, -125.0)
            .with_unit("%")
            .with_range(-125.0, 125.0)
            .obd(),
        SpnDefinition::new(190, "Engine Speed", 61444, 3, 2)
            .with_scale(0.125, 0.0)
            .with_unit("rpm")
            .with_precision(1)
            .with_range(0.0, 4000.0)
            .obd(),
        SpnDefinition::new(247, "Engine Total Hours of Operation", 65253, 0, 4)
            .with_scale(0.05, 0.0)
            .with_unit("h")
            .obd(),
        SpnDefinition::new(250, "Engine Total Fuel Used", 65257, 4, 4)
            .with_scale(0.5, 0.0)
            .with_unit("l")
            .obd(),
        SpnDefinition::new(110, "Engine Coolant Temperature", 65262, 0, 1)
            .with_scale(1.0, -40.0)
            .with_unit("°C")
            .with_range(-40.0, 150.0)
            .obd(),
        SpnDefinition::new(174, "Engine Fuel 1 Temperature 1", 65262, 1, 1)
            .with_scale(1.0, -40.0)
            .with_unit("°C")
            .with_range(-40.0, 150.0)
            .obd(),
        SpnDefinition::new(175, "Engine Oil Temperature 1", 65262, 2, 2)
            .with_scale(0.03125, -273.0)
            .with_unit("°C")
            .with_precision(1)
            .with_range(-40.0, 200.0)
            .obd(),
        SpnDefinition::new(100, "Engine Oil Pressure 1", 65263, 3, 1)
            .with_scale(4.0, 0.0)
            .with_unit("kPa")
            .with_range(0.0, 1000.0)
            .obd(),
        SpnDefinition::new(84, "Wheel-Based Vehicle Speed", 65265, 1, 2)
            .with_scale(0.00390625, 0.0)
            .with_unit("km/h")
            .with_precision(2)
            .with_range(0.0, 160.0),
        SpnDefinition::new(108, "Barometric Pressure", 65269, 0, 1)
            .with_scale(0.5, 0.0)
            .with_unit("kPa")
            .with_range(50.0, 110.0)
            .obd(),
        SpnDefinition::new(171, "Ambient Air Temperature", 65269, 3, 2)
            .with_scale(0.03125, -273.0)
            .with_unit("°C")
            .with_precision(1)
            .with_range(-50.0, 70.0),
        SpnDefinition::new(102, "Engine Intake Manifold #1 Pressure", 65270, 1, 1)
            .with_scale(2.0, 0.0)
            .with_unit("kPa")
            .with_range(0.0, 500.0)
            .obd(),
        SpnDefinition::new(105, "Engine Intake Manifold 1 Temperature", 65270, 2, 1)
            .with_scale(1.0, -40.0)
            .with_unit("°C")
            .with_range(-40.0, 150.0)
            .obd(),
    ]
}
