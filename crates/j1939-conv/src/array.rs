//! Wide engineering arrays
//!
//! GHG tracking, hybrid charge depleting, active technology and NOx binning
//! data are each reported through three parameter groups, one per
//! [`Timeframe`]. Layouts are declared as static tables; decoding never fails,
//! slots that are missing or carry the not-available pattern decode as
//! [`Reading::NotAvailable`].

use std::fmt;
use std::ops::Range;

use j1939_core::Packet;

use crate::decode::{decode_slot, Reading};

/// Accumulation period of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    Lifetime,
    Active100Hour,
    Stored100Hour,
}

impl Timeframe {
    /// Request order
    pub const ALL: [Timeframe; 3] = [Timeframe::Lifetime, Timeframe::Active100Hour, Timeframe::Stored100Hour];

    /// Position in [`Timeframe::ALL`]
    pub fn index(self) -> usize {
        match self {
            Timeframe::Lifetime => 0,
            Timeframe::Active100Hour => 1,
            Timeframe::Stored100Hour => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Timeframe::Lifetime => "Lifetime",
            Timeframe::Active100Hour => "Active 100 Hour",
            Timeframe::Stored100Hour => "Stored 100 Hour",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn overlaps_missing(missing: &[Range<usize>], start: usize, length: usize) -> bool {
    missing.iter().any(|range| range.start < start + length && start < range.end)
}

/// One slot of an array, relative to the start of its record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayField {
    pub spn: u32,
    pub label: &'static str,
    pub start: usize,
    pub length: usize,
    pub scale: f64,
    /// Display precision (decimal places)
    pub precision: u8,
}

impl ArrayField {
    const fn new(spn: u32, label: &'static str, start: usize, scale: f64) -> Self {
        Self {
            spn,
            label,
            start,
            length: 4,
            scale,
            precision: 0,
        }
    }

    const fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Decode the slot of the record starting at `base`
    pub fn decode(&self, payload: &[u8], base: usize, missing: &[Range<usize>]) -> Reading {
        let start = base + self.start;
        if overlaps_missing(missing, start, self.length) {
            return Reading::NotAvailable;
        }
        decode_slot(payload, start, self.length, self.scale, 0.0, self.precision)
    }
}

/// How rows are laid out in the payload
#[derive(Debug, Clone, Copy)]
pub enum ArrayLayout {
    /// One row per field at a fixed position
    Fixed(&'static [ArrayField]),
    /// Equal-width slots, one per bin label
    Bins {
        labels: &'static [&'static str],
        length: usize,
        scale: f64,
        precision: u8,
    },
    /// Repeating records keyed by an index byte at offset 0
    Indexed {
        record_len: usize,
        fields: &'static [ArrayField],
        index_label: fn(u8) -> String,
    },
}

/// Declaration of one engineering array and its three parameter groups
#[derive(Debug, Clone, Copy)]
pub struct ArrayDefinition {
    pub name: &'static str,
    pub lifetime_pgn: u32,
    pub stored_pgn: u32,
    pub active_pgn: u32,
    pub layout: ArrayLayout,
}

impl ArrayDefinition {
    pub fn pgn(&self, timeframe: Timeframe) -> u32 {
        match timeframe {
            Timeframe::Lifetime => self.lifetime_pgn,
            Timeframe::Active100Hour => self.active_pgn,
            Timeframe::Stored100Hour => self.stored_pgn,
        }
    }

    /// Row labels of a binned array; empty for other layouts
    pub fn bin_labels(&self) -> &'static [&'static str] {
        match self.layout {
            ArrayLayout::Bins { labels, .. } => labels,
            _ => &[],
        }
    }

    pub fn timeframe_of(&self, pgn: u32) -> Option<Timeframe> {
        Timeframe::ALL.into_iter().find(|&t| self.pgn(t) == pgn)
    }

    /// Decode a complete payload
    pub fn decode(&self, packet: &Packet) -> EngineeringArray {
        self.decode_partial(packet, &[])
    }

    /// Decode a payload whose `missing` byte ranges never arrived
    ///
    /// Every slot overlapping a missing range is not available.
    pub fn decode_partial(&self, packet: &Packet, missing: &[Range<usize>]) -> EngineeringArray {
        let payload = &packet.payload[..];
        let rows = match self.layout {
            ArrayLayout::Fixed(fields) => fields
                .iter()
                .enumerate()
                .map(|(i, field)| ArrayRow {
                    key: i as u32,
                    label: field.label.to_string(),
                    reading: field.decode(payload, 0, missing),
                    precision: field.precision,
                })
                .collect(),
            ArrayLayout::Bins {
                labels,
                length,
                scale,
                precision,
            } => labels
                .iter()
                .enumerate()
                .map(|(i, label)| ArrayRow {
                    key: i as u32,
                    label: label.to_string(),
                    reading: if overlaps_missing(missing, i * length, length) {
                        Reading::NotAvailable
                    } else {
                        decode_slot(payload, i * length, length, scale, 0.0, precision)
                    },
                    precision,
                })
                .collect(),
            ArrayLayout::Indexed {
                record_len,
                fields,
                index_label,
            } => {
                let mut rows = Vec::new();
                for (r, record) in payload.chunks(record_len).enumerate() {
                    let base = r * record_len;
                    if overlaps_missing(missing, base, 1) {
                        continue;
                    }
                    // 0xFF index marks padding
                    let Some(&index) = record.first().filter(|&&i| i != 0xFF) else {
                        continue;
                    };
                    for (i, field) in fields.iter().enumerate() {
                        rows.push(ArrayRow {
                            key: index as u32 * fields.len() as u32 + i as u32,
                            label: format!("{}, {}", index_label(index), field.label),
                            reading: field.decode(payload, base, missing),
                            precision: field.precision,
                        });
                    }
                }
                rows.sort_by_key(|row| row.key);
                rows
            }
        };

        EngineeringArray {
            pgn: packet.pgn,
            source: packet.source,
            rows,
        }
    }
}

/// One decoded row
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRow {
    /// Ordering key shared by the same row across timeframes
    pub key: u32,
    pub label: String,
    pub reading: Reading,
    pub precision: u8,
}

impl ArrayRow {
    pub fn display_value(&self) -> String {
        self.reading.format(self.precision)
    }
}

/// A decoded engineering array from one module and timeframe
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeringArray {
    pub pgn: u32,
    pub source: u8,
    pub rows: Vec<ArrayRow>,
}

impl EngineeringArray {
    pub fn row(&self, key: u32) -> Option<&ArrayRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn row_by_label(&self, label: &str) -> Option<&ArrayRow> {
        self.rows.iter().find(|row| row.label == label)
    }
}

static GHG_TRACKING_FIELDS: [ArrayField; 13] = [
    ArrayField::new(12730, "Engine Run Time, s", 0, 1.0),
    ArrayField::new(12731, "Vehicle Dist., km", 4, 0.001),
    ArrayField::new(12732, "Vehicle Fuel, l", 8, 0.01),
    ArrayField::new(12733, "Engine Fuel, l", 12, 0.01),
    ArrayField::new(12734, "Eng.Out.Energy, kW-hr", 16, 1.0),
    ArrayField::new(12735, "PKE Numerator", 20, 1.0),
    ArrayField::new(12736, "Urban Speed Run Time, s", 24, 1.0),
    ArrayField::new(12737, "Idle Run Time, s", 28, 1.0),
    ArrayField::new(12738, "Engine Idle Fuel, l", 32, 0.01),
    ArrayField::new(12739, "PTO Run Time, s", 36, 1.0),
    ArrayField::new(12740, "PTO Fuel Consumption, l", 40, 0.01),
    ArrayField::new(12741, "AES Shutdown Count", 44, 1.0).with_length(2),
    ArrayField::new(12742, "Stop-Start Run Time, s", 46, 1.0),
];

/// GHG Tracking array
pub static GHG_TRACKING: ArrayDefinition = ArrayDefinition {
    name: "GHG Tracking",
    lifetime_pgn: 64252,
    stored_pgn: 64253,
    active_pgn: 64254,
    layout: ArrayLayout::Fixed(&GHG_TRACKING_FIELDS),
};

static HYBRID_CHG_DEPLETING_FIELDS: [ArrayField; 9] = [
    ArrayField::new(12783, "Chg Depleting engine off,  km", 0, 0.001),
    ArrayField::new(12784, "Chg Depleting engine on,   km", 4, 0.001),
    ArrayField::new(12785, "Drv-Sel Inc Operation,     km", 8, 0.001),
    ArrayField::new(12786, "Fuel Consume: Chg Dep Op,  l", 12, 0.01),
    ArrayField::new(12787, "Fuel Consume: Drv-Sel In,  l", 16, 0.01),
    ArrayField::new(12788, "Grid: Chg Dep Op eng-off, kWh", 20, 0.001),
    ArrayField::new(12789, "Grid: Chg Dep Op eng-on,  kWh", 24, 0.001),
    ArrayField::new(12790, "Grid: Drv-Sel Inc Op,     kWh", 28, 0.001),
    ArrayField::new(12791, "Grid: Energy into battery, kWh", 32, 0.001),
];

/// Hybrid Charge Depleting / Increasing Operation array
pub static HYBRID_CHG_DEPLETING: ArrayDefinition = ArrayDefinition {
    name: "Hybrid Charge Depleting or Increasing Operation",
    lifetime_pgn: 64244,
    stored_pgn: 64245,
    active_pgn: 64246,
    layout: ArrayLayout::Fixed(&HYBRID_CHG_DEPLETING_FIELDS),
};

static ACTIVE_TECHNOLOGY_FIELDS: [ArrayField; 2] = [
    ArrayField::new(12697, "min", 1, 1.0 / 60.0),
    ArrayField::new(12698, "km", 5, 0.001),
];

/// Label of a GHG active technology index
pub fn technology_label(index: u8) -> String {
    let label = match index {
        1 => "Predictive Cruise Ctrl",
        2 => "Cylinder Deactivation",
        3 => "Engine Stop-Start",
        4 => "Neutral Idle",
        5 => "Waste Heat Recovery",
        6 => "Aero Device",
        7 => "Auto Engine Shutdown",
        8 => "Eco-Roll",
        9 => "Electric Accessories",
        0xFA..=0xFE => "Reserved",
        _ => return format!("Mfg Defined {}", index),
    };
    label.to_string()
}

/// GHG Active Technology array, 9-byte records `{index, time s, distance m}`
pub static ACTIVE_TECHNOLOGY: ArrayDefinition = ArrayDefinition {
    name: "GHG Active Technology",
    lifetime_pgn: 64257,
    stored_pgn: 64256,
    active_pgn: 64255,
    layout: ArrayLayout::Indexed {
        record_len: 9,
        fields: &ACTIVE_TECHNOLOGY_FIELDS,
        index_label: technology_label,
    },
};

/// NOx binning bin labels, in bin order
pub static NOX_BIN_LABELS: [&str; 17] = [
    "Bin 1 (Total)",
    "Bin 2 (Idle)",
    "Bin 3 (Low Power)",
    "Bin 4 (Spd 1, Pwr 1)",
    "Bin 5 (Spd 1, Pwr 2)",
    "Bin 6 (Spd 1, Pwr 3)",
    "Bin 7 (Spd 1, Pwr 4)",
    "Bin 8 (Spd 2, Pwr 1)",
    "Bin 9 (Spd 2, Pwr 2)",
    "Bin 10 (Spd 2, Pwr 3)",
    "Bin 11 (Spd 2, Pwr 4)",
    "Bin 12 (Spd 3, Pwr 1)",
    "Bin 13 (Spd 3, Pwr 2)",
    "Bin 14 (Spd 3, Pwr 3)",
    "Bin 15 (Spd 3, Pwr 4)",
    "Bin 16 (Regen)",
    "Bin 17 (Unbinned)",
];

/// One NOx binning quantity: an array plus its two-line column header
#[derive(Debug, Clone, Copy)]
pub struct NoxQuantity {
    pub array: ArrayDefinition,
    pub header: [&'static str; 2],
}

const fn nox_quantity(
    name: &'static str,
    header: [&'static str; 2],
    ordinal: u32,
    labels: &'static [&'static str],
    scale: f64,
) -> NoxQuantity {
    let lifetime_pgn = 64262 + 3 * ordinal;
    NoxQuantity {
        array: ArrayDefinition {
            name,
            lifetime_pgn,
            stored_pgn: lifetime_pgn + 1,
            active_pgn: lifetime_pgn + 2,
            layout: ArrayLayout::Bins {
                labels,
                length: 4,
                scale,
                precision: 0,
            },
        },
        header,
    }
}

/// NOx binning quantities in report column order
pub static NOX_QUANTITIES: [NoxQuantity; 6] = [
    nox_quantity("NOx Tail Pipe Mass", ["Tail Pipe", "NOx, g"], 0, &NOX_BIN_LABELS, 0.001),
    nox_quantity("NOx Engine Out Mass", ["Eng Out", "NOx, g"], 1, &NOX_BIN_LABELS, 0.001),
    nox_quantity("Engine Output Energy", ["EOE", "kWh"], 2, &NOX_BIN_LABELS, 0.001),
    nox_quantity("Engine Fuel", ["Engine", "Fuel, l"], 3, &NOX_BIN_LABELS, 0.01),
    nox_quantity("Engine Run Time", ["Engine Run", "Time, min"], 4, &NOX_BIN_LABELS, 1.0 / 60.0),
    nox_quantity("Vehicle Distance", ["Vehicle", "Dist, km"], 5, &NOX_BIN_LABELS, 0.001),
];
