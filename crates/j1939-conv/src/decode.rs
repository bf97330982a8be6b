//! Decoding raw slots to physical values
//!
//! J1939 reserves the top of each slot's raw range: a most significant byte of
//! 0xFE signals an error and 0xFF (or the reserved 0xFB..=0xFD indicators)
//! signals that the value is not available. Anything at or below 0xFA in the
//! most significant byte is a valid raw value.

use std::fmt;

use j1939_core::Packet;

use crate::definition::SpnDefinition;
use crate::precision::{format_thousands, round_to_precision};

/// A decoded slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Physical value, already rounded to display precision
    Valid(f64),
    NotAvailable,
    Error,
}

impl Reading {
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Valid(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Reading::Valid(_))
    }

    pub fn is_not_available(self) -> bool {
        matches!(self, Reading::NotAvailable)
    }

    pub fn is_error(self) -> bool {
        matches!(self, Reading::Error)
    }

    /// Report text: thousands-grouped number, "N/A" or "Error"
    pub fn format(self, precision: u8) -> String {
        match self {
            Reading::Valid(v) => format_thousands(v, precision),
            Reading::NotAvailable => "N/A".to_string(),
            Reading::Error => "Error".to_string(),
        }
    }
}

/// Read a little-endian unsigned slot; `None` if it runs past the payload
pub fn read_le(payload: &[u8], start: usize, length: usize) -> Option<u32> {
    if length == 0 || length > 4 {
        return None;
    }
    let bytes = payload.get(start..start.checked_add(length)?)?;
    Some(
        bytes
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32),
    )
}

/// Classify a raw slot by its most significant byte
pub fn classify(raw: u32, length: usize) -> Reading {
    let msb = (raw >> (8 * (length.clamp(1, 4) - 1))) & 0xFF;
    match msb {
        0xFE => Reading::Error,
        0xFB..=0xFF => Reading::NotAvailable,
        _ => Reading::Valid(raw as f64),
    }
}

/// Decode one slot: read, classify, then scale and round
///
/// A slot that lies beyond the end of the payload is not available.
pub fn decode_slot(payload: &[u8], start: usize, length: usize, scale: f64, offset: f64, precision: u8) -> Reading {
    let Some(raw) = read_le(payload, start, length) else {
        return Reading::NotAvailable;
    };
    match classify(raw, length) {
        Reading::Valid(raw) => Reading::Valid(round_to_precision(raw * scale + offset, precision)),
        other => other,
    }
}

/// One SPN decoded from a packet
#[derive(Debug, Clone, PartialEq)]
pub struct SpnValue {
    pub spn: u32,
    pub label: String,
    pub unit: String,
    pub reading: Reading,
    pub precision: u8,
}

impl SpnValue {
    pub fn decode(def: &SpnDefinition, payload: &[u8]) -> Self {
        let precision = def.get_precision();
        Self {
            spn: def.spn,
            label: def.label.clone(),
            unit: def.unit.clone(),
            reading: decode_slot(payload, def.start, def.length, def.scale, def.offset, precision),
            precision,
        }
    }

    pub fn is_not_available(&self) -> bool {
        self.reading.is_not_available()
    }
}

impl fmt::Display for SpnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPN {:>5}, {}: ", self.spn, self.label)?;
        match self.reading {
            Reading::Valid(_) if self.unit.is_empty() => write!(f, "{}", self.reading.format(self.precision)),
            Reading::Valid(_) => write!(f, "{} {}", self.reading.format(self.precision), self.unit),
            Reading::NotAvailable => write!(f, "Not Available"),
            Reading::Error => write!(f, "Error"),
        }
    }
}

/// Decode every definition against the packet's payload
pub fn decode_packet<'a>(packet: &Packet, defs: impl IntoIterator<Item = &'a SpnDefinition>) -> Vec<SpnValue> {
    defs.into_iter()
        .map(|def| SpnValue::decode(def, &packet.payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le() {
        assert_eq!(read_le(&[0x80, 0xA2, 0x19, 0x00], 0, 4), Some(1_680_000));
        assert_eq!(read_le(&[0x00, 0x40, 0x38], 1, 2), Some(0x3840));
        assert_eq!(read_le(&[0x00, 0x40], 1, 2), None);
        assert_eq!(read_le(&[0x00; 8], 0, 5), None);
    }

    #[test]
    fn test_classify_one_byte() {
        assert_eq!(classify(0xFA, 1), Reading::Valid(250.0));
        assert_eq!(classify(0xFE, 1), Reading::Error);
        assert_eq!(classify(0xFF, 1), Reading::NotAvailable);
        assert_eq!(classify(0xFB, 1), Reading::NotAvailable);
    }

    #[test]
    fn test_classify_wider_slots() {
        assert_eq!(classify(0xFAFF, 2), Reading::Valid(64255.0));
        assert_eq!(classify(0xFE12, 2), Reading::Error);
        assert_eq!(classify(0xFF00, 2), Reading::NotAvailable);
        assert_eq!(classify(0xFFFF_FFFF, 4), Reading::NotAvailable);
        assert_eq!(classify(0xFE00_0000, 4), Reading::Error);
        assert_eq!(classify(0x00FF_FFFF, 4), Reading::Valid(16_777_215.0));
    }

    #[test]
    fn test_decode_slot_scales() {
        // Engine speed: 0x3840 * 0.125 = 1800 rpm
        let payload = [0xFF, 0xFF, 0xFF, 0x40, 0x38, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode_slot(&payload, 3, 2, 0.125, 0.0, 3), Reading::Valid(1800.0));
        // Coolant: 132 - 40 = 92
        assert_eq!(decode_slot(&[132], 0, 1, 1.0, -40.0, 0), Reading::Valid(92.0));
        // Beyond the payload
        assert_eq!(decode_slot(&[132], 1, 1, 1.0, -40.0, 0), Reading::NotAvailable);
    }

    #[test]
    fn test_spn_value_display() {
        let def = SpnDefinition::new(190, "Engine Speed", 61444, 3, 2)
            .with_scale(0.125, 0.0)
            .with_unit("rpm")
            .with_precision(1);
        let value = SpnValue::decode(&def, &[0xFF, 0xFF, 0xFF, 0x40, 0x38, 0xFF, 0xFF, 0xFF]);
        assert_eq!(value.to_string(), "SPN   190, Engine Speed: 1,800.0 rpm");

        let value = SpnValue::decode(&def, &[0xFF; 8]);
        assert!(value.is_not_available());
        assert_eq!(value.to_string(), "SPN   190, Engine Speed: Not Available");
    }

    #[test]
    fn test_reading_format() {
        assert_eq!(Reading::Valid(1680.0).format(0), "1,680");
        assert_eq!(Reading::NotAvailable.format(0), "N/A");
        assert_eq!(Reading::Error.format(0), "Error");
    }
}
