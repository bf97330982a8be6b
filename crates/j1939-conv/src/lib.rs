//! j1939-conv - SPN Conversion Library for J1939 Diagnostics
//!
//! Turns raw parameter group payloads into physical values, with J1939
//! not-available and error sentinels kept distinct from real numbers.
//!
//! # Features
//!
//! - **SPN/PGN tables** - built-in definitions plus YAML overlays
//! - **Sentinel-aware decoding** - 0xFF.. is "N/A", 0xFE.. is "Error"
//! - **Precision-aware formatting** - `1,680`, never `1679.9999999`
//! - **Engineering arrays** - GHG tracking, active technology and NOx binning
//! - **Frame reassembly** - lost transport frames decode as not available
//!
//! # Quick Start
//!
//! ```rust
//! use j1939_conv::{Reading, SpnStore};
//! use j1939_core::Packet;
//!
//! let store = SpnStore::with_defaults();
//!
//! // Coolant temperature: raw 132 → physical = 132 - 40 = 92°C
//! let packet = Packet::new(65262, 0x00, vec![132, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
//! let coolant = store.decode_spn(110, &packet).unwrap();
//! assert_eq!(coolant.reading, Reading::Valid(92.0));
//! ```
//!
//! # YAML Definition Files
//!
//! ```yaml
//! pgns:
//!   65266:
//!     label: Fuel Economy (Liquid)
//!     acronym: LFE1
//!     broadcast_period_ms: 100
//!
//! spns:
//!   "183":
//!     label: Engine Fuel Rate
//!     pgn: 65266
//!     start: 0
//!     length: 2
//!     scale: 0.05
//!     unit: l/h
//!     min: 0
//!     max: 200
//!     obd: true
//! ```

pub mod array;
pub mod decode;
pub mod definition;
pub mod error;
pub mod frames;
pub mod precision;
pub mod store;
pub mod table;

// Re-export main types
pub use array::{
    ArrayDefinition, ArrayField, ArrayLayout, ArrayRow, EngineeringArray, NoxQuantity, Timeframe, ACTIVE_TECHNOLOGY,
    GHG_TRACKING, HYBRID_CHG_DEPLETING, NOX_BIN_LABELS, NOX_QUANTITIES,
};
pub use decode::{Reading, SpnValue};
pub use definition::{PgnDefinition, SpnDefinition};
pub use error::{parse_spn, ConvError, ConvResult};
pub use frames::FrameSet;
pub use precision::{format_thousands, precision_from_scale, round_for_scale};
pub use store::SpnStore;
pub use table::{render_nox_table, render_timeframe_table};

#[cfg(test)]
mod tests {
    use super::*;
    use j1939_core::Packet;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reassembled_array_workflow() {
        // 36-byte hybrid lifetime array in six frames; frame 2 never arrives
        let mut payload: Vec<u8> = Vec::new();
        for value in [1_680_000u32, 250_000, 0, 1200, 4500, 0, 0, 0, 0] {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        let mut frames = FrameSet::new(HYBRID_CHG_DEPLETING.lifetime_pgn, 0x00, payload.len());
        for (i, chunk) in payload.chunks(7).enumerate() {
            if i == 1 {
                continue;
            }
            let mut frame = vec![i as u8 + 1];
            frame.extend_from_slice(chunk);
            frames.add_frame(&frame).unwrap();
        }
        assert_eq!(frames.missing_frames(), vec![2]);

        let array = HYBRID_CHG_DEPLETING.decode_partial(&frames.assemble(), &frames.missing_ranges());
        let values: Vec<String> = array.rows.iter().map(|r| r.display_value()).collect();
        // bytes 7..14 lost: the second, third and fourth slots overlap them
        assert_eq!(values[0], "1,680");
        assert_eq!(values[1], "N/A");
        assert_eq!(values[2], "N/A");
        assert_eq!(values[3], "N/A");
        assert_eq!(values[4], "45");
    }
}
