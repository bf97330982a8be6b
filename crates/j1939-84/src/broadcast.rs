//! Broadcast validator
//!
//! Works on traffic captured passively during a broadcast window: groups it by
//! PGN and source, checks transmission periods and finds supported SPNs that
//! never arrived with a valid value.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use j1939_conv::{SpnStore, SpnValue};
use j1939_core::{module_name, Outcome, Packet, UrgentMessage, TOOL_ADDR};
use tracing::{debug, warn};

use crate::reporter::StepReporter;

/// Captured packets by PGN, then by source address, in arrival order
pub type PgnPacketMap = BTreeMap<u32, BTreeMap<u8, Vec<Packet>>>;

/// Period tolerance, percent of the defined period
const PERIOD_TOLERANCE_PCT: i64 = 110;

pub struct BroadcastValidator {
    store: Arc<SpnStore>,
}

impl BroadcastValidator {
    pub fn new(store: Arc<SpnStore>) -> Self {
        Self { store }
    }

    pub fn build_pgn_packet_map(packets: &[Packet]) -> PgnPacketMap {
        let mut map = PgnPacketMap::new();
        for packet in packets {
            map.entry(packet.pgn)
                .or_default()
                .entry(packet.source)
                .or_default()
                .push(packet.clone());
        }
        map
    }

    /// Broadcast-only groups carrying any of the supported SPNs
    pub fn collect_non_on_request_pgns(&self, supported_spns: &[u32]) -> Vec<u32> {
        self.store.non_on_request_pgns(supported_spns)
    }

    /// Longest defined broadcast period among `pgns`
    pub fn maximum_broadcast_period(&self, pgns: &[u32]) -> Duration {
        self.store.maximum_broadcast_period(pgns)
    }

    /// Supported SPNs never received from `source` with a valid value, ascending
    ///
    /// SPNs without a definition cannot be located in a packet and are skipped.
    pub fn collect_not_available_spns(&self, source: u8, packets: &[Packet], supported_spns: &[u32]) -> Vec<u32> {
        let mut missing: Vec<u32> = Vec::new();
        for &spn in supported_spns {
            let Some(def) = self.store.spn(spn) else {
                debug!(spn, "No definition for supported SPN");
                continue;
            };
            let seen = packets
                .iter()
                .filter(|p| p.source == source && p.pgn == def.pgn)
                .any(|p| SpnValue::decode(&def, &p.payload).reading.is_valid());
            if !seen {
                missing.push(spn);
            }
        }
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Like [`Self::collect_not_available_spns`], reporting the list with the
    /// caller's outcome and clause when it is not empty
    pub fn collect_and_report_not_available_spns(
        &self,
        source: u8,
        packets: &[Packet],
        supported_spns: &[u32],
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<String> {
        let missing: Vec<String> = self
            .collect_not_available_spns(source, packets, supported_spns)
            .iter()
            .map(u32::to_string)
            .collect();
        if !missing.is_empty() {
            reporter.add_outcome(
                outcome,
                format!(
                    "{} - Supported SPNs not received with a valid value from {}: {}",
                    section,
                    module_name(source),
                    missing.join(", ")
                ),
            );
        }
        missing
    }

    /// Warn for every (PGN, source) whose largest gap exceeds 110% of its period
    pub fn report_broadcast_periods(&self, map: &PgnPacketMap, reporter: &mut StepReporter, section: &str) -> usize {
        let mut reported = 0;
        for (&pgn, sources) in map {
            let Some(period) = self.store.broadcast_period(pgn) else {
                continue;
            };
            let period_ms = period.as_millis() as i64;
            let label = self.store.pgn(pgn).map(|def| def.acronym).unwrap_or_default();
            for (&source, packets) in sources {
                let mut times: Vec<_> = packets.iter().map(|p| p.timestamp).collect();
                times.sort();
                let Some(gap) = times.windows(2).map(|w| (w[1] - w[0]).num_milliseconds()).max() else {
                    continue;
                };
                if gap * 100 > period_ms * PERIOD_TOLERANCE_PCT {
                    reporter.warn(format!(
                        "{} - Broadcast period of PGN {} ({}) from {} exceeded the maximum expected period: {} ms, expected {} ms",
                        section,
                        pgn,
                        label,
                        module_name(source),
                        gap,
                        period_ms
                    ));
                    reported += 1;
                }
            }
        }
        reported
    }

    /// Warn and raise an urgent notification when another transmitter uses the tool's address
    pub fn report_imposter(&self, detected: bool, reporter: &mut StepReporter, section: &str) -> bool {
        if !detected {
            return false;
        }
        warn!(section, "Another transmitter is using the tool source address");
        let message = format!(
            "Unexpected transmitter using the tool source address 0x{:02X} detected; results of this step are not reliable",
            TOOL_ADDR
        );
        reporter.warn(format!("{} - {}", section, message));
        reporter.urgent(UrgentMessage {
            message,
            title: "Imposter Detected".to_string(),
            severity: Outcome::Warn,
            context: section.to_string(),
        });
        true
    }
}
