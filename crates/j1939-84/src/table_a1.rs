//! SPN validation against Table A1
//!
//! Each check is structurally identical across the procedure clauses that cite
//! it, so the caller supplies the clause and the outcome. A given finding is
//! reported once per (check, clause, module, SPN) for the lifetime of the
//! validator, and any packet that triggers a finding is written to the results
//! stream once per step.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use j1939_conv::{SpnStore, SpnValue};
use j1939_core::{module_name, Outcome, Packet, SupportedSpn};
use tracing::debug;

use crate::reporter::StepReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Check {
    NotAvailable,
    Implausible,
    NonObdProvided,
    NotSupported,
}

/// Per-packet SPN checks
pub struct TableA1Validator {
    store: Arc<SpnStore>,
    flagged: HashSet<(Check, String, u8, u32)>,
}

impl TableA1Validator {
    pub fn new(store: Arc<SpnStore>) -> Self {
        Self {
            store,
            flagged: HashSet::new(),
        }
    }

    /// Flag SPNs carried as not available
    ///
    /// Only SPNs the module declared for the data stream count; a module that
    /// declared nothing has every not-available SPN flagged.
    pub fn report_not_available_spns(
        &mut self,
        packet: &Packet,
        supported: &[SupportedSpn],
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<u32> {
        let declared: Vec<u32> = supported.iter().filter(|s| s.data_stream).map(|s| s.spn).collect();
        let mut flagged = Vec::new();
        for value in self.store.decode_packet(packet) {
            if !value.is_not_available() {
                continue;
            }
            if !declared.is_empty() && !declared.contains(&value.spn) {
                continue;
            }
            if self.flag(Check::NotAvailable, section, packet, &value, reporter) {
                reporter.add_outcome(
                    outcome,
                    format!(
                        "{} - N/A value received for SPN {} ({}) from {}",
                        section,
                        value.spn,
                        value.label,
                        module_name(packet.source)
                    ),
                );
                flagged.push(value.spn);
            }
        }
        flagged
    }

    /// Flag values outside the SPN's plausible range
    ///
    /// With `include_not_available` the not-available and error sentinels are
    /// treated as implausible too.
    pub fn report_implausible_spn_values(
        &mut self,
        packet: &Packet,
        include_not_available: bool,
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<u32> {
        let mut flagged = Vec::new();
        for value in self.store.decode_packet(packet) {
            let implausible = match value.reading.value() {
                Some(v) => self.store.spn(value.spn).is_some_and(|def| !def.is_plausible(v)),
                None => include_not_available,
            };
            if implausible && self.flag(Check::Implausible, section, packet, &value, reporter) {
                reporter.add_outcome(
                    outcome,
                    format!(
                        "{} - Value received from {} for SPN {} ({}) is implausible: {}",
                        section,
                        module_name(packet.source),
                        value.spn,
                        value.label,
                        value.reading.format(value.precision)
                    ),
                );
                flagged.push(value.spn);
            }
        }
        flagged
    }

    /// Flag OBD-owned SPNs sent with a valid value by a module that is not an OBD ECU
    pub fn report_non_obd_module_provided_spns(
        &mut self,
        packet: &Packet,
        source_is_obd: bool,
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<u32> {
        if source_is_obd {
            return Vec::new();
        }
        let mut flagged = Vec::new();
        for def in self.store.spns_for_pgn(packet.pgn) {
            if !def.obd {
                continue;
            }
            let value = SpnValue::decode(&def, &packet.payload);
            if value.reading.is_valid() && self.flag(Check::NonObdProvided, section, packet, &value, reporter) {
                reporter.add_outcome(
                    outcome,
                    format!(
                        "{} - Non-OBD ECU {} provided SPN {} ({})",
                        section,
                        module_name(packet.source),
                        value.spn,
                        value.label
                    ),
                );
                flagged.push(value.spn);
            }
        }
        flagged
    }

    /// Flag SPNs with a valid value from more than one packet in the batch
    ///
    /// Packets are counted by (source, PGN), so repeats of the same broadcast
    /// do not count. Each duplicated SPN is reported once.
    pub fn report_duplicate_spns(
        &mut self,
        packets: &[Packet],
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<u32> {
        let mut providers: BTreeMap<u32, BTreeSet<(u8, u32)>> = BTreeMap::new();
        let mut first_packet: BTreeMap<(u8, u32), &Packet> = BTreeMap::new();
        for packet in packets {
            for value in self.store.decode_packet(packet) {
                if value.reading.is_valid() {
                    providers.entry(value.spn).or_default().insert((packet.source, packet.pgn));
                    first_packet.entry((packet.source, packet.pgn)).or_insert(packet);
                }
            }
        }

        let mut flagged = Vec::new();
        for (spn, sources) in providers {
            if sources.len() < 2 {
                continue;
            }
            for key in &sources {
                if let Some(packet) = first_packet.get(key) {
                    self.report_packet_if_not_reported(packet, reporter);
                }
            }
            let names: Vec<String> = sources.iter().map(|(source, _)| module_name(*source)).collect();
            reporter.add_outcome(
                outcome,
                format!("{} - SPN {} provided by more than one module: {}", section, spn, names.join(", ")),
            );
            flagged.push(spn);
        }
        flagged
    }

    /// Flag SPNs with a valid value the module did not declare in DM24
    pub fn report_provided_but_not_supported_spns(
        &mut self,
        packet: &Packet,
        supported: &[SupportedSpn],
        reporter: &mut StepReporter,
        outcome: Outcome,
        section: &str,
    ) -> Vec<u32> {
        if supported.is_empty() {
            return Vec::new();
        }
        let mut flagged = Vec::new();
        for value in self.store.decode_packet(packet) {
            if !value.reading.is_valid() || supported.iter().any(|s| s.spn == value.spn && s.data_stream) {
                continue;
            }
            if self.flag(Check::NotSupported, section, packet, &value, reporter) {
                reporter.add_outcome(
                    outcome,
                    format!(
                        "{} - SPN {} ({}) provided by {} is not supported in its DM24",
                        section,
                        value.spn,
                        value.label,
                        module_name(packet.source)
                    ),
                );
                flagged.push(value.spn);
            }
        }
        flagged
    }

    /// Write `packet` and its decoded SPNs to the results stream unless already written
    pub fn report_packet_if_not_reported(&self, packet: &Packet, reporter: &mut StepReporter) -> bool {
        if reporter.has_packet(packet) {
            return false;
        }
        let mut text = packet.to_string();
        for value in self.store.decode_packet(packet) {
            text.push_str("\n  ");
            text.push_str(&value.to_string());
        }
        reporter.add_packet_result(packet, text)
    }

    fn flag(
        &mut self,
        check: Check,
        section: &str,
        packet: &Packet,
        value: &SpnValue,
        reporter: &mut StepReporter,
    ) -> bool {
        if !self.flagged.insert((check, section.to_string(), packet.source, value.spn)) {
            return false;
        }
        debug!(?check, section, source = packet.source, spn = value.spn, "SPN flagged");
        self.report_packet_if_not_reported(packet, reporter);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j1939_core::RecordingSink;

    const EEC1: u32 = 61444;
    const ET1: u32 = 65262;
    const CCVS1: u32 = 65265;

    fn setup() -> (Arc<RecordingSink>, StepReporter, TableA1Validator) {
        let sink = Arc::new(RecordingSink::new());
        let reporter = StepReporter::new(1, 26, sink.clone());
        let validator = TableA1Validator::new(Arc::new(SpnStore::with_defaults()));
        (sink, reporter, validator)
    }

    fn eec1(source: u8, rpm_raw: u16) -> Packet {
        let rpm = rpm_raw.to_le_bytes();
        Packet::new(EEC1, source, vec![0xFF, 0x7D, 0x7D, rpm[0], rpm[1], 0xFF, 0xFF, 0xFF])
    }

    #[test]
    fn test_not_available_limited_to_declared() {
        let (sink, mut reporter, mut validator) = setup();
        // coolant valid, fuel temp N/A, oil temp N/A
        let packet = Packet::new(ET1, 0, vec![0x82, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let supported = [SupportedSpn::data_stream(110, 1), SupportedSpn::data_stream(174, 1)];

        let flagged = validator.report_not_available_spns(&packet, &supported, &mut reporter, Outcome::Fail, "6.1.26.2.a");
        assert_eq!(flagged, vec![174]);

        // repeated broadcast of the same packet is not reported again
        let again = validator.report_not_available_spns(&packet, &supported, &mut reporter, Outcome::Fail, "6.1.26.2.a");
        assert!(again.is_empty());

        reporter.commit();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec!["6.1.26.2.a - N/A value received for SPN 174 (Engine Fuel 1 Temperature 1) from Engine #1 (0)".to_string()]
        );
        assert_eq!(sink.results().len(), 1);
    }

    #[test]
    fn test_not_available_without_declarations() {
        let (_sink, mut reporter, mut validator) = setup();
        let packet = Packet::new(ET1, 0, vec![0xFF; 8]);
        let flagged = validator.report_not_available_spns(&packet, &[], &mut reporter, Outcome::Warn, "6.1.26.2.a");
        assert_eq!(flagged, vec![110, 174, 175]);
    }

    #[test]
    fn test_implausible_values() {
        let (sink, mut reporter, mut validator) = setup();
        // 5000 rpm is above the 4000 rpm limit
        let packet = eec1(0, 40000);
        let flagged = validator.report_implausible_spn_values(&packet, false, &mut reporter, Outcome::Warn, "6.1.26.2.c");
        assert_eq!(flagged, vec![190]);
        reporter.commit();
        assert_eq!(
            sink.messages(Outcome::Warn),
            vec!["6.1.26.2.c - Value received from Engine #1 (0) for SPN 190 (Engine Speed) is implausible: 5,000.0".to_string()]
        );
    }

    #[test]
    fn test_implausible_includes_not_available_when_asked() {
        let (_sink, mut reporter, mut validator) = setup();
        let packet = Packet::new(ET1, 0, vec![0x82, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(validator
            .report_implausible_spn_values(&packet, false, &mut reporter, Outcome::Warn, "x")
            .is_empty());
        assert_eq!(
            validator.report_implausible_spn_values(&packet, true, &mut reporter, Outcome::Warn, "x"),
            vec![174, 175]
        );
    }

    #[test]
    fn test_non_obd_module_provided() {
        let (_sink, mut reporter, mut validator) = setup();
        let packet = eec1(0x03, 6400);
        assert!(validator
            .report_non_obd_module_provided_spns(&packet, true, &mut reporter, Outcome::Warn, "6.1.26.2.d")
            .is_empty());
        // driver's demand, actual torque, engine speed are OBD-owned
        assert_eq!(
            validator.report_non_obd_module_provided_spns(&packet, false, &mut reporter, Outcome::Warn, "6.1.26.2.d"),
            vec![512, 513, 190]
        );

        // vehicle speed is not OBD-owned
        let ccvs = Packet::new(CCVS1, 0x03, vec![0xFF, 0x00, 0x20, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(validator
            .report_non_obd_module_provided_spns(&ccvs, false, &mut reporter, Outcome::Warn, "6.1.26.2.d")
            .is_empty());
    }

    #[test]
    fn test_duplicate_reported_once_per_batch() {
        let (sink, mut reporter, mut validator) = setup();
        let batch = vec![eec1(0, 6400), eec1(0, 6400), eec1(1, 6400), eec1(1, 6408)];
        let flagged = validator.report_duplicate_spns(&batch, &mut reporter, Outcome::Warn, "6.1.26.2.e");
        assert_eq!(flagged, vec![190, 512, 513]);
        reporter.commit();

        let warnings = sink.messages(Outcome::Warn);
        assert_eq!(warnings.len(), 3);
        assert_eq!(
            warnings[0],
            "6.1.26.2.e - SPN 190 provided by more than one module: Engine #1 (0), Engine #2 (1)"
        );
        // one results entry per distinct (source, PGN)
        assert_eq!(sink.results().len(), 2);
    }

    #[test]
    fn test_same_module_repeats_are_not_duplicates() {
        let (_sink, mut reporter, mut validator) = setup();
        let batch = vec![eec1(0, 6400), eec1(0, 6500), eec1(0, 6600)];
        assert!(validator
            .report_duplicate_spns(&batch, &mut reporter, Outcome::Warn, "6.1.26.2.e")
            .is_empty());
    }

    #[test]
    fn test_provided_but_not_supported() {
        let (sink, mut reporter, mut validator) = setup();
        let packet = eec1(0, 6400);
        let supported = [
            SupportedSpn::data_stream(190, 2),
            SupportedSpn::data_stream(512, 1),
            SupportedSpn::new(513, false, true, false, 1),
        ];
        let flagged =
            validator.report_provided_but_not_supported_spns(&packet, &supported, &mut reporter, Outcome::Fail, "6.1.26.2.f");
        assert_eq!(flagged, vec![513]);
        reporter.commit();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec!["6.1.26.2.f - SPN 513 (Actual Engine - Percent Torque) provided by Engine #1 (0) is not supported in its DM24"
                .to_string()]
        );
    }

    #[test]
    fn test_packet_reported_once() {
        let (sink, mut reporter, validator) = setup();
        let packet = eec1(0, 6400);
        assert!(validator.report_packet_if_not_reported(&packet, &mut reporter));
        assert!(!validator.report_packet_if_not_reported(&packet, &mut reporter));
        reporter.commit();

        let results = sink.results();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("SPN   190, Engine Speed: 800.0 rpm"));
        assert_eq!(reporter.reported_packets(), &[packet]);
    }

    #[test]
    fn test_same_finding_reported_per_clause() {
        let (sink, mut reporter, mut validator) = setup();
        let packet = Packet::new(ET1, 0, vec![0x82, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

        let global = validator.report_implausible_spn_values(&packet, true, &mut reporter, Outcome::Warn, "6.1.26.4.a");
        let ds = validator.report_implausible_spn_values(&packet, true, &mut reporter, Outcome::Warn, "6.1.26.4.b");
        assert_eq!(global, vec![174, 175]);
        assert_eq!(ds, vec![174, 175]);
        assert!(validator
            .report_implausible_spn_values(&packet, true, &mut reporter, Outcome::Warn, "6.1.26.4.b")
            .is_empty());
        reporter.commit();

        let warnings = sink.messages(Outcome::Warn);
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].starts_with("6.1.26.4.a - Value received from Engine #1 (0) for SPN 174"));
        assert!(warnings[2].starts_with("6.1.26.4.b - Value received from Engine #1 (0) for SPN 174"));
        // the packet itself is written once
        assert_eq!(sink.results().len(), 1);
    }

    #[test]
    fn test_discarded_packet_is_written_again() {
        let (sink, mut reporter, mut validator) = setup();
        let packet = eec1(0, 40000);
        validator.report_implausible_spn_values(&packet, false, &mut reporter, Outcome::Warn, "6.1.26.2.c");
        reporter.discard();

        validator.report_duplicate_spns(&[packet.clone(), eec1(1, 6400)], &mut reporter, Outcome::Warn, "6.1.26.2.e");
        reporter.commit();
        assert!(sink.results().iter().any(|r| r.contains("SPN   190, Engine Speed: 5,000.0 rpm")));
        assert_eq!(reporter.reported_packets().len(), 2);
    }
}
