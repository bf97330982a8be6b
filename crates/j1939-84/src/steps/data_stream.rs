//! Data stream verification (part 1, step 26)
//!
//! Listens to the bus for a few periods of the slowest broadcast group the OBD
//! ECUs declared, validates what was heard, then requests the on-request groups
//! still missing before reporting supported SPNs that never showed up.

use std::collections::BTreeSet;

use async_trait::async_trait;
use j1939_core::{module_name, Outcome, Packet};
use tracing::{debug, info};

use super::{StepSession, StepState, TestStep};
use crate::broadcast::BroadcastValidator;
use crate::error::StepResult;
use crate::table_a1::TableA1Validator;

#[derive(Debug, Default)]
pub struct DataStreamStep;

#[async_trait]
impl TestStep for DataStreamStep {
    fn part(&self) -> u8 {
        1
    }

    fn step(&self) -> u8 {
        26
    }

    fn name(&self) -> &'static str {
        "Data Stream Verification"
    }

    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()> {
        let store = session.ctx.store.clone();
        let broadcast = BroadcastValidator::new(store.clone());
        let mut table_a1 = TableA1Validator::new(store.clone());

        let supported: BTreeSet<u32> = session
            .ctx
            .repository
            .obd_modules()
            .flat_map(|m| m.data_stream_spns())
            .collect();
        let supported: Vec<u32> = supported.into_iter().collect();
        let broadcast_pgns = broadcast.collect_non_on_request_pgns(&supported);
        let window = session
            .ctx
            .config
            .broadcast_window(broadcast.maximum_broadcast_period(&broadcast_pgns));

        session
            .reporter
            .progress(&format!("Reading bus for {} seconds", window.as_secs_f64()));
        let capture = session.ctx.comm.read_bus(window, "6.1.26.1").await;
        session.record_raw(&capture.packets);
        info!(packets = capture.packets.len(), cancelled = capture.cancelled, "Bus capture finished");
        if session.cancelled() {
            return Ok(());
        }

        broadcast.report_imposter(session.ctx.comm.imposter_detected(), &mut session.reporter, "6.1.26.3.a");
        let map = BroadcastValidator::build_pgn_packet_map(&capture.packets);
        broadcast.report_broadcast_periods(&map, &mut session.reporter, "6.1.26.2.f");
        session.commit();

        for address in session.ctx.repository.addresses() {
            let packets: Vec<&Packet> = capture.packets.iter().filter(|p| p.source == address).collect();
            if packets.is_empty() {
                continue;
            }
            let is_obd = session.ctx.repository.is_obd(address);
            let declared = session.ctx.repository.supported_spns(address).to_vec();
            for packet in packets {
                let reporter = &mut session.reporter;
                if is_obd {
                    table_a1.report_not_available_spns(packet, &declared, reporter, Outcome::Fail, "6.1.26.2.a");
                }
                table_a1.report_implausible_spn_values(packet, false, reporter, Outcome::Warn, "6.1.26.2.b");
                table_a1.report_non_obd_module_provided_spns(packet, is_obd, reporter, Outcome::Warn, "6.1.26.2.c");
                if is_obd {
                    table_a1.report_provided_but_not_supported_spns(
                        packet,
                        &declared,
                        reporter,
                        Outcome::Fail,
                        "6.1.26.2.e",
                    );
                }
            }
            session.commit();
        }
        table_a1.report_duplicate_spns(&capture.packets, &mut session.reporter, Outcome::Warn, "6.1.26.2.d");
        session.commit();

        // on-request groups carrying SPNs the broadcast did not deliver
        let mut received = capture.packets.clone();
        let mut missing: BTreeSet<u32> = BTreeSet::new();
        for module in session.ctx.repository.obd_modules() {
            let spns = module.data_stream_spns();
            let absent = broadcast.collect_not_available_spns(module.address, &capture.packets, &spns);
            missing.extend(absent);
        }
        let covered: Vec<u32> = map.keys().copied().collect();
        let missing: Vec<u32> = missing.into_iter().collect();
        let request_pgns = store.pgns_for_ds_request(&covered, &missing);
        debug!(?request_pgns, "On-request groups to query");

        let labels: Vec<(u32, String)> = request_pgns
            .iter()
            .map(|&pgn| (pgn, store.pgn(pgn).map(|d| d.acronym).unwrap_or_else(|| pgn.to_string())))
            .collect();

        if !labels.is_empty() {
            session.transition(StepState::GlobalRequestSent)?;
        }
        for (pgn, label) in &labels {
            session.reporter.progress(&format!("Global {} Request", label));
            let global = session.ctx.comm.request_global_raw(*pgn).await;
            if session.cancelled() {
                return Ok(());
            }
            session.record_raw(&global.packets);
            for packet in &global.packets {
                table_a1.report_packet_if_not_reported(packet, &mut session.reporter);
                table_a1.report_implausible_spn_values(packet, true, &mut session.reporter, Outcome::Warn, "6.1.26.4.a");
            }
            received.extend(global.packets.iter().cloned());
            session.commit();
        }

        if !labels.is_empty() {
            session.transition(StepState::PerModuleRequestsInFlight)?;
        }
        for address in session.ctx.repository.obd_addresses() {
            let declared = session
                .ctx
                .repository
                .module(address)
                .map(|m| m.data_stream_spns())
                .unwrap_or_default();
            for (pgn, label) in &labels {
                if !store.spns_for_pgn(*pgn).iter().any(|def| declared.contains(&def.spn)) {
                    continue;
                }
                let text = format!("Requesting {} from {}", label, module_name(address));
                session.reporter.progress(&text);
                let ds = session.ctx.comm.request_ds_raw(*pgn, address, &text).await;
                if session.cancelled() {
                    return Ok(());
                }
                session.record_raw(&ds.packets);
                for packet in &ds.packets {
                    table_a1.report_packet_if_not_reported(packet, &mut session.reporter);
                    table_a1.report_implausible_spn_values(packet, true, &mut session.reporter, Outcome::Warn, "6.1.26.4.b");
                }
                received.extend(ds.packets.iter().cloned());
            }
            session.commit();
        }

        session.transition(StepState::Validating)?;
        let obd: Vec<(u8, Vec<u32>)> = session
            .ctx
            .repository
            .obd_modules()
            .map(|m| (m.address, m.data_stream_spns()))
            .collect();
        for (address, spns) in obd {
            broadcast.collect_and_report_not_available_spns(
                address,
                &received,
                &spns,
                &mut session.reporter,
                Outcome::Fail,
                "6.1.26.5.a",
            );
        }
        session.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepContext;
    use j1939_bus::{BusConfig, CommunicationsModule, MockExchangeTransport, RequestKind};
    use j1939_core::{DataRepository, ManualClock, RecordingSink, SupportedSpn};
    use std::sync::Arc;
    use std::time::Duration;

    const EEC1: u32 = 61444;
    const HOURS: u32 = 65253;
    const ET1: u32 = 65262;
    const AMB: u32 = 65269;

    fn context() -> (Arc<MockExchangeTransport>, Arc<RecordingSink>, StepContext) {
        let mock = Arc::new(MockExchangeTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let comm = CommunicationsModule::new(mock.clone(), BusConfig::default());
        let mut repository = DataRepository::new();
        repository.mark_obd(0x00);
        repository.set_supported_spns(
            0x00,
            vec![
                SupportedSpn::data_stream(190, 2),
                SupportedSpn::data_stream(110, 1),
                SupportedSpn::data_stream(247, 4),
                SupportedSpn::data_stream(108, 1),
            ],
        );
        let ctx = StepContext::new(comm, repository, sink.clone(), Arc::new(ManualClock::default()));
        (mock, sink, ctx)
    }

    fn broadcast() -> Vec<Packet> {
        vec![
            // 1600 rpm, torques not available
            Packet::new(EEC1, 0x00, vec![0xFF, 0xFF, 0xFF, 0x00, 0x32, 0xFF, 0xFF, 0xFF]),
            // 90 °C coolant
            Packet::new(ET1, 0x00, vec![0x82, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
        ]
    }

    #[tokio::test]
    async fn test_on_request_follow_up() {
        let (mock, sink, mut ctx) = context();
        mock.set_broadcast(broadcast());
        mock.add_global_response(HOURS, [Packet::new(HOURS, 0x00, vec![0x10, 0x27, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF])]);
        // barometric pressure not available, ambient temperature 23 °C
        mock.add_ds_response(AMB, 0x00, [Packet::new(AMB, 0x00, vec![0xFF, 0xFF, 0xFF, 0x00, 0x25, 0xFF, 0xFF, 0xFF])]);

        let summary = ctx.run_step(&DataStreamStep).await.unwrap();
        assert!(!summary.cancelled);

        let requests = mock.requests();
        assert_eq!(
            requests[0].kind,
            RequestKind::ReadBus {
                duration: Duration::from_secs(3),
                section: "6.1.26.1".to_string()
            }
        );
        let pgns: Vec<Option<u32>> = requests[1..].iter().map(|r| r.pgn()).collect();
        assert_eq!(pgns, vec![Some(HOURS), Some(AMB), Some(HOURS), Some(AMB)]);

        assert_eq!(
            sink.messages(Outcome::Warn),
            vec!["6.1.26.4.b - Value received from Engine #1 (0) for SPN 108 (Barometric Pressure) is implausible: N/A".to_string()]
        );
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec!["6.1.26.5.a - Supported SPNs not received with a valid value from Engine #1 (0): 108".to_string()]
        );
    }

    #[tokio::test]
    async fn test_global_and_ds_findings_both_reported() {
        let (mock, sink, mut ctx) = context();
        mock.set_broadcast(broadcast());
        let hours = Packet::new(HOURS, 0x00, vec![0xFF; 8]);
        mock.add_global_response(HOURS, [hours.clone()]);
        mock.add_ds_response(HOURS, 0x00, [hours]);

        ctx.run_step(&DataStreamStep).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Warn),
            vec![
                "6.1.26.4.a - Value received from Engine #1 (0) for SPN 247 (Engine Total Hours of Operation) is implausible: N/A"
                    .to_string(),
                "6.1.26.4.b - Value received from Engine #1 (0) for SPN 247 (Engine Total Hours of Operation) is implausible: N/A"
                    .to_string(),
            ]
        );
        // one entry per response; the DS copy is addressed to the tool
        let hours_results = sink.results().iter().filter(|r| r.contains("SPN   247")).count();
        assert_eq!(hours_results, 2);
    }

    #[tokio::test]
    async fn test_broadcast_not_available_and_unsupported() {
        let (mock, sink, mut ctx) = context();
        mock.set_broadcast(vec![
            // engine speed not available, actual torque provided but not declared
            Packet::new(EEC1, 0x00, vec![0xFF, 0xFF, 0x7D, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            Packet::new(ET1, 0x00, vec![0x82, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
        ]);
        mock.add_global_response(HOURS, [Packet::new(HOURS, 0x00, vec![0x10, 0x27, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF])]);
        mock.add_global_response(AMB, [Packet::new(AMB, 0x00, vec![0xC8, 0xFF, 0xFF, 0x00, 0x25, 0xFF, 0xFF, 0xFF])]);

        ctx.run_step(&DataStreamStep).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec![
                "6.1.26.2.a - N/A value received for SPN 190 (Engine Speed) from Engine #1 (0)".to_string(),
                "6.1.26.2.e - SPN 513 (Actual Engine - Percent Torque) provided by Engine #1 (0) is not supported in its DM24"
                    .to_string(),
                "6.1.26.5.a - Supported SPNs not received with a valid value from Engine #1 (0): 190".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_imposter_warns() {
        let (mock, sink, mut ctx) = context();
        mock.set_broadcast(broadcast());
        mock.set_imposter(true);

        ctx.run_step(&DataStreamStep).await.unwrap();
        assert_eq!(sink.urgent_messages().len(), 1);
        assert!(sink.messages(Outcome::Warn)[0].starts_with("6.1.26.3.a - Unexpected transmitter"));
    }

    #[tokio::test]
    async fn test_cancel_during_capture() {
        let (mock, sink, mut ctx) = context();
        mock.set_broadcast(broadcast());
        mock.cancel_capture_after(1, ctx.comm.cancellation_token());

        let summary = ctx.run_step(&DataStreamStep).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.state, crate::steps::StepState::Done);
        assert!(sink.outcomes().is_empty());
        assert_eq!(mock.requests().len(), 1);

        let engine = ctx.repository.module(0x00).unwrap();
        assert!(engine.latest_packet(EEC1).is_some());
        assert!(engine.latest_packet(ET1).is_none());
    }
}
