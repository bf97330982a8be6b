//! DM26 diagnostic readiness 3 (part 2, step 8)

use async_trait::async_trait;
use j1939_core::{module_name, CompositeSystem, Dm26, Dm5, ParsedPacket};

use super::{Agreement, StepSession, StepState, TestStep};
use crate::composite::CompositeTable;
use crate::error::StepResult;

/// Cross-checks this cycle's readiness against the DM5 support bits
#[derive(Debug, Default)]
pub struct Dm26Step;

/// Monitor state equality; elapsed time moves between requests and is ignored
fn same_readiness(a: &Dm26, b: &Dm26) -> bool {
    a.enabled == b.enabled && a.complete == b.complete && a.warm_ups_since_clear == b.warm_ups_since_clear
}

impl Dm26Step {
    fn check_module(session: &mut StepSession<'_>, dm26: &Dm26) {
        let source = dm26.source();
        let module = module_name(source);
        let dm5 = session.ctx.repository.module(source).and_then(|m| m.latest::<Dm5>());

        if let Some(dm5) = dm5 {
            for monitor in dm26.monitored_systems() {
                let system = monitor.system;
                let supported = dm5.supported.contains(system);
                if !supported && !monitor.complete {
                    session.reporter.fail(format!(
                        "6.2.8.2.a - {} response for {} is not supported in DM5 and not complete in DM26",
                        module, system
                    ));
                } else if supported && !monitor.enabled {
                    let clause = if system == CompositeSystem::ComprehensiveComponent {
                        "6.2.8.2.c"
                    } else {
                        "6.2.8.2.b"
                    };
                    session.reporter.fail(format!(
                        "{} - {} response for {} is supported in DM5 and not enabled in DM26",
                        clause, module, system
                    ));
                }
            }
        }

        if let Some(warm_ups) = dm26.warm_ups_since_clear.filter(|&w| w > 0) {
            session.reporter.fail(format!(
                "6.2.8.2.d - {} reported {} warm-ups since code clear",
                module, warm_ups
            ));
        }

        let engine_start = session
            .ctx
            .repository
            .vehicle_information()
            .and_then(|v| v.engine_start);
        if let (Some(start), Some(reported)) = (engine_start, dm26.time_since_engine_start) {
            let expected = (session.ctx.clock.now() - start).num_seconds();
            let tolerance = session.ctx.config.engine_start_tolerance_secs as i64;
            if (i64::from(reported) - expected).abs() > tolerance {
                session.reporter.fail(format!(
                    "6.2.8.2.e - {} reported time since engine start of {} s, expected {} s",
                    module, reported, expected
                ));
            }
        }
    }
}

#[async_trait]
impl TestStep for Dm26Step {
    fn part(&self) -> u8 {
        2
    }

    fn step(&self) -> u8 {
        8
    }

    fn name(&self) -> &'static str {
        "DM26 Diagnostic Readiness 3"
    }

    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()> {
        let global = session.request_global::<Dm26>("6.2.8.1.a").await?;
        if session.cancelled() {
            return Ok(());
        }
        session.commit();

        session.transition(StepState::PerModuleRequestsInFlight)?;
        for address in session.ctx.repository.obd_addresses() {
            let ds = session.request_ds::<Dm26>(address, "6.2.8.3").await;
            if session.cancelled() {
                return Ok(());
            }
            let agreement = session.report_agreement(
                address,
                global.packet_from(address),
                &ds,
                same_readiness,
                "6.2.8.4.a",
                "6.2.8.4.b",
            );
            if agreement == Agreement::NoResponse {
                session
                    .reporter
                    .fail(format!("6.2.8.3.a - No response was received from {}", module_name(address)));
            }
            if let Some(dm26) = ds.packet_from(address).or(global.packet_from(address)) {
                Self::check_module(session, dm26);
            }
            session.commit();
        }

        session.transition(StepState::Validating)?;
        let composite = CompositeTable::from_dm26(session.ctx.repository.obd_modules());
        session.reporter.add_result(composite.render());
        session.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepContext;
    use chrono::{DateTime, Duration, Utc};
    use j1939_bus::{BusConfig, CommunicationsModule, MockExchangeTransport};
    use j1939_core::{
        pgn, DataRepository, FuelType, ManualClock, Outcome, Packet, RecordingSink, SystemSet, VehicleInformation,
    };
    use std::sync::Arc;
    use CompositeSystem::*;

    fn set(systems: &[CompositeSystem]) -> SystemSet {
        systems.iter().fold(SystemSet::EMPTY, |s, &c| s.with(c))
    }

    /// Engine supporting misfire, CCM and catalyst; everything unsupported is complete
    fn context(engine_start: Option<DateTime<Utc>>) -> (Arc<MockExchangeTransport>, Arc<RecordingSink>, StepContext) {
        let mock = Arc::new(MockExchangeTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let comm = CommunicationsModule::new(mock.clone(), BusConfig::default());

        let mut vehicle = VehicleInformation::new("1FUJGHDV0CLBP8834", 2023, FuelType::Diesel);
        vehicle.engine_start = engine_start;
        let mut repository = DataRepository::new().with_vehicle_information(vehicle);
        repository.mark_obd(0x00);
        let dm5 = Dm5::create(0x00, 0, 0, 0x14, set(&[Misfire, ComprehensiveComponent, Catalyst]), SystemSet::EMPTY);
        repository.record(dm5.packet().clone());

        let clock = ManualClock::new(DateTime::<Utc>::default() + Duration::seconds(600));
        let ctx = StepContext::new(comm, repository, sink.clone(), Arc::new(clock));
        (mock, sink, ctx)
    }

    fn dm26(time: u16, warm_ups: u8, enabled: SystemSet) -> Packet {
        let unsupported = set(&[Misfire, ComprehensiveComponent, Catalyst]).complement();
        Dm26::create(0x00, time, warm_ups, enabled, unsupported).packet().clone()
    }

    fn script(mock: &MockExchangeTransport, packet: Packet) {
        mock.add_global_response(pgn::DM26, [packet.clone()]);
        mock.add_ds_response(pgn::DM26, 0x00, [packet]);
    }

    #[tokio::test]
    async fn test_consistent_readiness_passes() {
        let (mock, sink, mut ctx) = context(Some(DateTime::<Utc>::default()));
        script(&mock, dm26(600, 0, set(&[Misfire, ComprehensiveComponent, Catalyst])));

        ctx.run_step(&Dm26Step).await.unwrap();
        assert!(sink.outcomes().is_empty(), "{:?}", sink.outcomes());
        assert!(sink.results_text().starts_with("Vehicle Composite of DM26:\n"));
    }

    #[tokio::test]
    async fn test_supported_but_not_enabled() {
        let (mock, sink, mut ctx) = context(None);
        script(&mock, dm26(600, 0, set(&[Misfire])));

        ctx.run_step(&Dm26Step).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec![
                "6.2.8.2.b - Engine #1 (0) response for Catalyst is supported in DM5 and not enabled in DM26".to_string(),
                "6.2.8.2.c - Engine #1 (0) response for Comprehensive component is supported in DM5 and not enabled in DM26"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_not_complete() {
        let (mock, sink, mut ctx) = context(None);
        let enabled = set(&[Misfire, ComprehensiveComponent, Catalyst]);
        // EGR is unsupported but reported not complete
        let complete = set(&[Misfire, ComprehensiveComponent, Catalyst]).complement().difference(set(&[EgrVvtSystem]));
        script(&mock, Dm26::create(0x00, 600, 0, enabled, complete).packet().clone());

        ctx.run_step(&Dm26Step).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec!["6.2.8.2.a - Engine #1 (0) response for EGR/VVT system is not supported in DM5 and not complete in DM26"
                .to_string()]
        );
    }

    #[tokio::test]
    async fn test_warm_ups_and_engine_start() {
        let (mock, sink, mut ctx) = context(Some(DateTime::<Utc>::default()));
        script(&mock, dm26(500, 2, set(&[Misfire, ComprehensiveComponent, Catalyst])));

        ctx.run_step(&Dm26Step).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec![
                "6.2.8.2.d - Engine #1 (0) reported 2 warm-ups since code clear".to_string(),
                "6.2.8.2.e - Engine #1 (0) reported time since engine start of 500 s, expected 600 s".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_engine_start_within_tolerance() {
        let (mock, sink, mut ctx) = context(Some(DateTime::<Utc>::default()));
        script(&mock, dm26(592, 0, set(&[Misfire, ComprehensiveComponent, Catalyst])));

        ctx.run_step(&Dm26Step).await.unwrap();
        assert!(sink.outcomes().is_empty());
    }
}
