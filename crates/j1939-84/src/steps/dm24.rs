//! DM24 SPN support (part 1, step 4)

use async_trait::async_trait;
use j1939_core::{module_name, Dm24, ParsedPacket};

use super::{compare, Agreement, StepSession, StepState, TestStep};
use crate::error::StepResult;

/// Collects every module's DM24 and stores the declared SPNs
///
/// The DS answer is authoritative; the global answer is used when DS is silent.
#[derive(Debug, Default)]
pub struct Dm24Step;

fn same_declarations(a: &Dm24, b: &Dm24) -> bool {
    a.supported_spns == b.supported_spns
}

#[async_trait]
impl TestStep for Dm24Step {
    fn part(&self) -> u8 {
        1
    }

    fn step(&self) -> u8 {
        4
    }

    fn name(&self) -> &'static str {
        "DM24 SPN Support"
    }

    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()> {
        let global = session.request_global::<Dm24>("6.1.4.1.a").await?;
        if session.cancelled() {
            return Ok(());
        }
        session.commit();

        session.transition(StepState::PerModuleRequestsInFlight)?;
        for address in session.ctx.repository.addresses() {
            let ds = session.request_ds::<Dm24>(address, "6.1.4.2").await;
            if session.cancelled() {
                return Ok(());
            }
            let module = module_name(address);
            let global_dm24 = global.packet_from(address);
            match compare(global_dm24, &ds, address, same_declarations) {
                Agreement::Different => session.reporter.fail(format!(
                    "6.1.4.2.a - Difference in data between DS and global responses from {}",
                    module
                )),
                Agreement::DsMissing => session
                    .reporter
                    .info(format!("6.1.4.2.b - DS response was not received from {}", module)),
                Agreement::GlobalMissing => session
                    .reporter
                    .info(format!("6.1.4.2.b - Global response was not received from {}", module)),
                Agreement::NoResponse if session.ctx.repository.is_obd(address) => session
                    .reporter
                    .fail(format!("6.1.4.2.c - No response was received from {}", module)),
                Agreement::Nack if session.ctx.repository.is_obd(address) => session
                    .reporter
                    .fail(format!("6.1.4.2.c - NACK received for DM24 from OBD ECU {}", module)),
                _ => {}
            }

            if let Some(dm24) = ds.packet_from(address).or(global_dm24) {
                let spns = dm24.supported_spns.clone();
                let listed: Vec<String> = spns.iter().map(|s| s.spn.to_string()).collect();
                session
                    .reporter
                    .add_result(format!("{} supported SPNs: {}", module, listed.join(", ")));
                session.ctx.repository.set_supported_spns(address, spns);
            }
            session.commit();
        }

        session.transition(StepState::Validating)?;
        let empty: Vec<String> = session
            .ctx
            .repository
            .obd_modules()
            .filter(|m| m.latest::<Dm24>().is_some() && m.data_stream_spns().is_empty())
            .map(|m| m.name())
            .collect();
        for module in empty {
            session.reporter.fail(format!(
                "6.1.4.2.d - {} did not declare any SPNs supported for data stream",
                module
            ));
        }
        session.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepContext;
    use j1939_bus::{BusConfig, CommunicationsModule, MockExchangeTransport};
    use j1939_core::{pgn, DataRepository, ManualClock, Outcome, RecordingSink, SupportedSpn};
    use std::sync::Arc;

    fn context() -> (Arc<MockExchangeTransport>, Arc<RecordingSink>, StepContext) {
        let mock = Arc::new(MockExchangeTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let comm = CommunicationsModule::new(mock.clone(), BusConfig::default());
        let mut repository = DataRepository::new();
        repository.mark_obd(0x00);
        repository.mark_obd(0x01);
        let ctx = StepContext::new(comm, repository, sink.clone(), Arc::new(ManualClock::default()));
        (mock, sink, ctx)
    }

    #[tokio::test]
    async fn test_declarations_are_stored() {
        let (mock, sink, mut ctx) = context();
        let engine = Dm24::create(0x00, &[SupportedSpn::data_stream(190, 2), SupportedSpn::data_stream(110, 1)]);
        let engine2 = Dm24::create(0x01, &[SupportedSpn::data_stream(92, 1)]);
        mock.add_global_response(pgn::DM24, [engine.packet().clone(), engine2.packet().clone()]);
        mock.add_ds_response(pgn::DM24, 0x00, [engine.packet().clone()]);
        mock.add_ds_response(pgn::DM24, 0x01, [engine2.packet().clone()]);

        ctx.run_step(&Dm24Step).await.unwrap();
        assert!(sink.outcomes().is_empty());
        assert_eq!(ctx.repository.module(0x00).unwrap().data_stream_spns(), vec![190, 110]);
        assert_eq!(ctx.repository.module(0x01).unwrap().data_stream_spns(), vec![92]);
        assert_eq!(sink.results()[0], "Engine #1 (0) supported SPNs: 190, 110");
    }

    #[tokio::test]
    async fn test_ds_global_difference() {
        let (mock, sink, mut ctx) = context();
        let global = Dm24::create(0x00, &[SupportedSpn::data_stream(190, 2)]);
        let ds = Dm24::create(0x00, &[SupportedSpn::data_stream(190, 2), SupportedSpn::data_stream(110, 1)]);
        mock.add_global_response(pgn::DM24, [global.packet().clone()]);
        mock.add_ds_response(pgn::DM24, 0x00, [ds.packet().clone()]);
        mock.add_ds_response(pgn::DM24, 0x01, [Dm24::create(0x01, &[SupportedSpn::data_stream(92, 1)]).packet().clone()]);

        ctx.run_step(&Dm24Step).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec!["6.1.4.2.a - Difference in data between DS and global responses from Engine #1 (0)".to_string()]
        );
        assert_eq!(
            sink.messages(Outcome::Info),
            vec!["6.1.4.2.b - Global response was not received from Engine #2 (1)".to_string()]
        );
        // DS wins
        assert_eq!(ctx.repository.module(0x00).unwrap().data_stream_spns(), vec![190, 110]);
    }

    #[tokio::test]
    async fn test_obd_module_without_data_stream_spns() {
        let (mock, sink, mut ctx) = context();
        let engine = Dm24::create(0x00, &[SupportedSpn::new(190, false, true, false, 2)]);
        mock.add_global_response(pgn::DM24, [engine.packet().clone()]);
        mock.add_ds_response(pgn::DM24, 0x00, [engine.packet().clone()]);
        let nack = j1939_core::Acknowledgment::create_nack(0x01, pgn::DM24);
        mock.add_ds_response(pgn::DM24, 0x01, [nack.packet().clone()]);

        ctx.run_step(&Dm24Step).await.unwrap();
        assert_eq!(
            sink.messages(Outcome::Fail),
            vec![
                "6.1.4.2.c - NACK received for DM24 from OBD ECU Engine #2 (1)".to_string(),
                "6.1.4.2.d - Engine #1 (0) did not declare any SPNs supported for data stream".to_string(),
            ]
        );
    }
}
