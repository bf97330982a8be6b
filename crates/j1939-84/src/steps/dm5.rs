//! DM5 diagnostic readiness (part 1, step 3)

use std::collections::BTreeSet;

use async_trait::async_trait;
use j1939_core::{module_name, Dm5, ParsedPacket};
use tracing::debug;

use super::{same_payload, Agreement, StepSession, StepState, TestStep};
use crate::composite::{multiply_supported, CompositeTable, ModuleReadiness};
use crate::error::StepResult;

/// Requests DM5 globally and from every known module, then checks readiness
///
/// Modules answering with an OBD compliance value become the OBD ECUs the
/// later steps work with.
#[derive(Debug, Default)]
pub struct Dm5Step;

#[async_trait]
impl TestStep for Dm5Step {
    fn part(&self) -> u8 {
        1
    }

    fn step(&self) -> u8 {
        3
    }

    fn name(&self) -> &'static str {
        "DM5 Diagnostic Readiness 1"
    }

    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()> {
        let global = session.request_global::<Dm5>("6.1.3.2.a").await?;
        if session.cancelled() {
            return Ok(());
        }

        for dm5 in &global.packets {
            let source = dm5.source();
            if dm5.is_obd() {
                session.ctx.repository.mark_obd(source);
            } else if session.ctx.repository.is_obd(source) {
                session.reporter.fail(format!(
                    "6.1.3.2.c - OBD ECU {} reported OBD compliance value of {}",
                    module_name(source),
                    dm5.obd_compliance
                ));
            }
        }
        session.commit();

        session.transition(StepState::PerModuleRequestsInFlight)?;
        for address in session.ctx.repository.addresses() {
            let ds = session.request_ds::<Dm5>(address, "6.1.3.4").await;
            if session.cancelled() {
                return Ok(());
            }
            let agreement = session.report_agreement(
                address,
                global.packet_from(address),
                &ds,
                same_payload,
                "6.1.3.4.a",
                "6.1.3.4.b",
            );
            if agreement == Agreement::NoResponse && session.ctx.repository.is_obd(address) {
                session
                    .reporter
                    .fail(format!("6.1.3.4.b - No response was received from {}", module_name(address)));
            }
            session.commit();
        }

        session.transition(StepState::Validating)?;
        let obd: Vec<Dm5> = session
            .ctx
            .repository
            .obd_modules()
            .filter_map(|m| m.latest::<Dm5>())
            .collect();
        debug!(obd_modules = obd.len(), "Validating DM5");

        let readiness: Vec<ModuleReadiness> = obd.iter().map(ModuleReadiness::from).collect();
        let composite = CompositeTable::from_dm5(session.ctx.repository.obd_modules());
        session.reporter.add_result(composite.render());

        for dm5 in &obd {
            let module = module_name(dm5.source());
            if dm5.active_count != 0 {
                session
                    .reporter
                    .fail(format!("6.1.3.2.b - {} reported active DTC count not = 0", module));
            }
            if dm5.previously_active_count != 0 {
                session
                    .reporter
                    .fail(format!("6.1.3.2.b - {} reported previously active DTC count not = 0", module));
            }
        }

        let compliance: BTreeSet<u8> = obd.iter().map(|dm5| dm5.obd_compliance).collect();
        if compliance.len() > 1 {
            session
                .reporter
                .warn("6.1.3.3.a - OBD ECUs report different OBD compliance values");
        }

        for system in multiply_supported(&readiness).iter() {
            session
                .reporter
                .warn(format!("6.1.3.3.b - {} is supported by more than one OBD ECU", system));
        }
        session.commit();
        Ok(())
    }
}
