//! Step orchestration
//!
//! A step walks `Idle → GlobalRequestSent → PerModuleRequestsInFlight →
//! Validating → Done`. Exchanges run one at a time; the global request always
//! precedes the destination-specific ones, which follow module discovery order.
//! Cancellation is checked after every exchange and moves the step straight to
//! `Done`, dropping whatever was staged for the module in flight.

mod data_stream;
mod dm24;
mod dm26;
mod dm5;
mod tracking;

pub use data_stream::DataStreamStep;
pub use dm24::Dm24Step;
pub use dm26::Dm26Step;
pub use dm5::Dm5Step;
pub use tracking::TrackingStep;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use j1939_bus::{CommunicationsModule, RequestResult, ResponseKind};
use j1939_conv::SpnStore;
use j1939_core::{module_name, Clock, DataRepository, OutcomeRecord, OutcomeSink, Packet, ParsedPacket};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ValidationConfig;
use crate::error::{StepError, StepResult};
use crate::reporter::StepReporter;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StepState {
    Idle,
    GlobalRequestSent,
    PerModuleRequestsInFlight,
    Validating,
    Done,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepState::Idle => "Idle",
            StepState::GlobalRequestSent => "GlobalRequestSent",
            StepState::PerModuleRequestsInFlight => "PerModuleRequestsInFlight",
            StepState::Validating => "Validating",
            StepState::Done => "Done",
        };
        f.write_str(name)
    }
}

/// One test step of the procedure
#[async_trait]
pub trait TestStep: Send + Sync {
    fn part(&self) -> u8;

    fn step(&self) -> u8;

    fn name(&self) -> &'static str;

    /// Run the exchanges and rules; returning early after a cancellation is fine
    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()>;
}

/// What a finished step produced
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub part: u8,
    pub step: u8,
    pub name: String,
    pub state: StepState,
    pub cancelled: bool,
    pub outcomes: Vec<OutcomeRecord>,
}

impl StepSummary {
    pub fn to_json(&self) -> StepResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collaborators shared by all steps of a run
pub struct StepContext {
    pub comm: CommunicationsModule,
    pub repository: DataRepository,
    pub store: Arc<SpnStore>,
    pub clock: Arc<dyn Clock>,
    pub config: ValidationConfig,
    sink: Arc<dyn OutcomeSink>,
}

impl StepContext {
    pub fn new(
        comm: CommunicationsModule,
        repository: DataRepository,
        sink: Arc<dyn OutcomeSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            comm,
            repository,
            store: Arc::new(SpnStore::with_defaults()),
            clock,
            config: ValidationConfig::default(),
            sink,
        }
    }

    pub fn with_store(mut self, store: Arc<SpnStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one step to `Done`
    pub async fn run_step(&mut self, step: &dyn TestStep) -> StepResult<StepSummary> {
        info!(part = step.part(), step = step.step(), name = step.name(), "Starting step");
        let reporter = StepReporter::new(step.part(), step.step(), self.sink.clone());
        let mut session = StepSession {
            ctx: self,
            reporter,
            state: StepState::Idle,
            cancelled: false,
        };

        let result = step.run(&mut session).await;
        session.finish();
        result?;

        let summary = StepSummary {
            part: step.part(),
            step: step.step(),
            name: step.name().to_string(),
            state: session.state,
            cancelled: session.cancelled,
            outcomes: session.reporter.committed().to_vec(),
        };
        info!(
            part = summary.part,
            step = summary.step,
            outcomes = summary.outcomes.len(),
            cancelled = summary.cancelled,
            "Step done"
        );
        Ok(summary)
    }
}

/// How a module's DS answer relates to its global answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    /// Both present and equal
    Same,
    /// Both present, data differs
    Different,
    /// Global carried data, DS did not
    DsMissing,
    /// DS carried data, global did not
    GlobalMissing,
    /// No data either way, but the module NACKed
    Nack,
    /// Silence on both
    NoResponse,
}

/// Compare a module's global and DS answers
pub fn compare<T: ParsedPacket>(
    global: Option<&T>,
    ds: &RequestResult<T>,
    address: u8,
    same: impl Fn(&T, &T) -> bool,
) -> Agreement {
    match (global, ds.packet_from(address)) {
        (Some(g), Some(d)) if same(g, d) => Agreement::Same,
        (Some(_), Some(_)) => Agreement::Different,
        (Some(_), None) => Agreement::DsMissing,
        (None, Some(_)) => Agreement::GlobalMissing,
        (None, None) if ds.kind() == ResponseKind::Nack => Agreement::Nack,
        (None, None) => Agreement::NoResponse,
    }
}

/// Payload equality, ignoring timestamps and addressing
pub fn same_payload<T: ParsedPacket>(a: &T, b: &T) -> bool {
    a.packet().same_data(b.packet())
}

/// A step in progress: the shared context, the state machine and the staged outcomes
pub struct StepSession<'a> {
    pub ctx: &'a mut StepContext,
    pub reporter: StepReporter,
    state: StepState,
    cancelled: bool,
}

impl<'a> StepSession<'a> {
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Move forward; states may be skipped but never revisited
    pub fn transition(&mut self, next: StepState) -> StepResult<()> {
        if next < self.state || self.state == StepState::Done {
            return Err(StepError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        if next != self.state {
            debug!(from = %self.state, to = %next, "Step transition");
            self.state = next;
        }
        Ok(())
    }

    /// Check the stop token; on cancellation drop staged work and go to `Done`
    pub fn cancelled(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if !self.ctx.comm.is_cancelled() {
            return false;
        }
        info!(
            part = self.reporter.part(),
            step = self.reporter.step(),
            state = %self.state,
            "Step cancelled"
        );
        self.reporter.discard();
        self.state = StepState::Done;
        self.cancelled = true;
        true
    }

    /// Forward staged outcomes for a finished unit of work
    pub fn commit(&mut self) {
        if !self.cancelled() {
            self.reporter.commit();
        }
    }

    fn finish(&mut self) {
        self.commit();
        self.state = StepState::Done;
    }

    /// Global request for `T`, with the checks every global exchange gets
    ///
    /// Responses are recorded in the repository. Decode failures and
    /// acknowledgments other than NACK are failures; silence is a failure
    /// with the "did not receive any response packets" text.
    pub async fn request_global<T: ParsedPacket>(&mut self, section: &str) -> StepResult<RequestResult<T>> {
        self.transition(StepState::GlobalRequestSent)?;
        self.reporter.progress(&format!("Global {} Request", T::NAME));
        let result = self.ctx.comm.request_global::<T>().await;
        self.record(&result);
        self.report_exchange_problems(&result, section);
        for ack in result.acks.iter().filter(|a| !a.is_nack()) {
            self.reporter.fail(format!(
                "{} - Response received to global query from {} is not a NACK",
                section,
                module_name(ack.source())
            ));
        }
        if result.packets.is_empty() && !result.cancelled {
            self.reporter.fail(format!(
                "{} - Global {} request did not receive any response packets",
                section,
                T::NAME
            ));
        }
        Ok(result)
    }

    /// Destination-specific request for `T`; responses are recorded
    pub async fn request_ds<T: ParsedPacket>(&mut self, address: u8, section: &str) -> RequestResult<T> {
        self.reporter
            .progress(&format!("Requesting {} from {}", T::NAME, module_name(address)));
        let result = self.ctx.comm.request_ds::<T>(address).await;
        self.record(&result);
        self.report_exchange_problems(&result, section);
        result
    }

    fn record<T: ParsedPacket>(&mut self, result: &RequestResult<T>) {
        for packet in &result.packets {
            self.ctx.repository.record(packet.packet().clone());
        }
    }

    /// Record raw responses (arrays, on-request groups)
    pub fn record_raw(&mut self, packets: &[Packet]) {
        for packet in packets {
            self.ctx.repository.record(packet.clone());
        }
    }

    fn report_exchange_problems<T>(&mut self, result: &RequestResult<T>, section: &str) {
        for (source, error) in &result.errors {
            self.reporter.fail(format!(
                "{} - Unable to decode response from {}: {}",
                section,
                module_name(*source),
                error
            ));
        }
    }

    /// Report the usual outcomes of a DS/global comparison
    ///
    /// `difference` is the clause for a data mismatch, `missing` the clause for
    /// one-sided answers. Returns the agreement for step-specific follow-up.
    pub fn report_agreement<T: ParsedPacket>(
        &mut self,
        address: u8,
        global: Option<&T>,
        ds: &RequestResult<T>,
        same: impl Fn(&T, &T) -> bool,
        difference: &str,
        missing: &str,
    ) -> Agreement {
        let agreement = compare(global, ds, address, same);
        let module = module_name(address);
        match agreement {
            Agreement::Different => self.reporter.fail(format!(
                "{} - Difference compared to data received during global request from {}",
                difference, module
            )),
            Agreement::DsMissing => self
                .reporter
                .info(format!("{} - DS response was not received from {}", missing, module)),
            Agreement::GlobalMissing => self
                .reporter
                .info(format!("{} - Global response was not received from {}", missing, module)),
            Agreement::Same | Agreement::Nack | Agreement::NoResponse => {}
        }
        agreement
    }
}
