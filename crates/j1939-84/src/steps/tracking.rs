//! GHG and NOx tracking arrays (part 1, step 26, clauses 6.1.26.6 onward)
//!
//! Every applicable array is requested globally for its lifetime group, then
//! from each OBD module (plus Engine #1) for all three timeframes. Each module
//! gets one table per array; a column whose response never arrived stays blank.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use j1939_bus::RequestResult;
use j1939_conv::{
    render_nox_table, render_timeframe_table, ArrayDefinition, EngineeringArray, Timeframe, ACTIVE_TECHNOLOGY,
    GHG_TRACKING, HYBRID_CHG_DEPLETING, NOX_QUANTITIES,
};
use j1939_core::{address, module_name, Outcome, Packet, VehicleInformation};
use tracing::{debug, info};

use super::{StepSession, StepState, TestStep};
use crate::config::ValidationConfig;
use crate::error::StepResult;

/// A group of arrays reported together
#[derive(Debug, Clone)]
struct Category {
    clause: &'static str,
    arrays: Vec<&'static ArrayDefinition>,
    /// Rendered as NOx binning tables (one per timeframe)
    binned: bool,
    /// Outcome for a module that never answered the lifetime request
    absence: Outcome,
}

impl Category {
    fn single(clause: &'static str, array: &'static ArrayDefinition, absence: Outcome) -> Self {
        Self {
            clause,
            arrays: vec![array],
            binned: false,
            absence,
        }
    }
}

/// Arrays the vehicle must report, by model year and fuel type
fn applicable_categories(vehicle: &VehicleInformation, config: &ValidationConfig) -> Vec<Category> {
    let year = vehicle.engine_model_year;
    if year < config.ghg_tracking_model_year {
        return Vec::new();
    }
    let absence = if year >= config.tracking_fail_model_year {
        Outcome::Fail
    } else {
        Outcome::Warn
    };

    let mut categories = vec![Category::single("6.1.26.6", &GHG_TRACKING, Outcome::Fail)];
    if vehicle.fuel_type.is_hybrid() {
        categories.push(Category::single("6.1.26.8", &HYBRID_CHG_DEPLETING, absence));
    }
    categories.push(Category::single("6.1.26.10", &ACTIVE_TECHNOLOGY, absence));
    if vehicle.fuel_type.is_compression_ignition() {
        categories.push(Category {
            clause: "6.1.26.12",
            arrays: NOX_QUANTITIES.iter().map(|q| &q.array).collect(),
            binned: true,
            absence,
        });
    }
    categories
}

/// Decoded columns of one array, in [`Timeframe::ALL`] order
type Columns = [Option<EngineeringArray>; 3];

/// Requests, cross-checks and renders the tracking arrays
#[derive(Debug, Default)]
pub struct TrackingStep;

#[async_trait]
impl TestStep for TrackingStep {
    fn part(&self) -> u8 {
        1
    }

    fn step(&self) -> u8 {
        26
    }

    fn name(&self) -> &'static str {
        "GHG and NOx Tracking Arrays"
    }

    async fn run(&self, session: &mut StepSession<'_>) -> StepResult<()> {
        let Some(vehicle) = session.ctx.repository.vehicle_information().cloned() else {
            info!("No vehicle information, tracking arrays skipped");
            return Ok(());
        };
        let categories = applicable_categories(&vehicle, &session.ctx.config);
        if categories.is_empty() {
            debug!(model_year = vehicle.engine_model_year, "Tracking arrays not applicable");
            return Ok(());
        }

        session.transition(StepState::GlobalRequestSent)?;
        let mut globals: HashMap<u32, RequestResult<Packet>> = HashMap::new();
        for array in categories.iter().flat_map(|c| c.arrays.iter()) {
            session
                .reporter
                .progress(&format!("Global {} {} Request", array.name, Timeframe::Lifetime));
            let result = session.ctx.comm.request_global_raw(array.lifetime_pgn).await;
            session.record_raw(&result.packets);
            if session.cancelled() {
                return Ok(());
            }
            globals.insert(array.lifetime_pgn, result);
        }
        session.commit();

        let responders: BTreeSet<u8> = globals
            .values()
            .flat_map(|r| r.packets.iter().map(|p| p.source))
            .collect();
        let targets: Vec<u8> = session
            .ctx
            .repository
            .obd_addresses()
            .into_iter()
            .filter(|a| *a == address::ENGINE_1 || responders.contains(a))
            .collect();

        session.transition(StepState::PerModuleRequestsInFlight)?;
        for address in targets {
            for category in &categories {
                let Some(columns) = request_category(session, category, address, &globals).await else {
                    return Ok(());
                };
                render(session, category, address, &columns);
            }
            session.commit();
        }

        session.transition(StepState::Validating)?;
        Ok(())
    }
}

/// DS requests for every array of `category`; `None` once cancelled
async fn request_category(
    session: &mut StepSession<'_>,
    category: &Category,
    address: u8,
    globals: &HashMap<u32, RequestResult<Packet>>,
) -> Option<Vec<Columns>> {
    let module = module_name(address);
    let mut columns = Vec::with_capacity(category.arrays.len());
    let mut different = false;
    let mut ds_missing = false;
    let mut global_missing = false;

    for array in &category.arrays {
        let mut decoded: Columns = [None, None, None];
        for (slot, timeframe) in Timeframe::ALL.iter().enumerate() {
            let label = format!("Requesting {} {} from {}", array.name, timeframe, module);
            session.reporter.progress(&label);
            let ds = session.ctx.comm.request_ds_raw(array.pgn(*timeframe), address, &label).await;
            session.record_raw(&ds.packets);
            if session.cancelled() {
                return None;
            }

            let ds_packet = ds.raw_from(address);
            let packet = if *timeframe == Timeframe::Lifetime {
                let global = globals.get(&array.lifetime_pgn).and_then(|g| g.raw_from(address));
                match (global, ds_packet) {
                    (Some(g), Some(d)) if !g.same_data(d) => different = true,
                    (Some(_), None) => ds_missing = true,
                    (None, Some(_)) => global_missing = true,
                    _ => {}
                }
                ds_packet.or(global)
            } else {
                ds_packet
            };
            decoded[slot] = packet.map(|p| array.decode(p));
        }
        columns.push(decoded);
    }

    let clause = category.clause;
    if different {
        session.reporter.fail(format!(
            "{}.b - Difference compared to data received during global request from {}",
            clause, module
        ));
    }
    if ds_missing {
        session
            .reporter
            .info(format!("{}.b - DS response was not received from {}", clause, module));
    }
    if global_missing {
        session
            .reporter
            .info(format!("{}.b - Global response was not received from {}", clause, module));
    }
    if columns.iter().any(|c| c[0].is_none()) {
        session.reporter.add_outcome(
            category.absence,
            format!("{}.a - No response was received from {}", clause, module),
        );
    }
    Some(columns)
}

fn render(session: &mut StepSession<'_>, category: &Category, address: u8, columns: &[Columns]) {
    if columns.iter().flatten().all(Option::is_none) {
        return;
    }
    let module = module_name(address);

    if category.binned {
        session.reporter.add_result(format!("NOx Binning from {}", module));
        for (slot, timeframe) in Timeframe::ALL.iter().enumerate() {
            let arrays: Vec<Option<&EngineeringArray>> = columns.iter().map(|c| c[slot].as_ref()).collect();
            session
                .reporter
                .add_result(render_nox_table(*timeframe, &NOX_QUANTITIES, &arrays));
        }
        return;
    }

    for (array, decoded) in category.arrays.iter().zip(columns) {
        session.reporter.add_result(format!("{} from {}", array.name, module));
        session
            .reporter
            .add_result(render_timeframe_table([decoded[0].as_ref(), decoded[1].as_ref(), decoded[2].as_ref()]));
    }
}
