//! One planning run, from request to written batch.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::config::PlannerConfig;
use crate::log_changes;
use crate::models::{Affiliation, Assignment, LastDutyUpdate, Role, Wing};
use crate::planner::{
    AssignmentPlanner, BatchError, HistoryIndex, PersistenceBatcher, RoomBlockAllocator,
    RunSummary, SupervisorPool,
};
use crate::prioritizer::prioritize_buildings;
use crate::repository::{DutyStore, RepositoryError};
use crate::request::{PlanRequest, RawPlanRequest, RequestError};
use crate::sheet::{build_sheets, BuildingSheet};

/// Errors that abort a planning run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("No eligible buildings for category {0}")]
    NoBuildings(Wing),
    #[error("No eligible {role} supervisors for category {wing}")]
    NoSupervisors { wing: Wing, role: Role },
    #[error("Reading snapshot failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Saving the plan failed: {0}")]
    Persistence(String),
}

impl From<RequestError> for PlanError {
    fn from(e: RequestError) -> Self {
        PlanError::Validation(e.to_string())
    }
}

impl From<BatchError> for PlanError {
    fn from(e: BatchError) -> Self {
        PlanError::Persistence(e.to_string())
    }
}

/// What a successful run produced and wrote.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PlanOutcome {
    pub summary: RunSummary,
    /// Every assignment in the range, reused and new
    pub assignments: Vec<Assignment>,
    pub supervisor_updates: Vec<LastDutyUpdate>,
    pub sheets: Vec<BuildingSheet>,
}

/// Validate `raw` and run it against `store`.
pub fn run_duty_plan<S: DutyStore + ?Sized>(
    raw: &RawPlanRequest,
    config: &PlannerConfig,
    store: &mut S,
) -> Result<PlanOutcome, PlanError> {
    config.validate().map_err(PlanError::Validation)?;
    let request = PlanRequest::from_raw(raw)?;
    plan_request(&request, config, store)
}

/// Run an already validated request.
///
/// Reads the snapshot once, plans in memory and writes one batch. A failure
/// before the batch leaves the store untouched.
pub fn plan_request<S: DutyStore + ?Sized>(
    request: &PlanRequest,
    config: &PlannerConfig,
    store: &mut S,
) -> Result<PlanOutcome, PlanError> {
    let verbosity = config.verbosity;
    let wing = request.wing;

    let buildings = store.find_eligible_buildings(wing, &request.exclude_buildings)?;
    if buildings.is_empty() {
        return Err(PlanError::NoBuildings(wing));
    }
    let buildings = prioritize_buildings(buildings, config);

    let excluded: Vec<Affiliation> = config
        .excluded_affiliations
        .iter()
        .filter_map(|a| Affiliation::new(a).ok())
        .collect();
    let supervisors = store.find_eligible_supervisors(wing, &excluded)?;
    for role in Role::ALL {
        if !supervisors.iter().any(|s| s.role == role) {
            return Err(PlanError::NoSupervisors { wing, role });
        }
    }

    let names: Vec<String> = buildings.iter().map(|b| b.name.clone()).collect();
    // Whole months, so MONTH-SKIP also sees rooms covered after the range.
    let history = store.find_in_range(
        &names,
        month_start(request.start_date),
        month_end(request.end_date),
    )?;
    let cutoff = request.overwrite.then_some(request.start_date);
    let latest = store.find_latest(&names, cutoff)?;

    log_changes!(
        verbosity,
        "Planning {} {} to {}: {} buildings, {} supervisors, {} prior records",
        wing,
        request.start_date,
        request.end_date,
        buildings.len(),
        supervisors.len(),
        history.len()
    );

    let mut planner = AssignmentPlanner::new(
        config,
        SupervisorPool::new(supervisors),
        RoomBlockAllocator::from_history(config.block_size, &latest),
        HistoryIndex::new(&history),
        request.overwrite,
    );
    let result = planner.plan(&buildings, request.start_date, request.end_date);
    let pool = planner.into_pool();
    let supervisor_updates = pool.dirty_updates();

    let mut batch = PersistenceBatcher::new();
    batch.queue_assignments(result.generated.iter().cloned());
    batch.queue_replaced(result.replaced.iter().cloned());
    batch.queue_updates(supervisor_updates.iter().cloned());
    batch.flush(store, verbosity)?;

    let sheets = build_sheets(&result.emitted, pool.supervisors());

    Ok(PlanOutcome {
        summary: result.summary,
        assignments: result.emitted,
        supervisor_updates,
        sheets,
    })
}

/// First day of the month containing `date`.
fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}
