//! Residential duty rota planner.
//!
//! Pairs a teaching and a non-teaching supervisor with a block of rooms in
//! each building for every day of a requested range, rotating both people
//! and rooms fairly across runs.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::{PyLookupError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

mod config;
mod interner;
pub mod logging;
pub mod manual;
mod models;
pub mod planner;
mod prioritizer;
pub mod report;
pub mod repository;
pub mod request;
pub mod runner;
pub mod sheet;

pub use config::{PlannerConfig, DEFAULT_BLOCK_SIZE};
pub use manual::{record_manual_duties, ManualEntry, ManualEntryError, ManualOutcome};
pub use models::{
    Affiliation, Assignment, AssignmentKey, Building, LastDuty, LastDutyUpdate, ModelError, Role,
    RoomBlock, Supervisor, SupervisorRef, Wing,
};
pub use prioritizer::{prioritize_buildings, BuildingRank};
pub use report::{duty_frequency, FrequencyRow};
pub use repository::{MemoryStore, RepositoryError, Snapshot};
pub use request::{PlanRequest, RawPlanRequest};
pub use runner::{run_duty_plan, PlanError, PlanOutcome};
pub use sheet::{CsvSheetSink, SheetRow, SpreadsheetSink};

fn plan_error_to_py(e: PlanError) -> PyErr {
    match e {
        PlanError::Validation(_) | PlanError::Repository(_) => PyValueError::new_err(e.to_string()),
        PlanError::NoBuildings(_) | PlanError::NoSupervisors { .. } => {
            PyLookupError::new_err(e.to_string())
        }
        PlanError::Persistence(_) => PyRuntimeError::new_err(e.to_string()),
    }
}

fn manual_error_to_py(e: ManualEntryError) -> PyErr {
    match e {
        ManualEntryError::Persistence(_) => PyRuntimeError::new_err(e.to_string()),
        ManualEntryError::UnknownSupervisor { .. } => PyLookupError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn load_store(snapshot_json: &str) -> PyResult<MemoryStore> {
    MemoryStore::from_json(snapshot_json).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// A run's result together with the store as it stands afterwards.
#[derive(Serialize)]
struct StoreResponse<'a, T: Serialize> {
    outcome: &'a T,
    snapshot: Snapshot,
}

/// Plan duties for a date range against a JSON snapshot.
///
/// # Arguments
/// * `snapshot_json` - `{"supervisors": [...], "buildings": [...], "assignments": [...]}`
/// * `start_date`, `end_date` - Inclusive range, `YYYY-MM-DD`
/// * `category` - `male`/`female` (or `boys`/`girls`)
/// * `exclude_buildings` - Building names to leave out
/// * `overwrite` - Regenerate days that already have assignments
/// * `config` - Planner settings, defaults when omitted
/// * `sheet_dir` - If given, one CSV per building is written there
///
/// # Returns
/// * JSON `{"outcome": ..., "snapshot": ...}`
///
/// # Raises
/// * ValueError for an invalid request or snapshot
/// * LookupError when no buildings or supervisors are eligible
/// * RuntimeError when saving fails
#[pyfunction]
#[pyo3(signature = (
    snapshot_json,
    start_date,
    end_date,
    category,
    exclude_buildings=Vec::new(),
    overwrite=false,
    config=None,
    sheet_dir=None,
))]
#[allow(clippy::too_many_arguments)]
fn plan_duties(
    snapshot_json: &str,
    start_date: Option<String>,
    end_date: Option<String>,
    category: Option<String>,
    exclude_buildings: Vec<String>,
    overwrite: bool,
    config: Option<PlannerConfig>,
    sheet_dir: Option<String>,
) -> PyResult<String> {
    let config = config.unwrap_or_default();
    let raw = RawPlanRequest {
        start_date,
        end_date,
        category,
        exclude_buildings,
        overwrite,
    };
    let mut store = load_store(snapshot_json)?;
    let outcome = run_duty_plan(&raw, &config, &mut store).map_err(plan_error_to_py)?;

    if let Some(dir) = sheet_dir {
        let mut sink = CsvSheetSink::new(dir);
        sheet::write_sheets(&mut sink, &outcome.sheets)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    }

    to_json(&StoreResponse {
        outcome: &outcome,
        snapshot: store.snapshot(),
    })
}

/// Record hand-entered duties given as a JSON list of entries.
///
/// # Returns
/// * JSON `{"outcome": ..., "snapshot": ...}`
///
/// # Raises
/// * ValueError for a malformed or invalid entry
/// * LookupError for an unknown supervisor id
#[pyfunction]
#[pyo3(signature = (snapshot_json, entries_json, verbosity=0))]
fn assign_manually(snapshot_json: &str, entries_json: &str, verbosity: u8) -> PyResult<String> {
    let entries: Vec<ManualEntry> =
        serde_json::from_str(entries_json).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let mut store = load_store(snapshot_json)?;
    let outcome =
        record_manual_duties(&entries, &mut store, verbosity).map_err(manual_error_to_py)?;
    to_json(&StoreResponse {
        outcome: &outcome,
        snapshot: store.snapshot(),
    })
}

/// Per-supervisor duty counts for each month of `year`, as JSON.
#[pyfunction]
#[pyo3(name = "duty_frequency")]
fn py_duty_frequency(snapshot_json: &str, year: i32) -> PyResult<String> {
    let store = load_store(snapshot_json)?;
    let rows = report::duty_frequency_from(year, &store)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    to_json(&rows)
}

/// The duty_rota.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Config types
    m.add_class::<PlannerConfig>()?;

    // Operations
    m.add_function(wrap_pyfunction!(plan_duties, m)?)?;
    m.add_function(wrap_pyfunction!(assign_manually, m)?)?;
    m.add_function(wrap_pyfunction!(py_duty_frequency, m)?)?;

    Ok(())
}
