//! Per-building duty sheets and the sink that writes them out.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Assignment, Role, Supervisor, SupervisorRef};

/// Longest sheet name most spreadsheet tools accept.
pub const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("I/O error writing sheet: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error writing sheet: {0}")]
    Csv(#[from] csv::Error),
    #[error("Sheet file {} was already written", .0.display())]
    DuplicateSheet(PathBuf),
}

/// One supervisor line of a duty sheet. Field names double as column headers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SheetRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Building")]
    pub building: String,
    #[serde(rename = "Room Range")]
    pub room_range: String,
    #[serde(rename = "Role")]
    pub role: Role,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Employee Code")]
    pub employee_code: String,
    #[serde(rename = "Designation")]
    pub designation: String,
    #[serde(rename = "Affiliation")]
    pub affiliation: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Mobile")]
    pub mobile: String,
}

impl SheetRow {
    fn new(assignment: &Assignment, person: &SupervisorRef, detail: Option<&Supervisor>) -> Self {
        let field = |f: fn(&Supervisor) -> &str| detail.map(f).unwrap_or_default().to_string();
        Self {
            date: assignment.date,
            building: assignment.building.clone(),
            room_range: assignment.block.to_string(),
            role: person.role,
            name: person.name.clone(),
            employee_code: field(|s| s.employee_code.as_str()),
            designation: field(|s| s.designation.as_str()),
            affiliation: field(|s| s.affiliation.as_str()),
            gender: field(|s| s.wing.as_str()),
            email: field(|s| s.email.as_str()),
            mobile: field(|s| s.mobile.as_str()),
        }
    }
}

/// All rows for one building, in date order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildingSheet {
    pub building: String,
    /// Building name cut to [`MAX_SHEET_NAME_LEN`] characters, unique per run
    pub sheet_name: String,
    pub rows: Vec<SheetRow>,
}

pub fn sheet_name(building: &str) -> String {
    building.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// [`sheet_name`], with a `~2`, `~3`, ... suffix when `taken` already holds it.
fn unique_sheet_name(building: &str, taken: &mut FxHashSet<String>) -> String {
    let mut name = sheet_name(building);
    let mut n = 2;
    while taken.contains(&name) {
        let suffix = format!("~{}", n);
        let keep = MAX_SHEET_NAME_LEN - suffix.len();
        name = building.chars().take(keep).chain(suffix.chars()).collect();
        n += 1;
    }
    taken.insert(name.clone());
    name
}

/// Group assignments into one sheet per building, two rows per day.
///
/// Buildings appear in the order they first occur in `assignments`.
/// Supervisors missing from `supervisors` get rows with only their name.
pub fn build_sheets(
    assignments: &[Assignment],
    supervisors: &[Supervisor],
) -> Vec<BuildingSheet> {
    let by_id: FxHashMap<&str, &Supervisor> =
        supervisors.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
    let mut taken: FxHashSet<String> = FxHashSet::default();
    let mut sheets: Vec<BuildingSheet> = Vec::new();

    for assignment in assignments {
        let slot = *slots.entry(assignment.building.as_str()).or_insert_with(|| {
            sheets.push(BuildingSheet {
                building: assignment.building.clone(),
                sheet_name: unique_sheet_name(&assignment.building, &mut taken),
                rows: Vec::new(),
            });
            sheets.len() - 1
        });
        for role in Role::ALL {
            let person = assignment.supervisor(role);
            let detail = by_id.get(person.id.as_str()).copied();
            sheets[slot].rows.push(SheetRow::new(assignment, person, detail));
        }
    }

    for sheet in &mut sheets {
        sheet.rows.sort_by_key(|r| (r.date, r.role.index()));
    }
    sheets
}

/// Destination for rendered duty sheets.
pub trait SpreadsheetSink {
    fn write_sheet(&mut self, sheet_name: &str, rows: &[SheetRow]) -> Result<(), SheetError>;
}

/// Write every non-empty sheet to `sink`.
pub fn write_sheets<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    sheets: &[BuildingSheet],
) -> Result<usize, SheetError> {
    let mut written = 0;
    for sheet in sheets.iter().filter(|s| !s.rows.is_empty()) {
        sink.write_sheet(&sheet.sheet_name, &sheet.rows)?;
        written += 1;
    }
    Ok(written)
}

/// Writes each sheet to `<dir>/<sheet name>.csv`.
#[derive(Clone, Debug)]
pub struct CsvSheetSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvSheetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Paths written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn path_for(&self, sheet_name: &str) -> PathBuf {
        let file: String = sheet_name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.csv", file))
    }
}

impl SpreadsheetSink for CsvSheetSink {
    fn write_sheet(&mut self, sheet_name: &str, rows: &[SheetRow]) -> Result<(), SheetError> {
        let path = self.path_for(sheet_name);
        if self.written.contains(&path) {
            return Err(SheetError::DuplicateSheet(path));
        }
        std::fs::create_dir_all(&self.dir)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        self.written.push(path);
        Ok(())
    }
}
