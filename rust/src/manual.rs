//! Hand-entered duties, recorded alongside generated ones.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Assignment, AssignmentKey, LastDuty, LastDutyUpdate, Role, RoomBlock, Supervisor,
};
use crate::planner::PersistenceBatcher;
use crate::repository::{DutyStore, RepositoryError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManualEntryError {
    #[error("No entries provided")]
    Empty,
    #[error("Entry {index}: missing {field}")]
    Missing { index: usize, field: &'static str },
    #[error("Entry {index}: invalid date {value:?}")]
    InvalidDate { index: usize, value: String },
    #[error("Entry {index}: invalid room range {value:?}")]
    InvalidRange { index: usize, value: String },
    #[error("Entry {index}: unknown supervisor {id}")]
    UnknownSupervisor { index: usize, id: String },
    #[error("Entry {index}: supervisor {id} is not {expected}")]
    WrongRole {
        index: usize,
        id: String,
        expected: Role,
    },
    #[error("Entry {index}: {building} already has a duty on {date}")]
    Duplicate {
        index: usize,
        building: String,
        date: NaiveDate,
    },
    #[error("Reading supervisors failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Saving entries failed: {0}")]
    Persistence(String),
}

/// One hand-entered duty as received.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ManualEntry {
    #[serde(default)]
    pub teaching_id: Option<String>,
    #[serde(default)]
    pub non_teaching_id: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
}

struct ParsedEntry<'a> {
    teaching_id: &'a str,
    non_teaching_id: &'a str,
    building: &'a str,
    date: NaiveDate,
    block: RoomBlock,
}

fn required<'a>(
    index: usize,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, ManualEntryError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ManualEntryError::Missing { index, field })
}

impl ManualEntry {
    fn parse(&self, index: usize) -> Result<ParsedEntry<'_>, ManualEntryError> {
        let teaching_id = required(index, "teaching_id", &self.teaching_id)?;
        let non_teaching_id = required(index, "non_teaching_id", &self.non_teaching_id)?;
        let building = required(index, "building", &self.building)?;
        let raw_date = required(index, "date", &self.date)?;
        let raw_range = required(index, "range", &self.range)?;

        let day = raw_date.get(..10).unwrap_or(raw_date);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
            ManualEntryError::InvalidDate {
                index,
                value: raw_date.to_string(),
            }
        })?;
        let block: RoomBlock = raw_range.parse().map_err(|_| ManualEntryError::InvalidRange {
            index,
            value: raw_range.to_string(),
        })?;

        Ok(ParsedEntry {
            teaching_id,
            non_teaching_id,
            building,
            date,
            block,
        })
    }
}

/// What [`record_manual_duties`] wrote.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ManualOutcome {
    pub assignments: Vec<Assignment>,
    pub supervisor_updates: Vec<LastDutyUpdate>,
}

fn lookup<'s>(
    by_id: &FxHashMap<&str, &'s Supervisor>,
    index: usize,
    id: &str,
    expected: Role,
) -> Result<&'s Supervisor, ManualEntryError> {
    let supervisor = by_id
        .get(id)
        .copied()
        .ok_or_else(|| ManualEntryError::UnknownSupervisor {
            index,
            id: id.to_string(),
        })?;
    if supervisor.role != expected {
        return Err(ManualEntryError::WrongRole {
            index,
            id: id.to_string(),
            expected,
        });
    }
    Ok(supervisor)
}

/// Validate every entry, then write them as one batch.
///
/// Any invalid entry rejects the whole list. A supervisor's last duty only
/// moves forward: an entry older than what is on record leaves it alone.
pub fn record_manual_duties<S: DutyStore + ?Sized>(
    entries: &[ManualEntry],
    store: &mut S,
    verbosity: u8,
) -> Result<ManualOutcome, ManualEntryError> {
    if entries.is_empty() {
        return Err(ManualEntryError::Empty);
    }
    let parsed = entries
        .iter()
        .enumerate()
        .map(|(i, e)| e.parse(i))
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<String> = parsed
        .iter()
        .flat_map(|p| [p.teaching_id.to_string(), p.non_teaching_id.to_string()])
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    let supervisors = store.find_supervisors_by_id(&ids)?;
    let by_id: FxHashMap<&str, &Supervisor> =
        supervisors.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut seen: FxHashSet<AssignmentKey> = FxHashSet::default();
    let mut assignments = Vec::with_capacity(parsed.len());
    // id -> newest last duty known so far, seeded from the stored record
    let mut newest: FxHashMap<&str, Option<NaiveDate>> = FxHashMap::default();
    let mut updates: Vec<LastDutyUpdate> = Vec::new();

    for (index, entry) in parsed.iter().enumerate() {
        let teaching = lookup(&by_id, index, entry.teaching_id, Role::Teaching)?;
        let non_teaching = lookup(&by_id, index, entry.non_teaching_id, Role::NonTeaching)?;

        let assignment = Assignment {
            affiliation: teaching.affiliation.clone(),
            date: entry.date,
            building: entry.building.to_string(),
            block: entry.block,
            teaching: teaching.to_ref(),
            non_teaching: non_teaching.to_ref(),
        };
        if !seen.insert(assignment.key()) {
            return Err(ManualEntryError::Duplicate {
                index,
                building: assignment.building,
                date: assignment.date,
            });
        }

        let duty = LastDuty::new(entry.date, entry.building, entry.block);
        for supervisor in [teaching, non_teaching] {
            let current = newest
                .entry(supervisor.id.as_str())
                .or_insert_with(|| supervisor.last_duty_date());
            if current.map_or(true, |last| last < entry.date) {
                *current = Some(entry.date);
                updates.retain(|u: &LastDutyUpdate| u.supervisor_id != supervisor.id);
                updates.push(LastDutyUpdate {
                    supervisor_id: supervisor.id.clone(),
                    last_duty: duty.clone(),
                });
            }
        }
        assignments.push(assignment);
    }

    let replaced = existing_records(&*store, &assignments)?;
    let mut batch = PersistenceBatcher::new();
    batch.queue_assignments(assignments.iter().cloned());
    batch.queue_replaced(replaced);
    batch.queue_updates(updates.iter().cloned());
    batch
        .flush(store, verbosity)
        .map_err(|e| ManualEntryError::Persistence(e.to_string()))?;

    Ok(ManualOutcome {
        assignments,
        supervisor_updates: updates,
    })
}

/// Stored records that `assignments` will overwrite.
fn existing_records<S: DutyStore + ?Sized>(
    store: &S,
    assignments: &[Assignment],
) -> Result<Vec<Assignment>, RepositoryError> {
    let (Some(from), Some(to)) = (
        assignments.iter().map(|a| a.date).min(),
        assignments.iter().map(|a| a.date).max(),
    ) else {
        return Ok(Vec::new());
    };
    let keys: FxHashSet<AssignmentKey> = assignments.iter().map(Assignment::key).collect();
    let buildings: Vec<String> = assignments
        .iter()
        .map(|a| a.building.clone())
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    Ok(store
        .find_in_range(&buildings, from, to)?
        .into_iter()
        .filter(|a| keys.contains(&a.key()))
        .collect())
}
