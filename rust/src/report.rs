//! Yearly duty counts per supervisor.

use chrono::Datelike;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::models::{Assignment, Role, Supervisor};
use crate::repository::{AssignmentHistoryRepository, PeopleRepository, RepositoryError};

/// Duties one supervisor served in each month of a year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrequencyRow {
    pub supervisor_id: String,
    pub name: String,
    pub role: Role,
    /// January first
    pub monthly: [u32; 12],
}

/// Count each supervisor's assignments per month of `year`.
///
/// Every supervisor gets a row, in the order given, even with no duties.
pub fn duty_frequency(
    year: i32,
    supervisors: &[Supervisor],
    assignments: &[Assignment],
) -> Vec<FrequencyRow> {
    let mut rows: Vec<FrequencyRow> = supervisors
        .iter()
        .map(|s| FrequencyRow {
            supervisor_id: s.id.clone(),
            name: s.name.clone(),
            role: s.role,
            monthly: [0; 12],
        })
        .collect();
    let slots: FxHashMap<&str, usize> = supervisors
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    for assignment in assignments.iter().filter(|a| a.date.year() == year) {
        let month = assignment.date.month0() as usize;
        for role in Role::ALL {
            if let Some(&slot) = slots.get(assignment.supervisor(role).id.as_str()) {
                rows[slot].monthly[month] += 1;
            }
        }
    }
    rows
}

/// [`duty_frequency`] over everything in `store`.
pub fn duty_frequency_from<S>(year: i32, store: &S) -> Result<Vec<FrequencyRow>, RepositoryError>
where
    S: PeopleRepository + AssignmentHistoryRepository + ?Sized,
{
    let supervisors = store.find_all_supervisors()?;
    let assignments = store.find_all_assignments()?;
    Ok(duty_frequency(year, &supervisors, &assignments))
}
