//! Storage seams consumed by the planner, and an in-memory implementation.
//!
//! The planner reads through these traits once before planning and writes
//! through them once afterwards. `MemoryStore` backs the Python bindings and
//! the tests; a document-store client implements the same traits.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{
    Affiliation, Assignment, AssignmentKey, Building, LastDutyUpdate, Supervisor, Wing,
};

/// Errors reported by a repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Write failed: {0}")]
    Write(String),
    #[error("Unknown supervisor: {0}")]
    UnknownSupervisor(String),
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
}

/// Supervisors and their last-duty bookkeeping.
pub trait PeopleRepository {
    /// Supervisors of `wing` who are not on leave and not in an excluded affiliation.
    fn find_eligible_supervisors(
        &self,
        wing: Wing,
        excluded_affiliations: &[Affiliation],
    ) -> Result<Vec<Supervisor>, RepositoryError>;

    fn find_supervisors_by_id(&self, ids: &[String]) -> Result<Vec<Supervisor>, RepositoryError>;

    fn find_all_supervisors(&self) -> Result<Vec<Supervisor>, RepositoryError>;

    /// Overwrite `last_duty` of each listed supervisor.
    fn bulk_update_last_duty(&mut self, updates: &[LastDutyUpdate]) -> Result<(), RepositoryError>;
}

/// Buildings with their associated affiliations.
pub trait BuildingRepository {
    fn find_eligible_buildings(
        &self,
        wing: Wing,
        excluded_buildings: &[String],
    ) -> Result<Vec<Building>, RepositoryError>;
}

/// Prior assignments, keyed by (building, date).
pub trait AssignmentHistoryRepository {
    /// Assignments of the given buildings dated within `from..=to`.
    fn find_in_range(
        &self,
        buildings: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Assignment>, RepositoryError>;

    /// Most recent assignment of each building, optionally strictly before a date.
    fn find_latest(
        &self,
        buildings: &[String],
        before: Option<NaiveDate>,
    ) -> Result<Vec<Assignment>, RepositoryError>;

    fn find_all_assignments(&self) -> Result<Vec<Assignment>, RepositoryError>;

    /// Insert, replacing any record with the same key.
    fn bulk_upsert(&mut self, assignments: &[Assignment]) -> Result<(), RepositoryError>;

    fn bulk_remove(&mut self, keys: &[AssignmentKey]) -> Result<(), RepositoryError>;
}

/// Everything a planning run needs from storage.
pub trait DutyStore: PeopleRepository + BuildingRepository + AssignmentHistoryRepository {}

impl<T: PeopleRepository + BuildingRepository + AssignmentHistoryRepository> DutyStore for T {}

/// Serialized form of a [`MemoryStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub supervisors: Vec<Supervisor>,
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// In-memory store holding a full snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    supervisors: Vec<Supervisor>,
    buildings: Vec<Building>,
    assignments: BTreeMap<AssignmentKey, Assignment>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            supervisors: snapshot.supervisors,
            buildings: snapshot.buildings,
            assignments: snapshot
                .assignments
                .into_iter()
                .map(|a| (a.key(), a))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, RepositoryError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| RepositoryError::Malformed(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            supervisors: self.supervisors.clone(),
            buildings: self.buildings.clone(),
            assignments: self.assignments.values().cloned().collect(),
        }
    }

    pub fn supervisor(&self, id: &str) -> Option<&Supervisor> {
        self.supervisors.iter().find(|s| s.id == id)
    }

    pub fn assignment(&self, building: &str, date: NaiveDate) -> Option<&Assignment> {
        self.assignments.get(&AssignmentKey {
            building: building.to_string(),
            date,
        })
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

impl PeopleRepository for MemoryStore {
    fn find_eligible_supervisors(
        &self,
        wing: Wing,
        excluded_affiliations: &[Affiliation],
    ) -> Result<Vec<Supervisor>, RepositoryError> {
        Ok(self
            .supervisors
            .iter()
            .filter(|s| s.wing == wing && !s.on_leave)
            .filter(|s| !excluded_affiliations.contains(&s.affiliation))
            .cloned()
            .collect())
    }

    fn find_supervisors_by_id(&self, ids: &[String]) -> Result<Vec<Supervisor>, RepositoryError> {
        let wanted: FxHashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .supervisors
            .iter()
            .filter(|s| wanted.contains(s.id.as_str()))
            .cloned()
            .collect())
    }

    fn find_all_supervisors(&self) -> Result<Vec<Supervisor>, RepositoryError> {
        Ok(self.supervisors.clone())
    }

    fn bulk_update_last_duty(&mut self, updates: &[LastDutyUpdate]) -> Result<(), RepositoryError> {
        // Resolve every id before touching anything.
        let mut positions = Vec::with_capacity(updates.len());
        for update in updates {
            let pos = self
                .supervisors
                .iter()
                .position(|s| s.id == update.supervisor_id)
                .ok_or_else(|| RepositoryError::UnknownSupervisor(update.supervisor_id.clone()))?;
            positions.push(pos);
        }
        for (pos, update) in positions.into_iter().zip(updates) {
            self.supervisors[pos].last_duty = Some(update.last_duty.clone());
        }
        Ok(())
    }
}

impl BuildingRepository for MemoryStore {
    fn find_eligible_buildings(
        &self,
        wing: Wing,
        excluded_buildings: &[String],
    ) -> Result<Vec<Building>, RepositoryError> {
        Ok(self
            .buildings
            .iter()
            .filter(|b| b.wing == wing)
            .filter(|b| !excluded_buildings.iter().any(|ex| ex.trim() == b.name))
            .cloned()
            .collect())
    }
}

impl AssignmentHistoryRepository for MemoryStore {
    fn find_in_range(
        &self,
        buildings: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let wanted: FxHashSet<&str> = buildings.iter().map(String::as_str).collect();
        Ok(self
            .assignments
            .values()
            .filter(|a| wanted.contains(a.building.as_str()))
            .filter(|a| a.date >= from && a.date <= to)
            .cloned()
            .collect())
    }

    fn find_latest(
        &self,
        buildings: &[String],
        before: Option<NaiveDate>,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let mut latest = Vec::with_capacity(buildings.len());
        for building in buildings {
            // Keys sort by (building, date), so the last match is the newest.
            let newest = self
                .assignments
                .values()
                .filter(|a| &a.building == building)
                .filter(|a| before.map_or(true, |limit| a.date < limit))
                .last();
            if let Some(assignment) = newest {
                latest.push(assignment.clone());
            }
        }
        Ok(latest)
    }

    fn find_all_assignments(&self) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self.assignments.values().cloned().collect())
    }

    fn bulk_upsert(&mut self, assignments: &[Assignment]) -> Result<(), RepositoryError> {
        for assignment in assignments {
            self.assignments.insert(assignment.key(), assignment.clone());
        }
        Ok(())
    }

    fn bulk_remove(&mut self, keys: &[AssignmentKey]) -> Result<(), RepositoryError> {
        for key in keys {
            self.assignments.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "supervisors": [
            {"id": "1", "name": "A", "affiliation": "School of Law",
             "role": "Teaching", "wing": "MALE"},
            {"id": "2", "name": "B", "affiliation": "School of Law",
             "role": "Non-Teaching", "wing": "MALE", "on_leave": true},
            {"id": "3", "name": "C", "affiliation": "School of Computer Science",
             "role": "Teaching", "wing": "MALE"},
            {"id": "4", "name": "D", "affiliation": "School of Law",
             "role": "Teaching", "wing": "FEMALE"}
        ],
        "buildings": [
            {"name": "KP-1", "capacity": 40, "wing": "BOYS", "affiliations": ["School of Law"]},
            {"name": "KP-2", "capacity": 40, "wing": "BOYS", "affiliations": []},
            {"name": "QC-1", "capacity": 40, "wing": "GIRLS", "affiliations": []}
        ],
        "assignments": [
            {"affiliation": "LAW", "date": "2025-01-01", "building": "KP-1", "block": "1-20",
             "teaching": {"id": "1", "name": "A", "role": "Teaching"},
             "non_teaching": {"id": "2", "name": "B", "role": "Non-Teaching"}},
            {"affiliation": "LAW", "date": "2025-01-05", "building": "KP-1", "block": "21-40",
             "teaching": {"id": "1", "name": "A", "role": "Teaching"},
             "non_teaching": {"id": "2", "name": "B", "role": "Non-Teaching"}}
        ]
    }"#;

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_eligible_supervisors_filtered() {
        let store = MemoryStore::from_json(SNAPSHOT).unwrap();
        let excluded = [Affiliation::new("SCHOOL OF COMPUTER SCIENCE").unwrap()];
        let found = store.find_eligible_supervisors(Wing::Male, &excluded).unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_eligible_buildings_filtered() {
        let store = MemoryStore::from_json(SNAPSHOT).unwrap();
        let found = store
            .find_eligible_buildings(Wing::Male, &["KP-2".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "KP-1");
    }

    #[test]
    fn test_find_latest_respects_cutoff() {
        let store = MemoryStore::from_json(SNAPSHOT).unwrap();
        let buildings = vec!["KP-1".to_string(), "KP-2".to_string()];

        let latest = store.find_latest(&buildings, None).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].date, make_date(2025, 1, 5));

        let before = store.find_latest(&buildings, Some(make_date(2025, 1, 5))).unwrap();
        assert_eq!(before[0].date, make_date(2025, 1, 1));
    }

    #[test]
    fn test_find_in_range_inclusive() {
        let store = MemoryStore::from_json(SNAPSHOT).unwrap();
        let found = store
            .find_in_range(&["KP-1".to_string()], make_date(2025, 1, 1), make_date(2025, 1, 5))
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_update_unknown_supervisor_changes_nothing() {
        let mut store = MemoryStore::from_json(SNAPSHOT).unwrap();
        let duty = crate::models::LastDuty::new(
            make_date(2025, 2, 1),
            "KP-1",
            crate::models::RoomBlock::new(1, 20).unwrap(),
        );
        let updates = [
            LastDutyUpdate {
                supervisor_id: "1".to_string(),
                last_duty: duty.clone(),
            },
            LastDutyUpdate {
                supervisor_id: "missing".to_string(),
                last_duty: duty,
            },
        ];
        let err = store.bulk_update_last_duty(&updates).unwrap_err();
        assert_eq!(err, RepositoryError::UnknownSupervisor("missing".to_string()));
        assert_eq!(store.supervisor("1").unwrap().last_duty, None);
    }

    #[test]
    fn test_malformed_snapshot() {
        assert!(matches!(
            MemoryStore::from_json("{\"buildings\": 3}"),
            Err(RepositoryError::Malformed(_))
        ));
    }
}
