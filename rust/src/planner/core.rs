//! The day-by-day planning pass.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::PlannerConfig;
use crate::models::{month_of, Assignment, AssignmentKey, Building, LastDuty, Role, RoomBlock};
use crate::{log_changes, log_checks, log_debug, log_warn};

use super::pool::{PickSource, SupervisorPool};
use super::rooms::RoomBlockAllocator;

/// Outcome of one (building, day) slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayDecision {
    /// An existing record was kept as is
    Reuse { finished: bool },
    /// The building's rooms are already covered this month
    MonthSkip,
    /// A new assignment was produced
    Generate { finished: bool },
    /// A block was allocated but nobody could be found to staff it
    Gap { finished: bool },
    /// No block left to allocate
    BuildingFinished,
}

impl DayDecision {
    /// True when no further days should be tried for this building.
    pub fn ends_building(self) -> bool {
        matches!(
            self,
            DayDecision::Reuse { finished: true }
                | DayDecision::Generate { finished: true }
                | DayDecision::Gap { finished: true }
                | DayDecision::BuildingFinished
        )
    }
}

/// A day that could not be staffed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaffingGap {
    pub building: String,
    pub date: NaiveDate,
    pub missing: Vec<Role>,
}

/// Counts reported back to the caller after a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub generated: usize,
    pub reused: usize,
    pub month_skipped: usize,
    /// Picks that had to ignore affiliation or the once-a-month rule
    pub fallback_picks: usize,
    pub gaps: Vec<StaffingGap>,
}

/// Everything the planning pass produced, before anything is written.
#[derive(Clone, Debug, Default)]
pub struct PlanResult {
    /// Reused and generated assignments, building by building, day by day
    pub emitted: Vec<Assignment>,
    /// Only the new records, to be written
    pub generated: Vec<Assignment>,
    /// Existing records a regeneration replaces
    pub replaced: Vec<Assignment>,
    pub summary: RunSummary,
}

/// Read-only view of prior assignments for the requested window.
#[derive(Clone, Debug, Default)]
pub struct HistoryIndex {
    by_key: FxHashMap<AssignmentKey, Assignment>,
    /// (building, (year, month)) -> rooms covered
    month_rooms: FxHashMap<(String, (i32, u32)), u32>,
}

impl HistoryIndex {
    pub fn new(assignments: &[Assignment]) -> Self {
        let mut index = Self::default();
        for assignment in assignments {
            let key = assignment.key();
            if index.by_key.contains_key(&key) {
                continue;
            }
            *index
                .month_rooms
                .entry((assignment.building.clone(), month_of(assignment.date)))
                .or_insert(0) += assignment.block.len();
            index.by_key.insert(key, assignment.clone());
        }
        index
    }

    pub fn get(&self, building: &str, date: NaiveDate) -> Option<&Assignment> {
        self.by_key.get(&AssignmentKey {
            building: building.to_string(),
            date,
        })
    }

    /// Rooms of `building` covered in the calendar month of `date`.
    pub fn rooms_in_month(&self, building: &str, date: NaiveDate) -> u32 {
        self.month_rooms
            .get(&(building.to_string(), month_of(date)))
            .copied()
            .unwrap_or(0)
    }
}

/// Walks buildings in priority order and days in date order, deciding each
/// slot from history, the room cursor and the overwrite flag.
pub struct AssignmentPlanner<'a> {
    config: &'a PlannerConfig,
    pool: SupervisorPool,
    rooms: RoomBlockAllocator,
    history: HistoryIndex,
    overwrite: bool,
}

impl<'a> AssignmentPlanner<'a> {
    pub fn new(
        config: &'a PlannerConfig,
        pool: SupervisorPool,
        rooms: RoomBlockAllocator,
        history: HistoryIndex,
        overwrite: bool,
    ) -> Self {
        Self {
            config,
            pool,
            rooms,
            history,
            overwrite,
        }
    }

    /// Plan every building over `start..=end`.
    pub fn plan(&mut self, buildings: &[Building], start: NaiveDate, end: NaiveDate) -> PlanResult {
        let mut result = PlanResult::default();
        for building in buildings {
            log_changes!(
                self.config.verbosity,
                "Planning building {} (rooms={}, affiliations={})",
                building.name,
                building.capacity,
                building.affiliations.len()
            );
            self.plan_building(building, start, end, &mut result);
        }
        result
    }

    fn plan_building(
        &mut self,
        building: &Building,
        start: NaiveDate,
        end: NaiveDate,
        result: &mut PlanResult,
    ) {
        for date in start.iter_days().take_while(|d| *d <= end) {
            if self.plan_day(building, date, result).ends_building() {
                log_debug!(self.config.verbosity, "  {}: done for this run", building.name);
                break;
            }
        }
    }

    /// Decide and carry out one (building, day) slot.
    pub fn plan_day(
        &mut self,
        building: &Building,
        date: NaiveDate,
        result: &mut PlanResult,
    ) -> DayDecision {
        let verbosity = self.config.verbosity;

        if !self.overwrite {
            if let Some(existing) = self.history.get(&building.name, date) {
                log_checks!(
                    verbosity,
                    "  {} {}: reusing {}",
                    building.name,
                    date,
                    existing.block
                );
                result.emitted.push(existing.clone());
                result.summary.reused += 1;
                // A reused last block ends the building just as generating it did.
                return DayDecision::Reuse {
                    finished: existing.block.end >= building.capacity,
                };
            }
            let covered = self.history.rooms_in_month(&building.name, date);
            if covered >= building.capacity {
                log_checks!(
                    verbosity,
                    "  {} {}: month already covered ({} rooms)",
                    building.name,
                    date,
                    covered
                );
                result.summary.month_skipped += 1;
                return DayDecision::MonthSkip;
            }
        }

        let Some(next) = self.rooms.next_block(building) else {
            return DayDecision::BuildingFinished;
        };
        log_debug!(
            verbosity,
            "  {} {}: cursor -> {}",
            building.name,
            date,
            self.rooms.cursor(&building.name)
        );

        if self.generate(building, date, next.block, result) {
            DayDecision::Generate {
                finished: next.finished,
            }
        } else {
            DayDecision::Gap {
                finished: next.finished,
            }
        }
    }

    fn record_gap(
        &self,
        building: &Building,
        date: NaiveDate,
        missing: Vec<Role>,
        result: &mut PlanResult,
    ) {
        log_warn!(
            self.config.verbosity,
            "no available supervisors for {} on {}, skipping",
            building.name,
            date
        );
        result.summary.gaps.push(StaffingGap {
            building: building.name.clone(),
            date,
            missing,
        });
    }

    /// Staff `block` on `date`. Returns false when the slot had to be skipped.
    fn generate(
        &mut self,
        building: &Building,
        date: NaiveDate,
        block: RoomBlock,
        result: &mut PlanResult,
    ) -> bool {
        let verbosity = self.config.verbosity;

        let duty = LastDuty::new(date, &building.name, block);
        let picks = self.pool.take_pair(&building.affiliations, date, &duty);
        let (teaching, non_teaching) = match picks {
            Ok(picks) => picks,
            Err(missing) => {
                self.record_gap(building, date, missing, result);
                return false;
            }
        };

        for pick in [teaching, non_teaching] {
            if pick.source == PickSource::Fallback {
                result.summary.fallback_picks += 1;
                let s = self.pool.supervisor(pick.index);
                log_checks!(
                    verbosity,
                    "  {} {}: fallback pick {} ({}) from {}",
                    building.name,
                    date,
                    s.name,
                    s.role,
                    s.affiliation
                );
            }
        }

        let t = self.pool.supervisor(teaching.index);
        let n = self.pool.supervisor(non_teaching.index);
        log_changes!(
            verbosity,
            "  {} {} rooms {}: {} / {}",
            building.name,
            date,
            block,
            t.name,
            n.name
        );

        let assignment = Assignment {
            affiliation: t.affiliation.clone(),
            date,
            building: building.name.clone(),
            block,
            teaching: t.to_ref(),
            non_teaching: n.to_ref(),
        };

        if let Some(previous) = self.history.get(&building.name, date) {
            result.replaced.push(previous.clone());
        }
        result.emitted.push(assignment.clone());
        result.generated.push(assignment);
        result.summary.generated += 1;
        true
    }

    pub fn into_pool(self) -> SupervisorPool {
        self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Affiliation, Supervisor, SupervisorRef, Wing};
    use rustc_hash::FxHashSet;

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn make_supervisor(id: &str, affiliation: &str, role: Role) -> Supervisor {
        Supervisor {
            id: id.to_string(),
            employee_code: id.to_uppercase(),
            name: format!("Name {}", id),
            title: String::new(),
            designation: String::new(),
            affiliation: Affiliation::new(affiliation).unwrap(),
            role,
            wing: Wing::Male,
            email: String::new(),
            mobile: String::new(),
            on_leave: false,
            last_duty: None,
        }
    }

    fn make_building(name: &str, capacity: u32, affiliations: &[&str]) -> Building {
        Building {
            name: name.to_string(),
            capacity,
            wing: Wing::Male,
            affiliations: affiliations.iter().map(|a| Affiliation::new(a).unwrap()).collect(),
        }
    }

    fn make_assignment(building: &str, date: NaiveDate, start: u32, end: u32) -> Assignment {
        Assignment {
            affiliation: Affiliation::new("LAW").unwrap(),
            date,
            building: building.to_string(),
            block: RoomBlock::new(start, end).unwrap(),
            teaching: SupervisorRef {
                id: "old-t".to_string(),
                name: "Old T".to_string(),
                role: Role::Teaching,
            },
            non_teaching: SupervisorRef {
                id: "old-n".to_string(),
                name: "Old N".to_string(),
                role: Role::NonTeaching,
            },
        }
    }

    fn staff(n: usize) -> Vec<Supervisor> {
        let mut out = Vec::new();
        for i in 0..n {
            out.push(make_supervisor(&format!("t{}", i), "LAW", Role::Teaching));
            out.push(make_supervisor(&format!("n{}", i), "LAW", Role::NonTeaching));
        }
        out
    }

    fn run(
        config: &PlannerConfig,
        supervisors: Vec<Supervisor>,
        buildings: &[Building],
        history: &[Assignment],
        overwrite: bool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (PlanResult, SupervisorPool) {
        let rooms = RoomBlockAllocator::from_history(config.block_size, history);
        let mut planner = AssignmentPlanner::new(
            config,
            SupervisorPool::new(supervisors),
            rooms,
            HistoryIndex::new(history),
            overwrite,
        );
        let result = planner.plan(buildings, start, end);
        (result, planner.into_pool())
    }

    #[test]
    fn test_single_block_building_finishes_on_day_one() {
        let config = PlannerConfig::default();
        let buildings = [make_building("KP-1", 20, &["LAW"])];
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 5));
        let (result, _) = run(&config, staff(1), &buildings, &[], false, start, end);

        assert_eq!(result.generated.len(), 1);
        let only = &result.generated[0];
        assert_eq!(only.date, start);
        assert_eq!(only.block, RoomBlock::new(1, 20).unwrap());
        assert_eq!(only.teaching.id, "t0");
        assert_eq!(only.non_teaching.id, "n0");
        assert_eq!(result.summary.generated, 1);
    }

    #[test]
    fn test_month_skip_after_capacity_reached() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 40, &["LAW"]);
        let history = [
            make_assignment("KP-1", make_date(2025, 1, 1), 1, 20),
            make_assignment("KP-1", make_date(2025, 1, 2), 21, 40),
        ];
        let (start, end) = (make_date(2025, 1, 3), make_date(2025, 1, 5));
        let (result, _) = run(&config, staff(3), &[building], &history, false, start, end);

        assert!(result.generated.is_empty());
        assert_eq!(result.summary.reused, 0);
        assert_eq!(result.summary.month_skipped, 3);
        assert!(result.emitted.is_empty());
    }

    #[test]
    fn test_reused_last_block_ends_building() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 40, &["LAW"]);
        let history = [
            make_assignment("KP-1", make_date(2025, 1, 30), 1, 20),
            make_assignment("KP-1", make_date(2025, 1, 31), 21, 40),
        ];
        // February has no history, so only the finished building stops day 3.
        let (start, end) = (make_date(2025, 1, 30), make_date(2025, 2, 2));
        let (result, pool) = run(&config, staff(2), &[building], &history, false, start, end);

        assert_eq!(result.summary.reused, 2);
        assert_eq!(result.summary.month_skipped, 0);
        assert!(result.generated.is_empty());
        assert!(pool.dirty_updates().is_empty());
    }

    #[test]
    fn test_reuse_leaves_cursor_and_pool_alone() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 100, &["LAW"]);
        let history = [make_assignment("KP-1", make_date(2025, 1, 1), 1, 20)];
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 2));
        let (result, pool) = run(&config, staff(2), &[building], &history, false, start, end);

        assert_eq!(result.summary.reused, 1);
        assert_eq!(result.generated.len(), 1);
        // Generation continues from the reused block.
        assert_eq!(result.generated[0].block, RoomBlock::new(21, 40).unwrap());
        assert_eq!(pool.dirty_updates().len(), 2);
    }

    #[test]
    fn test_overwrite_regenerates_and_records_replaced() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 100, &["LAW"]);
        let history = [make_assignment("KP-1", make_date(2025, 1, 1), 1, 20)];
        // The caller seeds cursors from before the start date when overwriting.
        let mut planner = AssignmentPlanner::new(
            &config,
            SupervisorPool::new(staff(1)),
            RoomBlockAllocator::new(config.block_size),
            HistoryIndex::new(&history),
            true,
        );
        let day = make_date(2025, 1, 1);
        let result = planner.plan(&[building], day, day);

        assert_eq!(result.summary.reused, 0);
        assert_eq!(result.generated.len(), 1);
        assert_eq!(result.generated[0].teaching.id, "t0");
        assert_eq!(result.replaced, history.to_vec());
    }

    #[test]
    fn test_gap_when_role_missing() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 60, &["LAW"]);
        let supervisors = vec![make_supervisor("t0", "LAW", Role::Teaching)];
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 2));
        let (result, pool) = run(&config, supervisors, &[building], &[], false, start, end);

        assert!(result.generated.is_empty());
        assert_eq!(result.summary.gaps.len(), 2);
        assert_eq!(result.summary.gaps[0].missing, vec![Role::NonTeaching]);
        assert!(pool.dirty_updates().is_empty());
    }

    #[test]
    fn test_gap_on_last_block_still_finishes_building() {
        let config = PlannerConfig::default();
        let building = make_building("KP-1", 20, &["LAW"]);
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 4));
        let (result, _) = run(&config, vec![], &[building], &[], false, start, end);

        assert_eq!(result.summary.gaps.len(), 1);
        assert_eq!(result.summary.gaps[0].missing, Role::ALL.to_vec());
    }

    #[test]
    fn test_no_double_booking_across_buildings() {
        let config = PlannerConfig::default();
        let buildings = [
            make_building("KP-1", 100, &["LAW"]),
            make_building("KP-2", 100, &["LAW"]),
        ];
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 5));
        let (result, _) = run(&config, staff(4), &buildings, &[], false, start, end);

        let mut keys = FxHashSet::default();
        for a in &result.generated {
            assert!(keys.insert(a.key()), "duplicate {:?}", a.key());
        }
        assert_eq!(result.generated.len(), 10);
    }

    #[test]
    fn test_no_one_serves_twice_in_month_without_fallback() {
        let config = PlannerConfig::default();
        let buildings = [make_building("KP-1", 200, &["LAW"])];
        // Eight pairs for five days: never needs a fallback.
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 5));
        let (result, _) = run(&config, staff(8), &buildings, &[], false, start, end);

        assert_eq!(result.summary.fallback_picks, 0);
        let mut seen = FxHashSet::default();
        for a in &result.generated {
            assert!(seen.insert(a.teaching.id.clone()));
            assert!(seen.insert(a.non_teaching.id.clone()));
        }
    }

    #[test]
    fn test_fallback_counted_when_pool_too_small() {
        let config = PlannerConfig::default();
        let buildings = [make_building("KP-1", 200, &["LAW"])];
        let (start, end) = (make_date(2025, 1, 1), make_date(2025, 1, 3));
        let (result, _) = run(&config, staff(1), &buildings, &[], false, start, end);

        assert_eq!(result.generated.len(), 3);
        // Day 2 and 3 reuse the same pair via the fallback pass.
        assert_eq!(result.summary.fallback_picks, 4);
    }

    #[test]
    fn test_month_boundary_resets_eligibility() {
        let config = PlannerConfig::default();
        let buildings = [make_building("KP-1", 200, &["LAW"])];
        let (start, end) = (make_date(2025, 1, 31), make_date(2025, 2, 1));
        let (result, _) = run(&config, staff(1), &buildings, &[], false, start, end);

        assert_eq!(result.generated.len(), 2);
        assert_eq!(result.summary.fallback_picks, 0);
    }

    #[test]
    fn test_history_counts_each_day_once() {
        let dup = make_assignment("KP-1", make_date(2025, 1, 1), 1, 20);
        let index = HistoryIndex::new(&[dup.clone(), dup]);
        assert_eq!(index.rooms_in_month("KP-1", make_date(2025, 1, 15)), 20);
        assert_eq!(index.rooms_in_month("KP-1", make_date(2025, 2, 1)), 0);
    }

    #[test]
    fn test_day_decision_ends_building() {
        assert!(DayDecision::BuildingFinished.ends_building());
        assert!(DayDecision::Generate { finished: true }.ends_building());
        assert!(DayDecision::Reuse { finished: true }.ends_building());
        assert!(!DayDecision::Generate { finished: false }.ends_building());
        assert!(!DayDecision::Reuse { finished: false }.ends_building());
        assert!(!DayDecision::MonthSkip.ends_building());
    }
}
