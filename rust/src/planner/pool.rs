//! Round-robin supervisor rotation.
//!
//! Supervisors are partitioned by affiliation and role. Each partition is a
//! queue ordered by how long ago its members last served; the member picked
//! for a duty moves to the back.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::interner::{AffiliationInterner, AffiliationSlot};
use crate::models::{Affiliation, LastDuty, LastDutyUpdate, Role, Supervisor};

/// Which pass of [`SupervisorPool::take`] produced a pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickSource {
    /// From one of the requested affiliations, not yet used this month
    Preferred,
    /// Oldest front-of-queue candidate from any affiliation
    Fallback,
}

/// A supervisor selected for a duty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pick {
    /// Index into the pool's working copy, see [`SupervisorPool::supervisor`]
    pub index: usize,
    pub source: PickSource,
}

/// Queue slot, supervisor index and pass of a selection not yet taken.
type Candidate = (AffiliationSlot, usize, PickSource);

/// Per-affiliation, per-role rotation queues over a working copy of the
/// eligible supervisors.
#[derive(Debug, Clone)]
pub struct SupervisorPool {
    supervisors: Vec<Supervisor>,
    interner: AffiliationInterner,
    /// slot -> [teaching queue, non-teaching queue] of supervisor indices
    queues: Vec<[VecDeque<usize>; 2]>,
    dirty: Vec<usize>,
    dirty_set: FxHashSet<usize>,
}

/// Never-served supervisors sort before everyone else.
#[inline]
fn effective_date(supervisor: &Supervisor) -> NaiveDate {
    supervisor.last_duty_date().unwrap_or(NaiveDate::MIN)
}

fn recency_order(a: &Supervisor, b: &Supervisor) -> Ordering {
    effective_date(a)
        .cmp(&effective_date(b))
        .then_with(|| a.id.cmp(&b.id))
}

impl SupervisorPool {
    /// Partition and sort the snapshot once.
    pub fn new(supervisors: Vec<Supervisor>) -> Self {
        let mut interner = AffiliationInterner::with_capacity(supervisors.len());
        let mut queues: Vec<[VecDeque<usize>; 2]> = Vec::new();

        for (idx, supervisor) in supervisors.iter().enumerate() {
            let slot = interner.intern(&supervisor.affiliation) as usize;
            if slot == queues.len() {
                queues.push([VecDeque::new(), VecDeque::new()]);
            }
            queues[slot][supervisor.role.index()].push_back(idx);
        }

        for partition in &mut queues {
            for queue in partition.iter_mut() {
                queue
                    .make_contiguous()
                    .sort_by(|&a, &b| recency_order(&supervisors[a], &supervisors[b]));
            }
        }

        Self {
            supervisors,
            interner,
            queues,
            dirty: Vec::new(),
            dirty_set: FxHashSet::default(),
        }
    }

    /// Select the supervisor of `role` for a duty on `target_date`.
    ///
    /// Tries the front of each requested affiliation's queue first, skipping
    /// anyone who already served in the target month; otherwise takes the
    /// oldest front-of-queue candidate of any affiliation. Ties go to the
    /// lower supervisor id. The pick's `last_duty` is set to `duty` and it
    /// moves to the back of its queue. Returns `None` only when no queue of
    /// that role has anyone in it.
    pub fn take(
        &mut self,
        affiliations: &[Affiliation],
        target_date: NaiveDate,
        role: Role,
        duty: &LastDuty,
    ) -> Option<Pick> {
        let candidate = self.select(affiliations, target_date, role)?;
        Some(self.commit(candidate, role, duty))
    }

    /// [`take`](Self::take) a teaching and a non-teaching supervisor.
    ///
    /// Either both are taken or the pool is left as it was and the roles
    /// nobody could fill are returned.
    pub fn take_pair(
        &mut self,
        affiliations: &[Affiliation],
        target_date: NaiveDate,
        duty: &LastDuty,
    ) -> Result<(Pick, Pick), Vec<Role>> {
        let teaching = self.select(affiliations, target_date, Role::Teaching);
        let non_teaching = self.select(affiliations, target_date, Role::NonTeaching);
        match (teaching, non_teaching) {
            (Some(t), Some(n)) => Ok((
                self.commit(t, Role::Teaching, duty),
                self.commit(n, Role::NonTeaching, duty),
            )),
            (t, n) => Err(Role::ALL
                .into_iter()
                .zip([t.is_none(), n.is_none()])
                .filter_map(|(role, missing)| missing.then_some(role))
                .collect()),
        }
    }

    fn select(
        &self,
        affiliations: &[Affiliation],
        target_date: NaiveDate,
        role: Role,
    ) -> Option<Candidate> {
        let preferred = affiliations
            .iter()
            .filter_map(|a| self.interner.get(a))
            .filter_map(|slot| self.front(slot, role).map(|idx| (slot, idx)))
            .filter(|&(_, idx)| !self.supervisors[idx].served_in_month_of(target_date))
            .min_by(|a, b| self.compare(a.1, b.1));

        match preferred {
            Some((slot, idx)) => Some((slot, idx, PickSource::Preferred)),
            None => {
                let (slot, idx) = (0..self.queues.len() as AffiliationSlot)
                    .filter_map(|slot| self.front(slot, role).map(|idx| (slot, idx)))
                    .min_by(|a, b| self.compare(a.1, b.1))?;
                Some((slot, idx, PickSource::Fallback))
            }
        }
    }

    fn commit(&mut self, (slot, idx, source): Candidate, role: Role, duty: &LastDuty) -> Pick {
        self.rotate(slot, role);
        self.supervisors[idx].last_duty = Some(duty.clone());
        if self.dirty_set.insert(idx) {
            self.dirty.push(idx);
        }
        Pick { index: idx, source }
    }

    /// `min_by` keeps the first of equal elements, so slot order settles
    /// anything the id does not.
    fn compare(&self, a: usize, b: usize) -> Ordering {
        recency_order(&self.supervisors[a], &self.supervisors[b])
    }

    #[inline]
    fn front(&self, slot: AffiliationSlot, role: Role) -> Option<usize> {
        self.queues
            .get(slot as usize)
            .and_then(|p| p[role.index()].front().copied())
    }

    fn rotate(&mut self, slot: AffiliationSlot, role: Role) {
        let queue = &mut self.queues[slot as usize][role.index()];
        if let Some(idx) = queue.pop_front() {
            queue.push_back(idx);
        }
    }

    pub fn supervisor(&self, index: usize) -> &Supervisor {
        &self.supervisors[index]
    }

    /// Supervisor ids of one queue, front first.
    pub fn queue_ids(&self, affiliation: &Affiliation, role: Role) -> Vec<&str> {
        self.interner
            .get(affiliation)
            .map(|slot| {
                self.queues[slot as usize][role.index()]
                    .iter()
                    .map(|&idx| self.supervisors[idx].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Last-duty writes for every supervisor picked so far, in pick order.
    pub fn dirty_updates(&self) -> Vec<LastDutyUpdate> {
        self.dirty
            .iter()
            .filter_map(|&idx| {
                let supervisor = &self.supervisors[idx];
                supervisor.last_duty.as_ref().map(|duty| LastDutyUpdate {
                    supervisor_id: supervisor.id.clone(),
                    last_duty: duty.clone(),
                })
            })
            .collect()
    }

    pub fn supervisors(&self) -> &[Supervisor] {
        &self.supervisors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoomBlock, Wing};

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn make_supervisor(
        id: &str,
        affiliation: &str,
        role: Role,
        last: Option<NaiveDate>,
    ) -> Supervisor {
        let block = RoomBlock::new(1, 20).unwrap();
        Supervisor {
            id: id.to_string(),
            employee_code: format!("E-{}", id),
            name: format!("Name {}", id),
            title: String::new(),
            designation: String::new(),
            affiliation: Affiliation::new(affiliation).unwrap(),
            role,
            wing: Wing::Male,
            email: String::new(),
            mobile: String::new(),
            on_leave: false,
            last_duty: last.map(|d| LastDuty::new(d, "OLD", block)),
        }
    }

    fn duty(date: NaiveDate) -> LastDuty {
        LastDuty::new(date, "KP-1", RoomBlock::new(1, 20).unwrap())
    }

    fn aff(name: &str) -> Affiliation {
        Affiliation::new(name).unwrap()
    }

    fn take_id(
        pool: &mut SupervisorPool,
        affs: &[Affiliation],
        date: NaiveDate,
        role: Role,
    ) -> Option<String> {
        pool.take(affs, date, role, &duty(date))
            .map(|p| pool.supervisor(p.index).id.clone())
    }

    #[test]
    fn test_queue_sorted_by_last_duty() {
        let pool = SupervisorPool::new(vec![
            make_supervisor("a", "LAW", Role::Teaching, Some(make_date(2024, 12, 1))),
            make_supervisor("b", "LAW", Role::Teaching, None),
            make_supervisor("c", "LAW", Role::Teaching, Some(make_date(2024, 10, 1))),
        ]);
        assert_eq!(pool.queue_ids(&aff("LAW"), Role::Teaching), vec!["b", "c", "a"]);
        assert!(pool.queue_ids(&aff("LAW"), Role::NonTeaching).is_empty());
    }

    #[test]
    fn test_round_robin_visits_everyone_once() {
        // Dates spread over months so no month conflict arises.
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("a", "LAW", Role::Teaching, Some(make_date(2024, 3, 1))),
            make_supervisor("b", "LAW", Role::Teaching, Some(make_date(2024, 1, 1))),
            make_supervisor("c", "LAW", Role::Teaching, Some(make_date(2024, 2, 1))),
        ]);
        let affs = [aff("LAW")];
        let original: Vec<String> = pool
            .queue_ids(&affs[0], Role::Teaching)
            .into_iter()
            .map(String::from)
            .collect();

        let dates = [make_date(2025, 1, 1), make_date(2025, 2, 1), make_date(2025, 3, 1)];
        let picks: Vec<String> = dates
            .into_iter()
            .map(|d| take_id(&mut pool, &affs, d, Role::Teaching).unwrap())
            .collect();

        assert_eq!(picks, vec!["b", "c", "a"]);
        assert_eq!(pool.queue_ids(&affs[0], Role::Teaching), original);
    }

    #[test]
    fn test_preferred_pass_skips_same_month() {
        // law1 is the older of the two but already served in January.
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("law1", "LAW", Role::Teaching, Some(make_date(2025, 1, 2))),
            make_supervisor("arts1", "ARTS", Role::Teaching, Some(make_date(2025, 3, 1))),
        ]);
        let target = make_date(2025, 1, 20);
        let pick = pool
            .take(&[aff("LAW"), aff("ARTS")], target, Role::Teaching, &duty(target))
            .unwrap();
        assert_eq!(pool.supervisor(pick.index).id, "arts1");
        assert_eq!(pick.source, PickSource::Preferred);
    }

    #[test]
    fn test_preferred_pass_picks_oldest_across_affiliations() {
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("law1", "LAW", Role::Teaching, Some(make_date(2024, 11, 1))),
            make_supervisor("arts1", "ARTS", Role::Teaching, None),
            make_supervisor("med1", "MED", Role::Teaching, None),
        ]);
        // MED is not requested, so arts1 (never served) wins over law1.
        let affs = [aff("LAW"), aff("ARTS")];
        let picked = take_id(&mut pool, &affs, make_date(2025, 1, 5), Role::Teaching);
        assert_eq!(picked.as_deref(), Some("arts1"));
    }

    #[test]
    fn test_fallback_when_local_queue_used_this_month() {
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("law1", "LAW", Role::Teaching, None),
            make_supervisor("med1", "MED", Role::Teaching, Some(make_date(2024, 6, 1))),
        ]);
        let affs = [aff("LAW")];
        let first = pool
            .take(&affs, make_date(2025, 1, 1), Role::Teaching, &duty(make_date(2025, 1, 1)))
            .unwrap();
        assert_eq!(first.source, PickSource::Preferred);

        // law1 served on Jan 1; next January duty must come from elsewhere.
        let second = pool
            .take(&affs, make_date(2025, 1, 2), Role::Teaching, &duty(make_date(2025, 1, 2)))
            .unwrap();
        assert_eq!(second.source, PickSource::Fallback);
        assert_eq!(pool.supervisor(second.index).id, "med1");

        // Both served in January now; fallback ignores the month and takes the oldest.
        let third = pool
            .take(&affs, make_date(2025, 1, 3), Role::Teaching, &duty(make_date(2025, 1, 3)))
            .unwrap();
        assert_eq!(third.source, PickSource::Fallback);
        assert_eq!(pool.supervisor(third.index).id, "law1");
    }

    #[test]
    fn test_fallback_for_unknown_affiliation() {
        let mut pool =
            SupervisorPool::new(vec![make_supervisor("x", "LAW", Role::NonTeaching, None)]);
        let date = make_date(2025, 1, 1);
        let pick = pool
            .take(&[aff("NOBODY")], date, Role::NonTeaching, &duty(date))
            .unwrap();
        assert_eq!(pick.source, PickSource::Fallback);
    }

    #[test]
    fn test_exhausted_role_returns_none() {
        let mut pool =
            SupervisorPool::new(vec![make_supervisor("t", "LAW", Role::Teaching, None)]);
        let picked = take_id(&mut pool, &[aff("LAW")], make_date(2025, 1, 1), Role::NonTeaching);
        assert!(picked.is_none());
        assert!(pool.dirty_updates().is_empty());
    }

    #[test]
    fn test_take_pair_takes_both_roles() {
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("t", "LAW", Role::Teaching, None),
            make_supervisor("n", "LAW", Role::NonTeaching, None),
        ]);
        let date = make_date(2025, 1, 1);
        let (teaching, non_teaching) = pool.take_pair(&[aff("LAW")], date, &duty(date)).unwrap();

        assert_eq!(pool.supervisor(teaching.index).id, "t");
        assert_eq!(pool.supervisor(non_teaching.index).id, "n");
        assert_eq!(pool.dirty_updates().len(), 2);
    }

    #[test]
    fn test_take_pair_leaves_pool_alone_when_a_role_is_empty() {
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("t1", "LAW", Role::Teaching, None),
            make_supervisor("t2", "LAW", Role::Teaching, Some(make_date(2024, 1, 1))),
        ]);
        let date = make_date(2025, 1, 1);
        let missing = pool.take_pair(&[aff("LAW")], date, &duty(date)).unwrap_err();

        assert_eq!(missing, vec![Role::NonTeaching]);
        assert_eq!(pool.queue_ids(&aff("LAW"), Role::Teaching), vec!["t1", "t2"]);
        assert!(pool.supervisor(0).last_duty.is_none());
        assert!(pool.dirty_updates().is_empty());

        let mut empty = SupervisorPool::new(vec![]);
        let missing = empty.take_pair(&[aff("LAW")], date, &duty(date)).unwrap_err();
        assert_eq!(missing, Role::ALL.to_vec());
    }

    #[test]
    fn test_tie_broken_by_id() {
        let same = Some(make_date(2024, 5, 5));
        let mut pool = SupervisorPool::new(vec![
            make_supervisor("z", "LAW", Role::Teaching, same),
            make_supervisor("m", "ARTS", Role::Teaching, same),
        ]);
        let affs = [aff("LAW"), aff("ARTS")];
        let picked = take_id(&mut pool, &affs, make_date(2025, 1, 1), Role::Teaching);
        assert_eq!(picked.as_deref(), Some("m"));
    }

    #[test]
    fn test_pick_updates_last_duty_and_dirty_set() {
        let mut pool =
            SupervisorPool::new(vec![make_supervisor("a", "LAW", Role::Teaching, None)]);
        let date = make_date(2025, 2, 3);
        take_id(&mut pool, &[aff("LAW")], date, Role::Teaching);
        take_id(&mut pool, &[aff("LAW")], make_date(2025, 3, 3), Role::Teaching);

        assert_eq!(pool.supervisor(0).last_duty_date(), Some(make_date(2025, 3, 3)));
        let updates = pool.dirty_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].supervisor_id, "a");
        assert_eq!(updates[0].last_duty.date, Some(make_date(2025, 3, 3)));
    }
}
