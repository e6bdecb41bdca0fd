//! End-of-run bulk writes.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::models::{Assignment, AssignmentKey, LastDutyUpdate};
use crate::repository::{AssignmentHistoryRepository, PeopleRepository, RepositoryError};
use crate::{log_changes, log_warn};

/// Errors raised while flushing a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Two assignments for {} on {}", .0.building, .0.date)]
    DuplicateAssignment(AssignmentKey),
    #[error("Writing assignments failed: {0}")]
    Assignments(RepositoryError),
    #[error("Updating last duties failed, assignments rolled back: {0}")]
    RolledBack(RepositoryError),
    #[error("Updating last duties failed ({cause}) and rollback failed ({rollback})")]
    RollbackFailed {
        cause: RepositoryError,
        rollback: RepositoryError,
    },
}

/// Counts of what a flush wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub assignments_written: usize,
    pub supervisors_updated: usize,
}

/// Collects new assignments and last-duty updates and writes them together.
///
/// Assignments are upserted first, then last duties. If the second write
/// fails, the new keys are removed and any records they replaced are put
/// back, so the store never holds one half without the other.
#[derive(Clone, Debug, Default)]
pub struct PersistenceBatcher {
    assignments: Vec<Assignment>,
    replaced: Vec<Assignment>,
    updates: Vec<LastDutyUpdate>,
}

impl PersistenceBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_assignments(&mut self, assignments: impl IntoIterator<Item = Assignment>) {
        self.assignments.extend(assignments);
    }

    /// Records the new assignments overwrite, restored on rollback.
    pub fn queue_replaced(&mut self, replaced: impl IntoIterator<Item = Assignment>) {
        self.replaced.extend(replaced);
    }

    pub fn queue_updates(&mut self, updates: impl IntoIterator<Item = LastDutyUpdate>) {
        self.updates.extend(updates);
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.updates.is_empty()
    }

    fn check_unique(&self) -> Result<(), BatchError> {
        let mut seen = FxHashSet::default();
        for assignment in &self.assignments {
            let key = assignment.key();
            if !seen.insert(key.clone()) {
                return Err(BatchError::DuplicateAssignment(key));
            }
        }
        Ok(())
    }

    /// Write everything queued. Nothing is written for an empty batch.
    pub fn flush<S>(self, store: &mut S, verbosity: u8) -> Result<FlushReport, BatchError>
    where
        S: AssignmentHistoryRepository + PeopleRepository + ?Sized,
    {
        if self.is_empty() {
            return Ok(FlushReport::default());
        }
        self.check_unique()?;

        if !self.assignments.is_empty() {
            store
                .bulk_upsert(&self.assignments)
                .map_err(BatchError::Assignments)?;
        }

        if !self.updates.is_empty() {
            if let Err(cause) = store.bulk_update_last_duty(&self.updates) {
                log_warn!(verbosity, "last-duty update failed, rolling back: {}", cause);
                let keys: Vec<AssignmentKey> =
                    self.assignments.iter().map(Assignment::key).collect();
                let rollback = store.bulk_remove(&keys).and_then(|_| {
                    if self.replaced.is_empty() {
                        Ok(())
                    } else {
                        store.bulk_upsert(&self.replaced)
                    }
                });
                return Err(match rollback {
                    Ok(()) => BatchError::RolledBack(cause),
                    Err(rollback) => BatchError::RollbackFailed { cause, rollback },
                });
            }
        }

        log_changes!(
            verbosity,
            "Wrote {} assignments, {} last-duty updates",
            self.assignments.len(),
            self.updates.len()
        );
        Ok(FlushReport {
            assignments_written: self.assignments.len(),
            supervisors_updated: self.updates.len(),
        })
    }
}
