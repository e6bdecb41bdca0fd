//! Duty planner: supervisor rotation, room block rotation and the
//! day-by-day decision pass, plus the batched write at the end of a run.

mod batch;
mod core;
mod pool;
mod rooms;

pub use batch::{BatchError, FlushReport, PersistenceBatcher};
pub use core::{AssignmentPlanner, DayDecision, HistoryIndex, PlanResult, RunSummary, StaffingGap};
pub use pool::{Pick, PickSource, SupervisorPool};
pub use rooms::{NextBlock, RoomBlockAllocator};
