//! Room block rotation per building.

use rustc_hash::FxHashMap;

use crate::models::{Assignment, Building, RoomBlock};

/// Block handed out by [`RoomBlockAllocator::next_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextBlock {
    pub block: RoomBlock,
    /// This block reaches the last room; the building is done for the run
    pub finished: bool,
}

/// Per-building cursor into the room range `1..=capacity`.
///
/// The cursor holds the last room covered. Each call to `next_block` starts
/// one past it, wrapping to room 1 after the last room.
#[derive(Clone, Debug)]
pub struct RoomBlockAllocator {
    block_size: u32,
    cursors: FxHashMap<String, u32>,
}

impl RoomBlockAllocator {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size: block_size.max(1),
            cursors: FxHashMap::default(),
        }
    }

    /// Seed cursors from the most recent assignment of each building.
    ///
    /// When a building appears more than once the latest date wins.
    pub fn from_history<'a>(
        block_size: u32,
        latest: impl IntoIterator<Item = &'a Assignment>,
    ) -> Self {
        let mut newest: FxHashMap<&str, &Assignment> = FxHashMap::default();
        for assignment in latest {
            newest
                .entry(assignment.building.as_str())
                .and_modify(|cur| {
                    if assignment.date > cur.date {
                        *cur = assignment;
                    }
                })
                .or_insert(assignment);
        }

        let mut allocator = Self::new(block_size);
        for (building, assignment) in newest {
            allocator.seed(building, assignment.block.end);
        }
        allocator
    }

    pub fn seed(&mut self, building: &str, last_room: u32) {
        self.cursors.insert(building.to_string(), last_room);
    }

    /// Last room covered in `building`, 0 if none.
    pub fn cursor(&self, building: &str) -> u32 {
        self.cursors.get(building).copied().unwrap_or(0)
    }

    /// Hand out the next contiguous block and advance the cursor.
    ///
    /// Returns `None` when the building has no rooms to cover.
    pub fn next_block(&mut self, building: &Building) -> Option<NextBlock> {
        let capacity = building.capacity;
        if capacity == 0 {
            return None;
        }

        let cursor = self.cursors.entry(building.name.clone()).or_insert(0);
        let start = (*cursor % capacity) + 1;
        if start > capacity {
            return None;
        }

        let end = start.saturating_add(self.block_size - 1).min(capacity);
        *cursor = end;

        let block = RoomBlock::new(start, end).ok()?;
        Some(NextBlock {
            block,
            finished: end == capacity,
        })
    }
}
