//! Sparse periodic engine snapshots, ordered by step count.

use crate::engine::EngineSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Recorded actions at capture time
    pub step_count: usize,
    pub state: EngineSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointStore {
    /// Actions between checkpoints; 0 disables periodic capture
    interval: usize,
    entries: Vec<Checkpoint>,
}

impl CheckpointStore {
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            entries: Vec::new(),
        }
    }

    /// Build a store from persisted checkpoints.
    ///
    /// Step counts must be strictly increasing and at most `action_count`.
    pub fn from_entries(
        interval: usize,
        entries: Vec<Checkpoint>,
        action_count: usize,
    ) -> Result<Self, String> {
        for pair in entries.windows(2) {
            if pair[1].step_count <= pair[0].step_count {
                return Err(format!(
                    "checkpoint step counts not increasing: {} then {}",
                    pair[0].step_count, pair[1].step_count
                ));
            }
        }
        if let Some(last) = entries.last()
            && last.step_count > action_count
        {
            return Err(format!(
                "checkpoint at step {} beyond {} recorded actions",
                last.step_count, action_count
            ));
        }
        Ok(Self { interval, entries })
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Checkpoint] {
        &self.entries
    }

    pub fn step_counts(&self) -> Vec<usize> {
        self.entries.iter().map(|c| c.step_count).collect()
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.entries.last()
    }

    /// Checkpoints taken at or before `action_count`.
    pub fn up_to(&self, action_count: usize) -> &[Checkpoint] {
        let end = self
            .entries
            .partition_point(|c| c.step_count <= action_count);
        &self.entries[..end]
    }

    /// Whether `action_count` has reached the next capture boundary.
    pub fn is_due(&self, action_count: usize) -> bool {
        if self.interval == 0 {
            return false;
        }
        let last = self.latest().map_or(0, |c| c.step_count);
        action_count >= last + self.interval
    }

    /// Append a checkpoint. Ignored unless it extends the sequence.
    pub fn push(&mut self, checkpoint: Checkpoint) -> bool {
        if let Some(last) = self.latest()
            && checkpoint.step_count <= last.step_count
        {
            return false;
        }
        self.entries.push(checkpoint);
        true
    }

    /// Detach every checkpoint describing a state after `action_count`.
    pub fn split_after(&mut self, action_count: usize) -> Vec<Checkpoint> {
        let keep = self.up_to(action_count).len();
        self.entries.split_off(keep)
    }

    /// Put back checkpoints detached by [`CheckpointStore::split_after`].
    pub fn reinstate(&mut self, later: Vec<Checkpoint>) {
        self.entries.extend(later);
    }
}
