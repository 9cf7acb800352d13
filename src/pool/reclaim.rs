// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tracing::{debug, error, warn};

use super::{BufferPool, InstanceTracker};
use crate::engine::{PlaybackEngine, SoundDataHandle};

/// A released slot waiting for its instances to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnQueueEntry {
    pub index: usize,
    pub sound_data: SoundDataHandle,
}

/// Returns released slots to the pool once nothing is playing from them.
#[derive(Debug, Default)]
pub struct ReclamationScheduler {
    queue: Vec<ReturnQueueEntry>,
}

impl ReclamationScheduler {
    pub fn new(capacity: usize) -> ReclamationScheduler {
        ReclamationScheduler {
            queue: Vec::with_capacity(capacity),
        }
    }

    pub fn on_release(&mut self, entry: ReturnQueueEntry) {
        debug!(index = entry.index, "Queued buffer slot for return");
        self.queue.push(entry);
    }

    /// Number of entries still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn entries(&self) -> &[ReturnQueueEntry] {
        &self.queue
    }

    /// Deletes the sound data of every queued slot with no live instances and
    /// returns the slot to the pool. Must run after [`InstanceTracker::tick`]
    /// so the instance counts are current. Returns the reclaimed slot indices.
    pub fn tick(
        &mut self,
        engine: &dyn PlaybackEngine,
        tracker: &InstanceTracker,
        pool: &mut BufferPool,
    ) -> Vec<usize> {
        let mut reclaimed = Vec::new();
        for i in (0..self.queue.len()).rev() {
            let index = self.queue[i].index;
            if tracker.count(index) > 0 {
                continue;
            }

            let entry = self.queue.swap_remove(i);
            if let Err(e) = engine.delete_sound_data(entry.sound_data) {
                error!(index, error = %e, "Failed to delete sound data");
            }
            match pool.release(index) {
                Ok(()) => reclaimed.push(index),
                Err(e) => warn!(index, error = %e, "Unable to return buffer slot"),
            }
        }
        reclaimed
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}
