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
use tracing::{debug, warn};

use super::{BufferPool, PoolError, SlotState};
use crate::engine::{InstanceHandle, PlaybackEngine};

/// The live playback instances of each pool slot. The tracker is the only
/// place instances are deleted while a session runs.
#[derive(Debug)]
pub struct InstanceTracker {
    sets: Vec<Vec<InstanceHandle>>,
    step: usize,
}

impl InstanceTracker {
    /// Creates an empty set per slot. Each set reserves `step` entries and
    /// grows by `step` whenever it fills up.
    pub fn new(slots: usize, step: usize) -> InstanceTracker {
        let step = step.max(1);
        InstanceTracker {
            sets: (0..slots).map(|_| Vec::with_capacity(step)).collect(),
            step,
        }
    }

    /// Adds an instance to the set for slot `index`.
    pub fn register(&mut self, index: usize, instance: InstanceHandle) -> Result<(), PoolError> {
        let step = self.step;
        let set = self
            .sets
            .get_mut(index)
            .ok_or(PoolError::UnknownSlot(index))?;
        if set.len() == set.capacity() {
            set.reserve_exact(step);
        }
        set.push(instance);
        Ok(())
    }

    /// Number of live instances for slot `index`. Unknown slots have none.
    pub fn count(&self, index: usize) -> usize {
        self.sets.get(index).map_or(0, Vec::len)
    }

    pub fn instances(&self, index: usize) -> &[InstanceHandle] {
        match self.sets.get(index) {
            Some(set) => set,
            None => &[],
        }
    }

    /// Total live instances across every slot.
    pub fn total(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    /// Deletes every instance the engine no longer reports as playing, for
    /// slots that are `Ready` or `PendingReturn`. Returns how many were deleted.
    pub fn tick(&mut self, engine: &dyn PlaybackEngine, pool: &BufferPool) -> usize {
        let mut pruned = 0;
        for (index, set) in self.sets.iter_mut().enumerate() {
            match pool.state(index) {
                Some(SlotState::Ready) | Some(SlotState::PendingReturn) => {}
                _ => continue,
            }

            // Walk backwards so swap_remove only moves entries already checked.
            for i in (0..set.len()).rev() {
                if engine.is_playing(set[i]) {
                    continue;
                }
                let instance = set.swap_remove(i);
                if let Err(e) = engine.delete_instance(instance) {
                    warn!(
                        index,
                        instance = instance.0,
                        error = %e,
                        "Failed to delete sound instance"
                    );
                }
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned, "Pruned finished sound instances");
        }
        pruned
    }

    /// Removes and returns every instance of every slot.
    pub(crate) fn drain(&mut self) -> Vec<InstanceHandle> {
        self.sets.iter_mut().flat_map(|set| set.drain(..)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::engine::{mock, SoundDataHandle, SoundDataType};

    fn ready_slot(
        engine: &mock::Engine,
        pool: &mut BufferPool,
        frames: usize,
    ) -> (usize, SoundDataHandle) {
        let index = pool.acquire().unwrap();
        let buffer = encode(&vec![0.2; frames], 44100, 1);
        let sound_data = engine
            .new_sound_data(buffer.as_bytes(), SoundDataType::Wav, 0)
            .unwrap();
        pool.mark_ready(index, sound_data).unwrap();
        (index, sound_data)
    }

    #[test]
    fn test_register_grows_by_step() {
        let mut tracker = InstanceTracker::new(2, 2);
        for i in 0..5 {
            tracker.register(1, InstanceHandle(i)).unwrap();
        }
        assert_eq!(tracker.count(1), 5);
        assert_eq!(tracker.count(0), 0);
        assert!(tracker.sets[1].capacity() >= 5);
        assert_eq!(
            tracker.register(2, InstanceHandle(9)),
            Err(PoolError::UnknownSlot(2))
        );
    }

    #[test]
    fn test_tick_prunes_finished_instances() {
        let engine = mock::Engine::new("mock");
        let mut pool = BufferPool::new(2, 16);
        let mut tracker = InstanceTracker::new(2, 4);
        let (short, short_data) = ready_slot(&engine, &mut pool, 10);
        let (long, long_data) = ready_slot(&engine, &mut pool, 100);

        for _ in 0..3 {
            let instance = engine.new_instance(short_data).unwrap();
            engine.play(instance).unwrap();
            tracker.register(short, instance).unwrap();
        }
        let survivor = engine.new_instance(long_data).unwrap();
        engine.play(survivor).unwrap();
        tracker.register(long, survivor).unwrap();

        assert_eq!(tracker.tick(&engine, &pool), 0);
        engine.advance(50);
        assert_eq!(tracker.tick(&engine, &pool), 3);
        assert_eq!(tracker.count(short), 0);
        assert_eq!(tracker.instances(long), &[survivor]);
        assert_eq!(engine.stats().instances_deleted, 3);
        assert_eq!(engine.live_instances(), 1);
    }

    #[test]
    fn test_tick_skips_slots_not_built() {
        let engine = mock::Engine::new("mock");
        let mut pool = BufferPool::new(1, 16);
        let mut tracker = InstanceTracker::new(1, 4);
        let index = pool.acquire().unwrap();
        // Never played, so the engine reports it as not playing.
        tracker.register(index, InstanceHandle(42)).unwrap();

        assert_eq!(tracker.tick(&engine, &pool), 0);
        assert_eq!(tracker.count(index), 1);
    }

    #[test]
    fn test_tick_covers_pending_return() {
        let engine = mock::Engine::new("mock");
        let mut pool = BufferPool::new(1, 16);
        let mut tracker = InstanceTracker::new(1, 4);
        let (index, sound_data) = ready_slot(&engine, &mut pool, 10);
        let instance = engine.new_instance(sound_data).unwrap();
        engine.play(instance).unwrap();
        tracker.register(index, instance).unwrap();
        pool.mark_pending(index).unwrap();

        engine.finish_all();
        assert_eq!(tracker.tick(&engine, &pool), 1);
        assert_eq!(tracker.total(), 0);
    }

    #[test]
    fn test_drain() {
        let mut tracker = InstanceTracker::new(3, 1);
        tracker.register(0, InstanceHandle(1)).unwrap();
        tracker.register(2, InstanceHandle(2)).unwrap();
        tracker.register(2, InstanceHandle(3)).unwrap();
        assert_eq!(tracker.drain().len(), 3);
        assert_eq!(tracker.total(), 0);
    }
}
