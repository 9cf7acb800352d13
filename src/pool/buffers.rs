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
use tracing::debug;

use super::PoolError;
use crate::encoder::SampleBuffer;
use crate::engine::SoundDataHandle;

/// The lifecycle of a pool slot: `Free -> Building -> Ready -> PendingReturn -> Free`.
/// A `Building` slot may also go straight back to `Free` if its build fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Building,
    Ready,
    PendingReturn,
}

/// One reusable entry in the pool.
pub struct BufferSlot {
    index: usize,
    state: SlotState,
    buffer: SampleBuffer,
    sound_data: Option<SoundDataHandle>,
}

impl BufferSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// The sound data built from this slot, if it is `Ready` or `PendingReturn`.
    pub fn sound_data(&self) -> Option<SoundDataHandle> {
        self.sound_data
    }
}

impl std::fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlot")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("samples", &self.buffer.sample_count())
            .field("sound_data", &self.sound_data)
            .finish()
    }
}

/// A fixed number of buffer slots and a LIFO free list. The pool never grows.
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<BufferSlot>,
    free: Vec<usize>,
}

impl BufferPool {
    /// Creates `count` free slots, each reserving room for `samples_per_slot`
    /// samples plus the container header.
    pub fn new(count: usize, samples_per_slot: usize) -> BufferPool {
        let slots = (0..count)
            .map(|index| BufferSlot {
                index,
                state: SlotState::Free,
                buffer: SampleBuffer::with_capacity(samples_per_slot),
                sound_data: None,
            })
            .collect();
        // Reversed so the first acquire hands out slot 0.
        let free = (0..count).rev().collect();
        BufferPool { slots, free }
    }

    /// Pops a free slot and moves it to `Building`. Returns `None` when every
    /// slot is taken.
    pub fn acquire(&mut self) -> Option<usize> {
        let index = self.free.pop()?;
        self.slots[index].state = SlotState::Building;
        debug!(index, free = self.free.len(), "Acquired buffer slot");
        Some(index)
    }

    /// The buffer of a `Building` slot, to encode into.
    pub fn buffer_mut(&mut self, index: usize) -> Result<&mut SampleBuffer, PoolError> {
        let slot = self.slot_mut(index)?;
        if slot.state != SlotState::Building {
            return Err(PoolError::InvalidTransition {
                index,
                from: slot.state,
                to: SlotState::Building,
            });
        }
        Ok(&mut slot.buffer)
    }

    /// Records the sound data created from a `Building` slot and moves it to `Ready`.
    pub fn mark_ready(
        &mut self,
        index: usize,
        sound_data: SoundDataHandle,
    ) -> Result<(), PoolError> {
        let slot = self.transition(index, SlotState::Building, SlotState::Ready)?;
        slot.sound_data = Some(sound_data);
        Ok(())
    }

    /// Moves a `Ready` slot to `PendingReturn` once its owner has let go of it.
    pub fn mark_pending(&mut self, index: usize) -> Result<(), PoolError> {
        self.transition(index, SlotState::Ready, SlotState::PendingReturn)?;
        Ok(())
    }

    /// Returns a `PendingReturn` slot to the free list. The caller is
    /// responsible for having deleted its sound data.
    pub fn release(&mut self, index: usize) -> Result<(), PoolError> {
        let slot = self.transition(index, SlotState::PendingReturn, SlotState::Free)?;
        slot.sound_data = None;
        self.free.push(index);
        debug!(index, free = self.free.len(), "Released buffer slot");
        Ok(())
    }

    /// Returns a `Building` slot to the free list after a failed build.
    pub fn abandon(&mut self, index: usize) -> Result<(), PoolError> {
        self.transition(index, SlotState::Building, SlotState::Free)?;
        self.free.push(index);
        debug!(index, "Abandoned buffer slot");
        Ok(())
    }

    /// Takes the sound data out of every built slot and frees all slots.
    pub(crate) fn drain_sound_data(&mut self) -> Vec<SoundDataHandle> {
        let mut sound_data = Vec::new();
        self.free.clear();
        for slot in self.slots.iter_mut().rev() {
            sound_data.extend(slot.sound_data.take());
            slot.state = SlotState::Free;
            self.free.push(slot.index);
        }
        sound_data
    }

    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.slots.get(index)
    }

    pub fn state(&self, index: usize) -> Option<SlotState> {
        self.slot(index).map(BufferSlot::state)
    }

    pub fn slots(&self) -> impl Iterator<Item = &BufferSlot> {
        self.slots.iter()
    }

    /// The free list, last entry first out.
    pub fn free_indices(&self) -> &[usize] {
        &self.free
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut BufferSlot, PoolError> {
        self.slots
            .get_mut(index)
            .ok_or(PoolError::UnknownSlot(index))
    }

    fn transition(
        &mut self,
        index: usize,
        from: SlotState,
        to: SlotState,
    ) -> Result<&mut BufferSlot, PoolError> {
        let slot = self.slot_mut(index)?;
        if slot.state != from {
            return Err(PoolError::InvalidTransition {
                index,
                from: slot.state,
                to,
            });
        }
        slot.state = to;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = BufferPool::new(4, 16);
        let mut seen = HashSet::new();
        for _ in 0..4 {
            let index = pool.acquire().unwrap();
            assert!(seen.insert(index), "slot {} handed out twice", index);
            assert_eq!(pool.state(index), Some(SlotState::Building));
        }
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_slots_reserve_capacity() {
        let pool = BufferPool::new(2, 1000);
        for slot in pool.slots() {
            assert!(slot.buffer().capacity() >= 1000);
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let mut pool = BufferPool::new(2, 16);
        let index = pool.acquire().unwrap();
        assert_eq!(index, 0);
        pool.mark_ready(index, SoundDataHandle(7)).unwrap();
        assert_eq!(pool.slot(index).unwrap().sound_data(), Some(SoundDataHandle(7)));
        pool.mark_pending(index).unwrap();
        assert_eq!(pool.state(index), Some(SlotState::PendingReturn));
        pool.release(index).unwrap();
        assert_eq!(pool.state(index), Some(SlotState::Free));
        assert_eq!(pool.slot(index).unwrap().sound_data(), None);
        assert_eq!(pool.free_indices().iter().filter(|i| **i == index).count(), 1);
        // LIFO: the slot just released comes back first.
        assert_eq!(pool.acquire(), Some(index));
    }

    #[test]
    fn test_release_requires_pending_return() {
        let mut pool = BufferPool::new(1, 16);
        let index = pool.acquire().unwrap();
        pool.mark_ready(index, SoundDataHandle(1)).unwrap();
        assert_eq!(
            pool.release(index),
            Err(PoolError::InvalidTransition {
                index,
                from: SlotState::Ready,
                to: SlotState::Free,
            })
        );
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.release(5), Err(PoolError::UnknownSlot(5)));
    }

    #[test]
    fn test_abandon_building_slot() {
        let mut pool = BufferPool::new(1, 16);
        let index = pool.acquire().unwrap();
        pool.abandon(index).unwrap();
        assert_eq!(pool.free_count(), 1);
        assert!(pool.abandon(index).is_err());
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_mark_ready_fails_only_outside_building() {
        let mut pool = BufferPool::new(1, 16);
        let index = pool.acquire().unwrap();
        pool.mark_ready(index, SoundDataHandle(1)).unwrap();

        // A rejected mark_ready leaves nothing in Building to abandon.
        assert!(pool.mark_ready(index, SoundDataHandle(2)).is_err());
        assert_eq!(pool.state(index), Some(SlotState::Ready));
        assert!(pool.abandon(index).is_err());
        assert!(pool.mark_ready(3, SoundDataHandle(2)).is_err());
        assert!(pool.slots().all(|s| s.state() != SlotState::Building));
    }

    #[test]
    fn test_buffer_mut_only_while_building() {
        let mut pool = BufferPool::new(1, 16);
        assert!(pool.buffer_mut(0).is_err());
        let index = pool.acquire().unwrap();
        assert!(pool.buffer_mut(index).is_ok());
        pool.mark_ready(index, SoundDataHandle(1)).unwrap();
        assert!(pool.buffer_mut(index).is_err());
    }

    #[test]
    fn test_drain_sound_data() {
        let mut pool = BufferPool::new(3, 16);
        let a = pool.acquire().unwrap();
        pool.mark_ready(a, SoundDataHandle(1)).unwrap();
        let b = pool.acquire().unwrap();
        pool.mark_ready(b, SoundDataHandle(2)).unwrap();
        pool.mark_pending(b).unwrap();
        pool.acquire().unwrap();

        let mut drained = pool.drain_sound_data();
        drained.sort_by_key(|h| h.0);
        assert_eq!(drained, vec![SoundDataHandle(1), SoundDataHandle(2)]);
        assert_eq!(pool.free_count(), 3);
        assert!(pool.slots().all(|s| s.state() == SlotState::Free));
        assert_eq!(pool.acquire(), Some(0));
    }
}
