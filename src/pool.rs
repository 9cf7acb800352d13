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

//! The buffer pool and the bookkeeping that decides when a pooled buffer can be
//! reused. Buffers hand out sound data to the playback engine; a buffer only
//! returns to the free list once every instance playing its sound data has
//! finished and the sound data itself has been deleted.

mod buffers;
mod instances;
mod reclaim;

pub use buffers::{BufferPool, BufferSlot, SlotState};
pub use instances::InstanceTracker;
pub use reclaim::{ReclamationScheduler, ReturnQueueEntry};

/// Misuse of the pool state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("slot {0} does not exist")]
    UnknownSlot(usize),
    #[error("slot {index} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        index: usize,
        from: SlotState,
        to: SlotState,
    },
}
