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
use crate::engine::EngineError;

/// Why a sample could not be built or played. None of these are fatal: the
/// request simply produced no sound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// Every buffer slot is in use. A later tick may free one.
    #[error("out of sample buffers")]
    OutOfBuffers,

    #[error("failed to encode sample: {0}")]
    EncodingFailed(String),

    #[error("failed to create sound data: {0}")]
    ResourceCreationFailed(EngineError),

    #[error("failed to create sound instance: {0}")]
    InstanceCreationFailed(EngineError),

    #[error("failed to play sound instance: {0}")]
    PlayFailed(EngineError),

    /// The sample was built by a session that has since shut down.
    #[error("sample in slot {index} belongs to another session")]
    StaleSample { index: usize },
}
