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
use std::fmt;

use sha2::{Digest, Sha256};

pub mod mock;

/// Opaque handle to sound data owned by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundDataHandle(pub u64);

/// Opaque handle to a playback instance owned by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// The encoding of a sound data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundDataType {
    Wav,
    OggVorbis,
}

/// Per-instance playback parameters. Each takes a four component value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Gain,
    Pan,
    Speed,
}

/// Result codes reported by a playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("out of sources")]
    OutOfSources,
    #[error("out of instances")]
    OutOfInstances,
    #[error("out of buffers")]
    OutOfBuffers,
    #[error("resource leak")]
    ResourceLeak,
    #[error("invalid property")]
    InvalidProperty,
    #[error("unknown sound type")]
    UnknownSoundType,
    #[error("invalid stream data")]
    InvalidStreamData,
    #[error("out of memory")]
    OutOfMemory,
    #[error("unsupported")]
    Unsupported,
    #[error("nothing to play")]
    NothingToPlay,
    #[error("unknown error")]
    Unknown,
}

/// The host playback engine. Implementations own their sound data and
/// instances and may mix on their own thread; every method here must be safe to
/// call from the thread that drives the sample pool.
pub trait PlaybackEngine: fmt::Display + Send + Sync {
    /// Creates sound data from an encoded buffer. `name` identifies the data to
    /// the engine.
    fn new_sound_data(
        &self,
        buffer: &[u8],
        kind: SoundDataType,
        name: u64,
    ) -> Result<SoundDataHandle, EngineError>;

    /// Deletes sound data. The handle must not be used afterwards.
    fn delete_sound_data(&self, sound_data: SoundDataHandle) -> Result<(), EngineError>;

    /// Creates a playback instance of the given sound data.
    fn new_instance(&self, sound_data: SoundDataHandle) -> Result<InstanceHandle, EngineError>;

    /// Deletes a playback instance. The handle must not be used afterwards.
    fn delete_instance(&self, instance: InstanceHandle) -> Result<(), EngineError>;

    fn set_looping(&self, instance: InstanceHandle, looping: bool) -> Result<(), EngineError>;

    fn set_parameter(
        &self,
        instance: InstanceHandle,
        parameter: Parameter,
        value: [f32; 4],
    ) -> Result<(), EngineError>;

    fn play(&self, instance: InstanceHandle) -> Result<(), EngineError>;

    fn stop(&self, instance: InstanceHandle) -> Result<(), EngineError>;

    /// Returns true while the instance is still producing sound.
    fn is_playing(&self, instance: InstanceHandle) -> bool;
}

/// Returns the identity hash for the sound data built in slot `index`.
pub fn sound_data_name(index: usize) -> u64 {
    hash_name(&format!("zzfx-{}", index))
}

/// Hashes `name` to 64 bits.
pub fn hash_name(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
