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
use std::{collections::HashMap, fmt};

use parking_lot::Mutex;
use tracing::debug;

use super::{EngineError, InstanceHandle, Parameter, SoundDataHandle, SoundDataType};
use crate::encoder;

/// Counters for everything the engine has been asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub sound_data_created: usize,
    pub sound_data_deleted: usize,
    pub instances_created: usize,
    pub instances_deleted: usize,
    pub plays: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Created,
    Playing,
    Stopped,
}

struct SoundData {
    frames: u64,
}

struct Instance {
    sound_data: u64,
    status: Status,
    looping: bool,
    speed: f32,
    gain: f32,
    pan: f32,
    remaining: f64,
}

#[derive(Default)]
struct Failures {
    sound_data: Option<EngineError>,
    instance: Option<EngineError>,
    play: Option<EngineError>,
    stop: Option<EngineError>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    sound_data: HashMap<u64, SoundData>,
    instances: HashMap<u64, Instance>,
    deleted_sound_data: Vec<SoundDataHandle>,
    stats: Stats,
    failures: Failures,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A simulated playback engine. Doesn't actually play anything: instances run
/// for the length of their sound data in virtual time, which only moves when
/// [`Engine::advance`] is called.
pub struct Engine {
    name: String,
    state: Mutex<State>,
}

impl Engine {
    /// Creates a new simulated engine.
    pub fn new(name: &str) -> Engine {
        Engine {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Moves virtual time forward by `frames` frames.
    pub fn advance(&self, frames: u64) {
        let mut state = self.state.lock();
        let State {
            sound_data,
            instances,
            ..
        } = &mut *state;

        for instance in instances.values_mut() {
            if instance.status != Status::Playing {
                continue;
            }
            instance.remaining -= frames as f64 * instance.speed as f64;
            if instance.looping && instance.remaining <= 0.0 {
                if let Some(data) = sound_data.get(&instance.sound_data) {
                    if data.frames > 0 {
                        instance.remaining =
                            instance.remaining.rem_euclid(data.frames as f64) + 1.0;
                    }
                }
            }
        }
    }

    /// Finishes every playing instance immediately.
    pub fn finish_all(&self) {
        let mut state = self.state.lock();
        for instance in state.instances.values_mut() {
            instance.remaining = 0.0;
            instance.looping = false;
        }
    }

    /// Makes the next sound data creation fail with `error`.
    pub fn fail_next_sound_data(&self, error: EngineError) {
        self.state.lock().failures.sound_data = Some(error);
    }

    /// Makes the next instance creation fail with `error`.
    pub fn fail_next_instance(&self, error: EngineError) {
        self.state.lock().failures.instance = Some(error);
    }

    /// Makes the next play request fail with `error`.
    pub fn fail_next_play(&self, error: EngineError) {
        self.state.lock().failures.play = Some(error);
    }

    /// Makes the next stop request fail with `error`.
    pub fn fail_next_stop(&self, error: EngineError) {
        self.state.lock().failures.stop = Some(error);
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().stats
    }

    /// Number of sound data resources that have not been deleted.
    pub fn live_sound_data(&self) -> usize {
        self.state.lock().sound_data.len()
    }

    /// Number of instances that have not been deleted.
    pub fn live_instances(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Every delete request received, in order, including failed ones.
    pub fn deleted_sound_data(&self) -> Vec<SoundDataHandle> {
        self.state.lock().deleted_sound_data.clone()
    }

    /// Returns the gain, pan and speed of a live instance.
    pub fn instance_parameters(&self, instance: InstanceHandle) -> Option<(f32, f32, f32)> {
        self.state
            .lock()
            .instances
            .get(&instance.0)
            .map(|i| (i.gain, i.pan, i.speed))
    }
}

impl super::PlaybackEngine for Engine {
    fn new_sound_data(
        &self,
        buffer: &[u8],
        kind: SoundDataType,
        name: u64,
    ) -> Result<SoundDataHandle, EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.sound_data.take() {
            return Err(error);
        }
        if kind != SoundDataType::Wav {
            return Err(EngineError::UnknownSoundType);
        }

        let header = encoder::parse_header(buffer).ok_or(EngineError::InvalidStreamData)?;
        if header.channels == 0 || header.bits_per_sample != encoder::BITS_PER_SAMPLE {
            return Err(EngineError::InvalidStreamData);
        }
        let frames = header.data_size as u64 / 2 / header.channels as u64;

        let id = state.next_id();
        state.sound_data.insert(id, SoundData { frames });
        state.stats.sound_data_created += 1;
        debug!(engine = self.name, id, name, frames, "Created sound data");
        Ok(SoundDataHandle(id))
    }

    fn delete_sound_data(&self, sound_data: SoundDataHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.deleted_sound_data.push(sound_data);
        if state
            .instances
            .values()
            .any(|instance| instance.sound_data == sound_data.0)
        {
            return Err(EngineError::ResourceLeak);
        }
        match state.sound_data.remove(&sound_data.0) {
            Some(_) => {
                state.stats.sound_data_deleted += 1;
                Ok(())
            }
            None => Err(EngineError::InvalidProperty),
        }
    }

    fn new_instance(&self, sound_data: SoundDataHandle) -> Result<InstanceHandle, EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.instance.take() {
            return Err(error);
        }
        if !state.sound_data.contains_key(&sound_data.0) {
            return Err(EngineError::InvalidProperty);
        }

        let id = state.next_id();
        state.instances.insert(
            id,
            Instance {
                sound_data: sound_data.0,
                status: Status::Created,
                looping: false,
                speed: 1.0,
                gain: 1.0,
                pan: 0.0,
                remaining: 0.0,
            },
        );
        state.stats.instances_created += 1;
        Ok(InstanceHandle(id))
    }

    fn delete_instance(&self, instance: InstanceHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match state.instances.remove(&instance.0) {
            Some(_) => {
                state.stats.instances_deleted += 1;
                Ok(())
            }
            None => Err(EngineError::InvalidProperty),
        }
    }

    fn set_looping(&self, instance: InstanceHandle, looping: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = state
            .instances
            .get_mut(&instance.0)
            .ok_or(EngineError::InvalidProperty)?;
        instance.looping = looping;
        Ok(())
    }

    fn set_parameter(
        &self,
        instance: InstanceHandle,
        parameter: Parameter,
        value: [f32; 4],
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = state
            .instances
            .get_mut(&instance.0)
            .ok_or(EngineError::InvalidProperty)?;
        match parameter {
            Parameter::Gain => instance.gain = value[0],
            Parameter::Pan => instance.pan = value[0],
            Parameter::Speed => instance.speed = value[0],
        }
        Ok(())
    }

    fn play(&self, instance: InstanceHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.play.take() {
            return Err(error);
        }
        let State {
            sound_data,
            instances,
            stats,
            ..
        } = &mut *state;

        let instance = instances
            .get_mut(&instance.0)
            .ok_or(EngineError::InvalidProperty)?;
        let frames = sound_data
            .get(&instance.sound_data)
            .map(|data| data.frames)
            .ok_or(EngineError::InvalidProperty)?;
        instance.status = Status::Playing;
        instance.remaining = frames as f64;
        stats.plays += 1;
        Ok(())
    }

    fn stop(&self, instance: InstanceHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.stop.take() {
            return Err(error);
        }
        let instance = state
            .instances
            .get_mut(&instance.0)
            .ok_or(EngineError::InvalidProperty)?;
        instance.status = Status::Stopped;
        Ok(())
    }

    fn is_playing(&self, instance: InstanceHandle) -> bool {
        self.state
            .lock()
            .instances
            .get(&instance.0)
            .is_some_and(|i| i.status == Status::Playing && i.remaining > 0.0)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
