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

//! The caller-facing sample session. A [`Session`] owns the buffer pool, the
//! instance tracker and the reclamation scheduler, and drives all three from
//! [`Session::tick`], which the host calls once per update.
//!
//! A built sample is handed out as a reference-counted [`BuiltSample`]. When
//! the last clone is dropped the slot is queued for return on the next tick;
//! it only becomes reusable once every instance playing from it has finished.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, SessionConfig};
use crate::encoder::{self, SampleBuffer};
use crate::engine::{
    self, EngineError, InstanceHandle, Parameter, PlaybackEngine, SoundDataHandle, SoundDataType,
};
use crate::error::SampleError;
use crate::pool::{BufferPool, InstanceTracker, ReclamationScheduler, ReturnQueueEntry};
use crate::synth::{RandomSource, SynthesisParameters, Synthesizer};

/// Global session ID counter.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Per-play instance parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub gain: f32,
    pub pan: f32,
    pub speed: f32,
}

impl Default for PlayOptions {
    fn default() -> Self {
        PlayOptions {
            gain: 1.0,
            pan: 0.0,
            speed: 1.0,
        }
    }
}

struct Sample {
    session: u64,
    index: usize,
    sound_data: SoundDataHandle,
    samples: usize,
    sample_rate: u32,
    release_tx: Sender<ReturnQueueEntry>,
}

impl Drop for Sample {
    fn drop(&mut self) {
        // The session may already be gone, in which case its shutdown has
        // deleted the sound data.
        let _ = self.release_tx.send(ReturnQueueEntry {
            index: self.index,
            sound_data: self.sound_data,
        });
    }
}

/// A sample that has been built into a pool slot and can be played any number
/// of times. Clones share the slot.
#[derive(Clone)]
pub struct BuiltSample {
    inner: Arc<Sample>,
}

impl BuiltSample {
    /// The pool slot holding this sample.
    pub fn index(&self) -> usize {
        self.inner.index
    }

    pub fn sound_data(&self) -> SoundDataHandle {
        self.inner.sound_data
    }

    /// Number of synthesized samples, excluding the container header.
    pub fn sample_count(&self) -> usize {
        self.inner.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.inner.samples as f64 / self.inner.sample_rate as f64)
    }

    /// Gives up this reference. Equivalent to dropping it.
    pub fn release(self) {}
}

impl fmt::Debug for BuiltSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltSample")
            .field("session", &self.inner.session)
            .field("index", &self.inner.index)
            .field("samples", &self.inner.samples)
            .field("sample_rate", &self.inner.sample_rate)
            .finish()
    }
}

/// What a single [`Session::tick`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Finished instances deleted.
    pub pruned: usize,
    /// Slots returned to the free list.
    pub reclaimed: Vec<usize>,
}

/// Owns the sample pool and its lifecycle against a playback engine.
pub struct Session {
    id: u64,
    engine: Arc<dyn PlaybackEngine>,
    sample_rate: u32,
    max_duration: Duration,
    volume: f64,
    rng: Box<dyn RandomSource + Send>,
    pool: BufferPool,
    tracker: InstanceTracker,
    scheduler: ReclamationScheduler,
    release_tx: Sender<ReturnQueueEntry>,
    release_rx: Receiver<ReturnQueueEntry>,
    scratch: Vec<f64>,
}

impl Session {
    /// Creates a session with an entropy seeded random source.
    pub fn init(
        engine: Arc<dyn PlaybackEngine>,
        config: SessionConfig,
    ) -> Result<Session, ConfigError> {
        Session::with_rng(engine, config, StdRng::from_entropy())
    }

    /// Creates a session with a deterministic random source.
    pub fn seeded(
        engine: Arc<dyn PlaybackEngine>,
        config: SessionConfig,
        seed: u64,
    ) -> Result<Session, ConfigError> {
        Session::with_rng(engine, config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: RandomSource + Send + 'static>(
        engine: Arc<dyn PlaybackEngine>,
        config: SessionConfig,
        rng: R,
    ) -> Result<Session, ConfigError> {
        config.validate()?;

        let slot_samples = config.words_per_slot()? - encoder::HEADER_WORDS;
        let buffer_count = config.buffer_count();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let session = Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst),
            engine,
            sample_rate: config.sample_rate(),
            max_duration: config.max_duration()?,
            volume: config.volume(),
            rng: Box::new(rng),
            pool: BufferPool::new(buffer_count, slot_samples),
            tracker: InstanceTracker::new(buffer_count, config.instance_capacity()),
            scheduler: ReclamationScheduler::new(buffer_count),
            release_tx,
            release_rx,
            scratch: Vec::with_capacity(slot_samples),
        };

        info!(
            session = session.id,
            engine = %session.engine,
            buffers = buffer_count,
            sample_rate = session.sample_rate,
            "Sample session initialized"
        );
        Ok(session)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sets the sample rate used by later builds, if given, and returns the
    /// current rate. Samples already built keep their rate. Zero is ignored.
    pub fn set_sample_rate(&mut self, sample_rate: Option<u32>) -> u32 {
        match sample_rate {
            Some(0) => warn!("Ignoring sample rate of zero"),
            Some(sample_rate) => {
                debug!(sample_rate, "Sample rate set");
                self.sample_rate = sample_rate;
            }
            None => {}
        }
        self.sample_rate
    }

    /// Synthesizes `params` into a free slot and creates its sound data.
    pub fn build_sample(
        &mut self,
        params: &SynthesisParameters,
    ) -> Result<BuiltSample, SampleError> {
        let index = self.pool.acquire().ok_or_else(|| {
            warn!("Out of sample buffers");
            SampleError::OutOfBuffers
        })?;

        let sound_data = match self.build_into(index, params) {
            Ok(sound_data) => sound_data,
            Err(e) => {
                if let Err(e) = self.pool.abandon(index) {
                    warn!(index, error = %e, "Unable to return buffer slot");
                }
                return Err(e);
            }
        };
        if let Err(e) = self.pool.mark_ready(index, sound_data) {
            if let Err(e) = self.engine.delete_sound_data(sound_data) {
                error!(index, error = %e, "Failed to delete sound data");
            }
            return Err(SampleError::EncodingFailed(e.to_string()));
        }

        let samples = self.scratch.len();
        debug!(index, samples, sample_rate = self.sample_rate, "Built sample");
        Ok(BuiltSample {
            inner: Arc::new(Sample {
                session: self.id,
                index,
                sound_data,
                samples,
                sample_rate: self.sample_rate,
                release_tx: self.release_tx.clone(),
            }),
        })
    }

    fn build_into(
        &mut self,
        index: usize,
        params: &SynthesisParameters,
    ) -> Result<SoundDataHandle, SampleError> {
        let synthesizer = Synthesizer::new(self.sample_rate).with_volume(self.volume);
        let length = synthesizer.sample_count(params);
        let limit = self.max_samples();
        if length > limit {
            warn!(index, length, limit, "Sample is longer than the maximum duration");
            return Err(SampleError::EncodingFailed(format!(
                "{} samples exceed the limit of {}",
                length, limit
            )));
        }
        synthesizer.synthesize_into(params, &mut *self.rng, &mut self.scratch);

        let buffer: &mut SampleBuffer = self
            .pool
            .buffer_mut(index)
            .map_err(|e| SampleError::EncodingFailed(e.to_string()))?;
        encoder::encode_into(buffer, &self.scratch, self.sample_rate, 1);

        self.engine
            .new_sound_data(
                buffer.as_bytes(),
                SoundDataType::Wav,
                engine::sound_data_name(index),
            )
            .map_err(|e| {
                error!(index, error = %e, "Failed to create sound data");
                SampleError::ResourceCreationFailed(e)
            })
    }

    /// The longest sample a build may produce at the current sample rate.
    fn max_samples(&self) -> usize {
        let samples = self.max_duration.as_secs_f64() * self.sample_rate as f64;
        (samples as usize).min(encoder::MAX_SAMPLES)
    }

    /// Plays `sample` once with default gain, pan and speed.
    pub fn play_sample(&mut self, sample: &BuiltSample) -> Result<InstanceHandle, SampleError> {
        self.play_sample_with(sample, PlayOptions::default())
    }

    /// Creates and plays one instance of `sample`.
    pub fn play_sample_with(
        &mut self,
        sample: &BuiltSample,
        options: PlayOptions,
    ) -> Result<InstanceHandle, SampleError> {
        let index = sample.index();
        if sample.inner.session != self.id {
            warn!(index, "Sample belongs to another session");
            return Err(SampleError::StaleSample { index });
        }

        let instance = self
            .engine
            .new_instance(sample.sound_data())
            .map_err(|e| {
                warn!(index, error = %e, "Failed to create sound instance");
                SampleError::InstanceCreationFailed(e)
            })?;

        let configured = self
            .engine
            .set_looping(instance, false)
            .and_then(|_| {
                self.engine
                    .set_parameter(instance, Parameter::Gain, [options.gain; 4])
            })
            .and_then(|_| {
                self.engine
                    .set_parameter(instance, Parameter::Pan, [options.pan; 4])
            })
            .and_then(|_| {
                self.engine
                    .set_parameter(instance, Parameter::Speed, [options.speed; 4])
            });
        if let Err(e) = configured {
            debug!(index, error = %e, "Failed to configure sound instance");
        }

        let played = self.engine.play(instance);

        // Registered even when play fails, so the next tick deletes it.
        if let Err(e) = self.tracker.register(index, instance) {
            warn!(index, error = %e, "Unable to track sound instance");
            if let Err(e) = self.engine.delete_instance(instance) {
                warn!(index, error = %e, "Failed to delete sound instance");
            }
            return Err(SampleError::InstanceCreationFailed(EngineError::Unknown));
        }

        match played {
            Ok(()) => {
                debug!(index, instance = instance.0, "Playing sample");
                Ok(instance)
            }
            Err(e) => {
                warn!(index, error = %e, "Failed to play sound instance");
                Err(SampleError::PlayFailed(e))
            }
        }
    }

    /// Runs one update: collects released samples, prunes finished instances,
    /// then reclaims released slots with nothing left playing.
    pub fn tick(&mut self) -> TickReport {
        while let Ok(entry) = self.release_rx.try_recv() {
            if let Err(e) = self.pool.mark_pending(entry.index) {
                warn!(index = entry.index, error = %e, "Unexpected sample release");
                continue;
            }
            self.scheduler.on_release(entry);
        }

        let pruned = self.tracker.tick(self.engine.as_ref(), &self.pool);
        let reclaimed = self
            .scheduler
            .tick(self.engine.as_ref(), &self.tracker, &mut self.pool);
        for index in &reclaimed {
            debug!(index, "Reclaimed buffer slot");
        }
        TickReport { pruned, reclaimed }
    }

    /// Stops and deletes every instance, deletes all sound data and ends the
    /// session. Samples still held by the caller become stale.
    pub fn shutdown(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let instances = self.tracker.drain();
        for instance in &instances {
            if let Err(e) = self.engine.stop(*instance) {
                debug!(instance = instance.0, error = %e, "Failed to stop sound instance");
            }
            if let Err(e) = self.engine.delete_instance(*instance) {
                warn!(instance = instance.0, error = %e, "Failed to delete sound instance");
            }
        }

        self.scheduler.clear();
        while self.release_rx.try_recv().is_ok() {}

        let sound_data = self.pool.drain_sound_data();
        for handle in &sound_data {
            if let Err(e) = self.engine.delete_sound_data(*handle) {
                error!(sound_data = handle.0, error = %e, "Failed to delete sound data");
            }
        }

        if !instances.is_empty() || !sound_data.is_empty() {
            info!(
                session = self.id,
                instances = instances.len(),
                sound_data = sound_data.len(),
                "Sample session shut down"
            );
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn tracker(&self) -> &InstanceTracker {
        &self.tracker
    }

    pub fn scheduler(&self) -> &ReclamationScheduler {
        &self.scheduler
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("engine", &self.engine.to_string())
            .field("sample_rate", &self.sample_rate)
            .field("free", &self.pool.free_count())
            .field("instances", &self.tracker.total())
            .field("pending", &self.scheduler.pending())
            .finish()
    }
}
