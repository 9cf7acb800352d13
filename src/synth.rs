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

//! Procedural sound-effect synthesis.
//!
//! Turns a [`SynthesisParameters`] vector into a finite sequence of floating
//! point samples. The envelope, waveform, modulation and echo are all computed
//! per sample in a single pass; the only randomness is the frequency spread
//! drawn once from the injected [`RandomSource`].

use std::f64::consts::TAU;

use tracing::{debug, warn};

mod params;
mod shape;

pub use params::{ParameterError, SynthesisParameters, PARAMETER_COUNT, PARAMETER_NAMES};
pub use shape::Shape;

/// Master volume applied to every generated sample.
pub const DEFAULT_VOLUME: f64 = 0.3;

/// Samples added to every attack so a zero attack still ramps in.
pub const ATTACK_FLOOR_SAMPLES: f64 = 9.0;

/// A source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: rand::RngCore> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        rand::Rng::gen::<f64>(self)
    }
}

/// Generates sample data at a fixed sample rate and master volume.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    sample_rate: u32,
    volume: f64,
}

impl Synthesizer {
    /// Creates a synthesizer using [`DEFAULT_VOLUME`].
    pub fn new(sample_rate: u32) -> Synthesizer {
        Synthesizer {
            sample_rate,
            volume: DEFAULT_VOLUME,
        }
    }

    /// Overrides the master volume.
    pub fn with_volume(mut self, volume: f64) -> Synthesizer {
        self.volume = volume;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the number of samples `params` will produce. This does not depend
    /// on the random source.
    pub fn sample_count(&self, params: &SynthesisParameters) -> usize {
        if self.sample_rate == 0 {
            return 0;
        }
        let sample_rate = self.sample_rate as f64;
        total_length(
            params.attack * sample_rate + ATTACK_FLOOR_SAMPLES,
            params.decay * sample_rate,
            params.sustain * sample_rate,
            params.release * sample_rate,
            params.delay * sample_rate,
        )
    }

    /// Synthesizes `params` into a new buffer.
    pub fn synthesize<R: RandomSource + ?Sized>(
        &self,
        params: &SynthesisParameters,
        rng: &mut R,
    ) -> Vec<f64> {
        let mut out = Vec::new();
        self.synthesize_into(params, rng, &mut out);
        out
    }

    /// Synthesizes `params` into `out`, replacing its contents. The existing
    /// allocation is reused when it is large enough.
    pub fn synthesize_into<R: RandomSource + ?Sized>(
        &self,
        params: &SynthesisParameters,
        rng: &mut R,
        out: &mut Vec<f64>,
    ) {
        out.clear();
        if self.sample_rate == 0 {
            warn!("Sample rate is zero, producing no samples");
            return;
        }

        let mut render = Render::new(params, self.sample_rate, self.volume, rng);
        out.reserve(render.length);
        for i in 0..render.length {
            let sample = render.next_sample(i, out);
            out.push(sample);
        }

        debug!(
            samples = render.length,
            sample_rate = self.sample_rate,
            "Synthesized sample"
        );
    }
}

/// Synthesizes `params` at `sample_rate` with the default master volume.
pub fn synthesize<R: RandomSource + ?Sized>(
    params: &SynthesisParameters,
    sample_rate: u32,
    rng: &mut R,
) -> Vec<f64> {
    Synthesizer::new(sample_rate).synthesize(params, rng)
}

fn total_length(attack: f64, decay: f64, sustain: f64, release: f64, delay: f64) -> usize {
    // Truncates toward zero; negative and NaN totals become empty.
    let length = (attack + decay + sustain + release + delay) as i64;
    length.max(0) as usize
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Running state of a single synthesis pass. All times are in samples and all
/// frequencies in radians per sample.
struct Render {
    shape: Shape,
    shape_curve: f64,
    gain: f64,
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    delay: f64,
    sustain_volume: f64,
    tremolo: f64,
    noise: f64,
    bit_crush: f64,
    modulation: f64,
    pitch_jump: f64,
    pitch_jump_time: f64,
    repeat_time: f64,
    repeat_period: i64,
    length: usize,

    frequency: f64,
    start_frequency: f64,
    slide: f64,
    start_slide: f64,
    delta_slide: f64,

    /// Phase accumulator.
    t: f64,
    /// Modulation phase counter.
    tm: f64,
    /// The held output value.
    s: f64,
    /// Pitch jump counter; zero once the jump has fired.
    j: i64,
    /// Repeat counter.
    r: i64,
    /// Bit crush counter.
    c: i64,
}

impl Render {
    fn new<R: RandomSource + ?Sized>(
        params: &SynthesisParameters,
        sample_rate: u32,
        volume: f64,
        rng: &mut R,
    ) -> Render {
        let sr = sample_rate as f64;

        let start_slide = params.slide * 500.0 * TAU / sr / sr;
        let spread = 1.0 + params.randomness * 2.0 * rng.next_unit() - params.randomness;
        let start_frequency = params.frequency * spread * TAU / sr;

        let attack = params.attack * sr + ATTACK_FLOOR_SAMPLES;
        let decay = params.decay * sr;
        let sustain = params.sustain * sr;
        let release = params.release * sr;
        let delay = params.delay * sr;
        let repeat_time = (params.repeat_time * sr).floor();

        Render {
            shape: Shape::from_value(params.shape),
            shape_curve: params.shape_curve,
            gain: volume * params.loudness,
            attack,
            decay,
            sustain,
            release,
            delay,
            sustain_volume: params.sustain_volume,
            tremolo: params.tremolo,
            noise: params.noise,
            bit_crush: params.bit_crush,
            modulation: params.modulation * TAU / sr,
            pitch_jump: params.pitch_jump * TAU / sr,
            pitch_jump_time: params.pitch_jump_time * sr,
            repeat_time,
            repeat_period: repeat_time as i64,
            length: total_length(attack, decay, sustain, release, delay),
            frequency: start_frequency,
            start_frequency,
            slide: start_slide,
            start_slide,
            delta_slide: params.delta_slide * 500.0 * TAU / sr.powi(3),
            t: 0.0,
            tm: 0.0,
            s: 0.0,
            j: 1,
            r: 0,
            c: 0,
        }
    }

    /// Produces sample `i`. `history` holds every sample produced so far.
    fn next_sample(&mut self, i: usize, history: &[f64]) -> f64 {
        let crush = (self.bit_crush * 100.0) as i64;
        self.c += 1;
        if crush == 0 || self.c % crush == 0 {
            self.s = self.shaped(i) * self.envelope(i);
            if self.delay != 0.0 {
                self.s = self.s / 2.0 + self.echo(i, history);
            }
        }

        self.advance(i);
        self.s
    }

    /// The waveform with tremolo, curve and gain applied.
    fn shaped(&self, i: usize) -> f64 {
        let raw = self.shape.evaluate(self.t);
        let tremolo = if self.repeat_time != 0.0 {
            1.0 - self.tremolo + self.tremolo * (TAU * i as f64 / self.repeat_time).sin()
        } else {
            1.0
        };
        tremolo * sign(raw) * raw.abs().powf(self.shape_curve) * self.gain
    }

    fn envelope(&self, i: usize) -> f64 {
        let i = i as f64;
        let length = self.length as f64;
        if i < self.attack {
            i / self.attack
        } else if i < self.attack + self.decay {
            1.0 - ((i - self.attack) / self.decay) * (1.0 - self.sustain_volume)
        } else if i < self.attack + self.decay + self.sustain {
            self.sustain_volume
        } else if i < length - self.delay {
            (length - i - self.delay) / self.release * self.sustain_volume
        } else {
            0.0
        }
    }

    /// The delayed tap, fading out over the trailing delay window.
    fn echo(&self, i: usize, history: &[f64]) -> f64 {
        let offset = self.delay as i64;
        let index = i as i64;
        if offset > index {
            return 0.0;
        }
        let weight = if index < self.length as i64 - offset {
            1.0
        } else {
            (self.length as f64 - i as f64) / self.delay
        };
        let tap = history
            .get((index - offset) as usize)
            .copied()
            .unwrap_or(0.0);
        weight * tap / 2.0
    }

    /// Moves the oscillator forward by one sample.
    fn advance(&mut self, i: usize) {
        self.slide += self.delta_slide;
        self.frequency += self.slide;
        let f = self.frequency * (self.modulation * self.tm).cos();
        self.tm += 1.0;

        // Deterministic jitter in [-1, 1) derived from the sample index.
        let jitter = 1.0 - (((i as f64).sin() + 1.0) * 1e9) % 2.0;
        self.t += f - f * self.noise * jitter;

        if self.j != 0 {
            self.j += 1;
            if self.j as f64 > self.pitch_jump_time {
                self.frequency += self.pitch_jump;
                self.start_frequency += self.pitch_jump;
                self.j = 0;
            }
        }

        if self.repeat_period != 0 {
            self.r += 1;
            if self.r % self.repeat_period == 0 {
                self.frequency = self.start_frequency;
                self.slide = self.start_slide;
                self.j = self.j.max(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    /// Always returns the midpoint, which cancels the frequency spread.
    struct Midpoint;

    impl RandomSource for Midpoint {
        fn next_unit(&mut self) -> f64 {
            0.5
        }
    }

    fn params(overrides: impl FnOnce(&mut SynthesisParameters)) -> SynthesisParameters {
        let mut params = SynthesisParameters::default();
        overrides(&mut params);
        params
    }

    #[test]
    fn test_default_length() {
        let params = SynthesisParameters::default();
        let samples = synthesize(&params, SAMPLE_RATE, &mut StdRng::seed_from_u64(1));

        // 9 sample attack floor + 0.1s release.
        assert_eq!(samples.len(), 9 + 4410);
        assert_eq!(
            Synthesizer::new(SAMPLE_RATE).sample_count(&params),
            samples.len()
        );
    }

    #[test]
    fn test_length_is_sum_of_phases() {
        let params = params(|p| {
            p.attack = 0.01;
            p.decay = 0.02;
            p.sustain = 0.03;
            p.release = 0.04;
            p.delay = 0.05;
        });
        let samples = synthesize(&params, SAMPLE_RATE, &mut Midpoint);
        let expected = (0.01f64 * 44100.0 + 9.0
            + 0.02 * 44100.0
            + 0.03 * 44100.0
            + 0.04 * 44100.0
            + 0.05 * 44100.0) as usize;
        assert_eq!(samples.len(), expected);
    }

    #[test]
    fn test_default_is_audible_and_ramps_in() {
        let samples = synthesize(
            &SynthesisParameters::default(),
            SAMPLE_RATE,
            &mut StdRng::seed_from_u64(7),
        );

        assert_eq!(samples[0], 0.0);
        for i in 1..9 {
            assert!(
                samples[i] > samples[i - 1],
                "sample {} ({}) should exceed sample {} ({})",
                i,
                samples[i],
                i - 1,
                samples[i - 1]
            );
        }

        let peak = samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.1);
        assert!(peak <= DEFAULT_VOLUME + 1e-9);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let params = params(|p| p.randomness = 0.5);
        let a = synthesize(&params, SAMPLE_RATE, &mut StdRng::seed_from_u64(42));
        let b = synthesize(&params, SAMPLE_RATE, &mut StdRng::seed_from_u64(42));
        let c = synthesize(&params, SAMPLE_RATE, &mut StdRng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_when_length_not_positive() {
        let params = params(|p| {
            p.release = -1.0;
        });
        assert!(synthesize(&params, SAMPLE_RATE, &mut Midpoint).is_empty());
        assert!(synthesize(&SynthesisParameters::default(), 0, &mut Midpoint).is_empty());
    }

    #[test]
    fn test_sustain_volume_envelope() {
        let params = params(|p| {
            p.attack = 0.0;
            p.decay = 0.0;
            p.sustain = 0.1;
            p.release = 0.0;
            p.sustain_volume = 0.5;
            p.shape = 2.0;
            p.frequency = 0.0;
        });
        // A zero-frequency sawtooth sits at 1.0, exposing the envelope directly.
        let samples = synthesize(&params, SAMPLE_RATE, &mut Midpoint);
        assert_eq!(samples.len(), 9 + 4410);
        for sample in &samples[9..] {
            assert!((sample - 0.5 * DEFAULT_VOLUME).abs() < 1e-12);
        }
    }

    #[test]
    fn test_volume_and_loudness_scale_output() {
        let base = synthesize(&SynthesisParameters::default(), SAMPLE_RATE, &mut Midpoint);
        let loud = Synthesizer::new(SAMPLE_RATE)
            .with_volume(0.6)
            .synthesize(&params(|p| p.loudness = 2.0), &mut Midpoint);
        for (a, b) in base.iter().zip(loud.iter()) {
            assert!((a * 4.0 - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bit_crush_holds_values() {
        let params = params(|p| p.bit_crush = 0.04);
        let samples = synthesize(&params, SAMPLE_RATE, &mut Midpoint);
        // The value is recomputed on every fourth iteration and held in between.
        for chunk in samples[3..].chunks(4) {
            assert!(chunk.iter().all(|s| *s == chunk[0]));
        }
        assert_eq!(&samples[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_no_bit_crush_recomputes_every_sample() {
        let samples = synthesize(&SynthesisParameters::default(), SAMPLE_RATE, &mut Midpoint);
        let repeated = samples.windows(2).filter(|w| w[0] == w[1]).count();
        assert!(repeated < samples.len() / 100);
    }

    #[test]
    fn test_without_delay_no_echo() {
        let params = params(|p| {
            p.shape = 2.0;
            p.frequency = 0.0;
            p.sustain = 0.1;
            p.release = 0.0;
        });
        let samples = synthesize(&params, SAMPLE_RATE, &mut Midpoint);
        // The dry signal passes through at full level.
        for sample in &samples[9..] {
            assert!((sample - DEFAULT_VOLUME).abs() < 1e-12);
        }
    }

    #[test]
    fn test_delay_blends_previous_output() {
        let params = params(|p| {
            p.delay = 0.01;
            p.shape = 2.0;
            p.frequency = 0.0;
            p.attack = 0.0;
            p.sustain = 0.1;
            p.release = 0.0;
        });
        let samples = synthesize(&params, SAMPLE_RATE, &mut Midpoint);
        let delay = 441;
        // Before the echo arrives, the dry signal is halved.
        assert!((samples[100] - DEFAULT_VOLUME / 2.0).abs() < 1e-12);
        // Once it arrives, half the delayed sample is added back.
        let expected = DEFAULT_VOLUME / 2.0 + samples[1000 - delay] / 2.0;
        assert!((samples[1000] - expected).abs() < 1e-12);
        // The trailing window fades to silence.
        assert!(samples.last().unwrap().abs() < 0.01);
    }

    #[test]
    fn test_pitch_jump_fires_once() {
        let params = params(|p| {
            p.randomness = 0.0;
            p.pitch_jump = 100.0;
            p.pitch_jump_time = 0.01;
        });
        let sr = SAMPLE_RATE as f64;
        let mut rng = Midpoint;
        let mut render = Render::new(&params, SAMPLE_RATE, DEFAULT_VOLUME, &mut rng);
        let start = render.frequency;
        let jump = 100.0 * TAU / sr;
        let mut history = Vec::new();
        for i in 0..render.length {
            let s = render.next_sample(i, &history);
            history.push(s);
            if i + 2 < 441 {
                assert_eq!(render.frequency, start);
            }
        }
        assert!((render.frequency - (start + jump)).abs() < 1e-12);
        assert!((render.start_frequency - (start + jump)).abs() < 1e-12);
        assert_eq!(render.j, 0);
    }

    #[test]
    fn test_repeat_resets_frequency_and_slide() {
        let params = params(|p| {
            p.randomness = 0.0;
            p.slide = 10.0;
            p.release = 0.3;
            p.repeat_time = 0.1;
        });
        let mut rng = Midpoint;
        let mut render = Render::new(&params, SAMPLE_RATE, DEFAULT_VOLUME, &mut rng);
        let start_frequency = render.frequency;
        let start_slide = render.slide;
        let period = render.repeat_period as usize;
        assert_eq!(period, 4410);
        assert!(render.length >= 2 * period);

        let mut history = Vec::new();
        let mut boundaries = 0;
        for i in 0..render.length {
            let s = render.next_sample(i, &history);
            history.push(s);
            if (i + 1) % period == 0 {
                boundaries += 1;
                assert_eq!(render.frequency, start_frequency);
                assert_eq!(render.slide, start_slide);
            } else {
                assert_ne!(render.frequency, start_frequency);
            }
        }
        assert!(boundaries >= 2);
    }

    #[test]
    fn test_tremolo_modulates_amplitude() {
        let flat = params(|p| {
            p.shape = 2.0;
            p.frequency = 0.0;
            p.sustain = 0.1;
            p.release = 0.0;
            p.repeat_time = 0.05;
        });
        let wobble = SynthesisParameters {
            tremolo: 0.5,
            ..flat
        };
        let a = synthesize(&flat, SAMPLE_RATE, &mut Midpoint);
        let b = synthesize(&wobble, SAMPLE_RATE, &mut Midpoint);
        assert_eq!(a.len(), b.len());
        let quarter = (0.05 * 44100.0 / 4.0) as usize;
        // At a quarter period the tremolo sine peaks, restoring full amplitude.
        assert!((a[quarter] - b[quarter]).abs() < 1e-3);
        // At three quarters it bottoms out at 1 - 2 * tremolo.
        assert!(b[3 * quarter].abs() < 1e-3);
    }

    #[test]
    fn test_noise_perturbs_phase() {
        let clean = synthesize(&SynthesisParameters::default(), SAMPLE_RATE, &mut Midpoint);
        let noisy = synthesize(&params(|p| p.noise = 1.0), SAMPLE_RATE, &mut Midpoint);
        assert_eq!(clean.len(), noisy.len());
        assert_ne!(clean, noisy);
        // The jitter is a function of the sample index only.
        let again = synthesize(&params(|p| p.noise = 1.0), SAMPLE_RATE, &mut Midpoint);
        assert_eq!(noisy, again);
    }

    #[test]
    fn test_synthesize_into_reuses_buffer() {
        let synth = Synthesizer::new(SAMPLE_RATE);
        let mut out = Vec::with_capacity(SAMPLE_RATE as usize);
        let ptr = out.as_ptr();
        synth.synthesize_into(&SynthesisParameters::default(), &mut Midpoint, &mut out);
        assert_eq!(out.len(), 4419);
        assert_eq!(out.as_ptr(), ptr);
    }
}
