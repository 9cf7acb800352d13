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

//! The parameter vector consumed by the synthesizer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The number of parameters accepted by a build request.
pub const PARAMETER_COUNT: usize = 20;

/// Parameter names in the order they are accepted positionally.
pub const PARAMETER_NAMES: [&str; PARAMETER_COUNT] = [
    "loudness",
    "randomness",
    "frequency",
    "attack",
    "sustain",
    "release",
    "shape",
    "shape_curve",
    "slide",
    "delta_slide",
    "pitch_jump",
    "pitch_jump_time",
    "repeat_time",
    "noise",
    "modulation",
    "bit_crush",
    "delay",
    "sustain_volume",
    "decay",
    "tremolo",
];

/// Errors produced while parsing a positional parameter list.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParameterError {
    #[error("Too many parameters: got {0}, at most {PARAMETER_COUNT} are accepted")]
    TooMany(usize),

    #[error("Parameter {name} (position {position}) is not a number: {value:?}")]
    NotANumber {
        name: &'static str,
        position: usize,
        value: String,
    },
}

/// Describes a single sound effect. Times are in seconds, frequencies in Hz.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct SynthesisParameters {
    /// Overall amplitude multiplier.
    pub loudness: f64,
    /// Random frequency spread, as a fraction of the frequency.
    pub randomness: f64,
    /// Base frequency in Hz.
    pub frequency: f64,
    pub attack: f64,
    pub sustain: f64,
    pub release: f64,
    /// Waveform selector: 0 sine, 1 triangle, 2 sawtooth, 3 tangent, 4 noise.
    pub shape: f64,
    /// Exponent applied to the waveform magnitude.
    pub shape_curve: f64,
    /// Frequency change per second.
    pub slide: f64,
    /// Change of slide per second.
    pub delta_slide: f64,
    /// Frequency offset applied once after `pitch_jump_time`.
    pub pitch_jump: f64,
    pub pitch_jump_time: f64,
    /// Period at which frequency and slide are reset.
    pub repeat_time: f64,
    pub noise: f64,
    /// Frequency modulation rate in Hz.
    pub modulation: f64,
    /// Sample-and-hold factor; a value of 0.01 holds each value for one sample.
    pub bit_crush: f64,
    /// Echo offset in seconds.
    pub delay: f64,
    pub sustain_volume: f64,
    pub decay: f64,
    /// Depth of the amplitude modulation tied to `repeat_time`.
    pub tremolo: f64,
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        SynthesisParameters {
            loudness: 1.0,
            randomness: 0.05,
            frequency: 220.0,
            attack: 0.0,
            sustain: 0.0,
            release: 0.1,
            shape: 0.0,
            shape_curve: 1.0,
            slide: 0.0,
            delta_slide: 0.0,
            pitch_jump: 0.0,
            pitch_jump_time: 0.0,
            repeat_time: 0.0,
            noise: 0.0,
            modulation: 0.0,
            bit_crush: 0.0,
            delay: 0.0,
            sustain_volume: 1.0,
            decay: 0.0,
            tremolo: 0.0,
        }
    }
}

impl SynthesisParameters {
    /// Builds parameters from a positional argument list. The first `args.len()`
    /// parameters are taken from `args`, the rest keep their defaults. Extra
    /// arguments beyond the twentieth are ignored.
    pub fn from_args(args: &[f64]) -> SynthesisParameters {
        let mut values = SynthesisParameters::default().to_args();
        for (slot, arg) in values.iter_mut().zip(args) {
            *slot = *arg;
        }
        SynthesisParameters::from_values(values)
    }

    /// Like [`SynthesisParameters::from_args`], but `None` entries keep their default.
    pub fn from_optional_args(args: &[Option<f64>]) -> SynthesisParameters {
        let mut values = SynthesisParameters::default().to_args();
        for (slot, arg) in values.iter_mut().zip(args) {
            if let Some(arg) = arg {
                *slot = *arg;
            }
        }
        SynthesisParameters::from_values(values)
    }

    /// Returns the parameters in positional order.
    pub fn to_args(&self) -> [f64; PARAMETER_COUNT] {
        [
            self.loudness,
            self.randomness,
            self.frequency,
            self.attack,
            self.sustain,
            self.release,
            self.shape,
            self.shape_curve,
            self.slide,
            self.delta_slide,
            self.pitch_jump,
            self.pitch_jump_time,
            self.repeat_time,
            self.noise,
            self.modulation,
            self.bit_crush,
            self.delay,
            self.sustain_volume,
            self.decay,
            self.tremolo,
        ]
    }

    fn from_values(v: [f64; PARAMETER_COUNT]) -> SynthesisParameters {
        SynthesisParameters {
            loudness: v[0],
            randomness: v[1],
            frequency: v[2],
            attack: v[3],
            sustain: v[4],
            release: v[5],
            shape: v[6],
            shape_curve: v[7],
            slide: v[8],
            delta_slide: v[9],
            pitch_jump: v[10],
            pitch_jump_time: v[11],
            repeat_time: v[12],
            noise: v[13],
            modulation: v[14],
            bit_crush: v[15],
            delay: v[16],
            sustain_volume: v[17],
            decay: v[18],
            tremolo: v[19],
        }
    }
}

impl FromStr for SynthesisParameters {
    type Err = ParameterError;

    /// Parses a comma separated positional list such as `1,,440`. Blank entries
    /// keep the default for that position.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(SynthesisParameters::default());
        }

        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() > PARAMETER_COUNT {
            return Err(ParameterError::TooMany(parts.len()));
        }

        let args = parts
            .iter()
            .enumerate()
            .map(|(position, part)| {
                let part = part.trim();
                if part.is_empty() {
                    return Ok(None);
                }
                part.parse::<f64>()
                    .map(Some)
                    .map_err(|_| ParameterError::NotANumber {
                        name: PARAMETER_NAMES[position],
                        position,
                        value: part.to_string(),
                    })
            })
            .collect::<Result<Vec<Option<f64>>, ParameterError>>()?;

        Ok(SynthesisParameters::from_optional_args(&args))
    }
}
