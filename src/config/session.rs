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
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::encoder::{HEADER_WORDS, MAX_SAMPLES};
use crate::synth::DEFAULT_VOLUME;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BUFFER_COUNT: usize = 32;
const DEFAULT_INSTANCE_CAPACITY: usize = 32;
const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(15);

/// A YAML representation of the sample session configuration. Every field is
/// optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SessionConfig {
    /// Sample rate used for builds (default: 44100)
    sample_rate: Option<u32>,

    /// Number of buffer slots in the pool (default: 32)
    buffer_count: Option<usize>,

    /// Instances reserved per slot, and the growth step once full (default: 32)
    instance_capacity: Option<usize>,

    /// Longest sample the slots are sized for, e.g. "15s" (default: 15s)
    max_duration: Option<String>,

    /// Master volume applied to every sample (default: 0.3)
    volume: Option<f64>,
}

impl SessionConfig {
    /// Parse a session configuration from a YAML file and validate it.
    pub fn deserialize(path: &Path) -> Result<SessionConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SessionConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> SessionConfig {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Overrides the number of buffer slots.
    pub fn with_buffer_count(mut self, buffer_count: usize) -> SessionConfig {
        self.buffer_count = Some(buffer_count);
        self
    }

    /// Overrides the longest sample the slots are sized for.
    pub fn with_max_duration(mut self, max_duration: Duration) -> SessionConfig {
        self.max_duration = Some(format!("{}ms", max_duration.as_millis()));
        self
    }

    /// Overrides the master volume.
    pub fn with_volume(mut self, volume: f64) -> SessionConfig {
        self.volume = Some(volume);
        self
    }

    /// Checks the values that cannot be defaulted around.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.buffer_count() == 0 {
            return Err(ConfigError::Invalid("buffer_count must be positive".into()));
        }
        self.samples_per_slot()?;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count.unwrap_or(DEFAULT_BUFFER_COUNT)
    }

    pub fn instance_capacity(&self) -> usize {
        self.instance_capacity.unwrap_or(DEFAULT_INSTANCE_CAPACITY)
    }

    pub fn max_duration(&self) -> Result<Duration, ConfigError> {
        match &self.max_duration {
            Some(max_duration) => Ok(DurationString::from_string(max_duration.clone())
                .map_err(|e| ConfigError::Invalid(format!("max_duration: {}", e)))?
                .into()),
            None => Ok(DEFAULT_MAX_DURATION),
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }

    /// The longest sample a slot holds, `sample_rate * max_duration`. Fails when
    /// that would not fit the container's size fields.
    pub fn samples_per_slot(&self) -> Result<usize, ConfigError> {
        let samples = self.max_duration()?.as_secs_f64() * self.sample_rate() as f64;
        if samples > MAX_SAMPLES as f64 {
            return Err(ConfigError::Invalid(format!(
                "max_duration of {} samples exceeds the limit of {}",
                samples, MAX_SAMPLES
            )));
        }
        Ok(samples as usize)
    }

    /// Words reserved per slot: the header plus [`SessionConfig::samples_per_slot`].
    pub fn words_per_slot(&self) -> Result<usize, ConfigError> {
        Ok(HEADER_WORDS + self.samples_per_slot()?)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> SessionConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.buffer_count(), 32);
        assert_eq!(config.instance_capacity(), 32);
        assert_eq!(config.max_duration().unwrap(), Duration::from_secs(15));
        assert_eq!(config.volume(), 0.3);
        assert_eq!(config.words_per_slot().unwrap(), 23 + 44100 * 15);
        config.validate().unwrap();
    }

    #[test]
    fn test_deserialize() {
        let config = parse(
            r#"
            sample_rate: 22050
            buffer_count: 4
            instance_capacity: 8
            max_duration: 2s
            volume: 0.5
        "#,
        );
        assert_eq!(config.sample_rate(), 22050);
        assert_eq!(config.buffer_count(), 4);
        assert_eq!(config.instance_capacity(), 8);
        assert_eq!(config.max_duration().unwrap(), Duration::from_secs(2));
        assert_eq!(config.volume(), 0.5);
        assert_eq!(config.words_per_slot().unwrap(), 23 + 44100);
    }

    #[test]
    fn test_partial_uses_defaults() {
        let config = parse("max_duration: 500ms");
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.max_duration().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse("sample_rate: 0").validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse("buffer_count: 0").validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse("max_duration: forever").validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_max_duration_must_fit_container() {
        let config =
            SessionConfig::default().with_max_duration(Duration::from_secs(3600 * 1_000_000));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(config.words_per_slot(), Err(ConfigError::Invalid(_))));

        // 13 hours at 44.1kHz still fits.
        let config =
            SessionConfig::default().with_max_duration(Duration::from_secs(13 * 3600));
        config.validate().unwrap();
        assert!(matches!(
            parse("max_duration: 100000h").validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SessionConfig::default()
            .with_sample_rate(8000)
            .with_buffer_count(2)
            .with_max_duration(Duration::from_millis(250))
            .with_volume(1.0);
        assert_eq!(config.sample_rate(), 8000);
        assert_eq!(config.buffer_count(), 2);
        assert_eq!(config.max_duration().unwrap(), Duration::from_millis(250));
        assert_eq!(config.words_per_slot().unwrap(), 23 + 2000);
        assert_eq!(config.volume(), 1.0);
    }

    #[test]
    fn test_deserialize_missing_file() {
        let result = SessionConfig::deserialize(Path::new("/nonexistent/zzfx.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
