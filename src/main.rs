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
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use zzfx::config::SessionConfig;
use zzfx::engine::mock;
use zzfx::synth::{SynthesisParameters, Synthesizer, DEFAULT_VOLUME, PARAMETER_NAMES};
use zzfx::{encoder, Session};

/// Ticks per second of virtual time when simulating.
const SIMULATED_TICK_RATE: u32 = 60;

/// Upper bound on simulated ticks before giving up on reclamation.
const MAX_SIMULATED_TICKS: usize = 100_000;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A procedural sound effect synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesizes one sound effect to a file.
    Render {
        /// The file to write.
        output: PathBuf,
        /// Comma separated parameters in order. Blank entries keep the default.
        /// For example, 1,,440 is a louder, non-random 440Hz tone.
        #[arg[short, long]]
        params: Option<String>,
        /// The sample rate to synthesize at.
        #[arg[short = 'r', long, default_value_t = 44100]]
        sample_rate: u32,
        /// Seed for the random source. Unseeded runs vary in pitch.
        #[arg[short, long]]
        seed: Option<u64>,
        /// The master volume.
        #[arg[short, long, default_value_t = DEFAULT_VOLUME]]
        volume: f64,
        /// Write the playback engine container instead of a standard WAV file.
        #[arg[long]]
        raw: bool,
    },
    /// Runs a sample through the full pool lifecycle against a simulated engine.
    Simulate {
        /// The path to a session config.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// Comma separated parameters in order.
        #[arg[short, long]]
        params: Option<String>,
        /// How many times to play the sample.
        #[arg[short = 'n', long, default_value_t = 3]]
        plays: usize,
        /// Seed for the random source.
        #[arg[short, long]]
        seed: Option<u64>,
    },
    /// Prints the synthesis parameters and their defaults.
    Defaults {
        /// Print as JSON.
        #[arg[long]]
        json: bool,
    },
}

fn parse_params(params: Option<&str>) -> Result<SynthesisParameters, Box<dyn Error>> {
    match params {
        Some(params) => Ok(SynthesisParameters::from_str(params)?),
        None => Ok(SynthesisParameters::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            output,
            params,
            sample_rate,
            seed,
            volume,
            raw,
        } => {
            if sample_rate == 0 {
                return Err("sample rate must be positive".into());
            }
            let params = parse_params(params.as_deref())?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let samples = Synthesizer::new(sample_rate)
                .with_volume(volume)
                .synthesize(&params, &mut rng);

            if raw {
                fs::write(&output, encoder::encode(&samples, sample_rate, 1).as_bytes())?;
            } else {
                encoder::write_wav(&output, &samples, sample_rate)?;
            }
            println!(
                "Wrote {} samples ({:.3}s) to {}",
                samples.len(),
                samples.len() as f64 / sample_rate as f64,
                output.display()
            );
        }
        Commands::Simulate {
            config,
            params,
            plays,
            seed,
        } => {
            let config = match config {
                Some(path) => SessionConfig::deserialize(&path)?,
                None => SessionConfig::default(),
            };
            let params = parse_params(params.as_deref())?;
            let sample_rate = config.sample_rate();

            let engine = Arc::new(mock::Engine::new("simulated"));
            let mut session = match seed {
                Some(seed) => Session::seeded(engine.clone(), config, seed)?,
                None => Session::init(engine.clone(), config)?,
            };

            let sample = session.build_sample(&params)?;
            let index = sample.index();
            println!(
                "Built slot {} with {} samples ({:.3}s)",
                index,
                sample.sample_count(),
                sample.duration().as_secs_f64()
            );
            for _ in 0..plays {
                session.play_sample(&sample)?;
            }
            println!(
                "Playing {} instances, {} free buffers",
                session.tracker().count(index),
                session.pool().free_count()
            );
            sample.release();

            let frames_per_tick = (sample_rate / SIMULATED_TICK_RATE).max(1) as u64;
            let mut ticks = 0;
            loop {
                ticks += 1;
                engine.advance(frames_per_tick);
                let report = session.tick();
                if report.reclaimed.contains(&index) {
                    break;
                }
                if ticks >= MAX_SIMULATED_TICKS {
                    return Err(format!("slot {} was not reclaimed", index).into());
                }
            }
            info!(ticks, index, "Slot reclaimed");

            let stats = engine.stats();
            println!("Reclaimed slot {} after {} ticks", index, ticks);
            println!("Free buffers: {}", session.pool().free_count());
            println!(
                "Sound data: {} created, {} deleted",
                stats.sound_data_created, stats.sound_data_deleted
            );
            println!(
                "Instances: {} created, {} deleted",
                stats.instances_created, stats.instances_deleted
            );
            session.shutdown();
        }
        Commands::Defaults { json } => {
            let defaults = SynthesisParameters::default();
            if json {
                println!("{}", serde_json::to_string_pretty(&defaults)?);
            } else {
                for (name, value) in PARAMETER_NAMES.iter().zip(defaults.to_args()) {
                    println!("{:<16} {}", name, value);
                }
            }
        }
    }

    Ok(())
}
