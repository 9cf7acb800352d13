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

//! Procedural sound effect synthesis with a bounded pool of reusable sample
//! buffers for an external playback engine.

pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod pool;
pub mod session;
pub mod synth;

pub use error::SampleError;
pub use session::{BuiltSample, PlayOptions, Session};
pub use synth::SynthesisParameters;
