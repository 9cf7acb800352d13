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
use std::f64::consts::TAU;

/// The oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sine,
    Triangle,
    Sawtooth,
    Tangent,
    Noise,
}

impl Shape {
    /// Selects the waveform for a raw `shape` parameter. Only exactly zero is a
    /// sine; every other value falls into the first bucket whose upper bound it
    /// does not exceed, so 0.5 and negative values are triangles and 1.5 is a
    /// sawtooth.
    pub fn from_value(shape: f64) -> Shape {
        if shape == 0.0 {
            Shape::Sine
        } else if shape <= 1.0 {
            Shape::Triangle
        } else if shape <= 2.0 {
            Shape::Sawtooth
        } else if shape <= 3.0 {
            Shape::Tangent
        } else {
            Shape::Noise
        }
    }

    /// Evaluates the waveform at phase `t` (radians, unbounded).
    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            Shape::Sine => t.sin(),
            // The phase is rounded at single precision.
            Shape::Triangle => 1.0 - 4.0 * (((t / TAU) as f32).round() as f64 - t / TAU).abs(),
            Shape::Sawtooth => 1.0 - ((2.0 * t / TAU) % 2.0 + 2.0) % 2.0,
            Shape::Tangent => t.tan().clamp(-1.0, 1.0),
            Shape::Noise => (t % TAU).powi(3).sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_selection() {
        assert_eq!(Shape::from_value(0.0), Shape::Sine);
        assert_eq!(Shape::from_value(-0.0), Shape::Sine);
        assert_eq!(Shape::from_value(0.5), Shape::Triangle);
        assert_eq!(Shape::from_value(1.0), Shape::Triangle);
        assert_eq!(Shape::from_value(-3.0), Shape::Triangle);
        assert_eq!(Shape::from_value(1.5), Shape::Sawtooth);
        assert_eq!(Shape::from_value(2.0), Shape::Sawtooth);
        assert_eq!(Shape::from_value(3.0), Shape::Tangent);
        assert_eq!(Shape::from_value(4.0), Shape::Noise);
        assert_eq!(Shape::from_value(17.0), Shape::Noise);
    }

    #[test]
    fn test_triangle() {
        assert_eq!(Shape::Triangle.evaluate(0.0), 1.0);
        assert!((Shape::Triangle.evaluate(TAU / 4.0)).abs() < 1e-6);
        assert!((Shape::Triangle.evaluate(TAU / 2.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sawtooth() {
        assert_eq!(Shape::Sawtooth.evaluate(0.0), 1.0);
        assert!((Shape::Sawtooth.evaluate(TAU / 4.0) - 0.5).abs() < 1e-12);
        // Negative phases wrap into the same range.
        assert!((Shape::Sawtooth.evaluate(-TAU / 4.0) - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_tangent_is_clamped() {
        for i in 0..1000 {
            let v = Shape::Tangent.evaluate(i as f64 * 0.01);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_noise_range() {
        for i in 0..1000 {
            let v = Shape::Noise.evaluate(i as f64 * 0.37);
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
