//! Sweepable parameter definitions.

use std::fmt;
use std::str::FromStr;

/// Sweep range of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl ParamSpec {
    /// Create a new parameter range.
    pub const fn new(label: &'static str, min: f64, max: f64) -> Self {
        Self { label, min, max }
    }

    /// `steps` evenly spaced values over `[min, max]`.
    pub fn linspace(&self, steps: usize) -> Vec<f64> {
        match steps {
            0 => Vec::new(),
            1 => vec![self.min],
            _ => (0..steps)
                .map(|i| {
                    let t = i as f64 / (steps - 1) as f64;
                    self.min + t * (self.max - self.min)
                })
                .collect(),
        }
    }
}

/// Multipliers applied to scenario noise levels.
pub mod noise {
    use super::ParamSpec;

    pub const SENSOR_SCALE: ParamSpec = ParamSpec::new("Sensor noise scale", 0.0, 5.0);
    pub const PROCESS_SCALE: ParamSpec = ParamSpec::new("Q scale", 0.01, 100.0);
    pub const MEASUREMENT_SCALE: ParamSpec = ParamSpec::new("R scale", 0.05, 20.0);
}

/// A scenario knob the CLI can sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepParam {
    /// Scales the simulated sensor noise (truth side).
    SensorNoise,
    /// Scales Q (filter side).
    ProcessNoise,
    /// Scales R (filter side).
    MeasurementNoise,
}

pub const SWEEP_PARAMS: [SweepParam; 3] = [
    SweepParam::SensorNoise,
    SweepParam::ProcessNoise,
    SweepParam::MeasurementNoise,
];

impl SweepParam {
    pub fn name(self) -> &'static str {
        match self {
            Self::SensorNoise => "sensor_noise",
            Self::ProcessNoise => "process_noise",
            Self::MeasurementNoise => "measurement_noise",
        }
    }

    pub fn spec(self) -> ParamSpec {
        match self {
            Self::SensorNoise => noise::SENSOR_SCALE,
            Self::ProcessNoise => noise::PROCESS_SCALE,
            Self::MeasurementNoise => noise::MEASUREMENT_SCALE,
        }
    }
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SweepParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SWEEP_PARAMS
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = SWEEP_PARAMS.iter().map(|p| p.name()).collect();
                format!("unknown sweep param {s:?} (expected one of: {})", names.join(", "))
            })
    }
}
