//! JSON scenario files: world, truth motion, sensing and filter tuning.

use std::path::{Path, PathBuf};

use beacon_core::config::CHI2_3DOF_999;
use beacon_core::{CovarianceUpdate, EkfConfig, EkfError, Landmark, Pose};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::SweepParam;
use crate::sensor::SensorConfig;
use crate::world::{AgentParams, ControlProfile, World};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Filter(#[from] EkfError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid sensor config: {0}")]
    InvalidSensor(String),

    #[error("unknown preset {0:?} (expected one of: {list})", list = PRESETS.join(", "))]
    UnknownPreset(String),

    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Names accepted by [`ScenarioConfig::preset`].
pub const PRESETS: [&str; 2] = ["convergence", "arena"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSpec {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceForm {
    #[default]
    Simple,
    Joseph,
}

impl From<CovarianceForm> for CovarianceUpdate {
    fn from(form: CovarianceForm) -> Self {
        match form {
            CovarianceForm::Simple => Self::Simple,
            CovarianceForm::Joseph => Self::Joseph,
        }
    }
}

/// One complete localization run. Matrices are row-major nested arrays and
/// are checked for shape when the filter config is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub dt: f64,
    pub steps: usize,
    pub landmarks: Vec<LandmarkSpec>,

    // ── Truth ─────────────────────────────────────────────────
    pub true_start: [f64; 3],
    pub control: ControlProfile,
    pub sensor: SensorConfig,

    // ── Filter ────────────────────────────────────────────────
    pub initial_estimate: [f64; 3],
    pub initial_covariance: Vec<Vec<f64>>,
    pub process_noise: Vec<Vec<f64>>,
    pub measurement_noise: Vec<Vec<f64>>,
    pub min_range: f64,
    pub innovation_gate: Option<f64>,
    pub covariance_update: CovarianceForm,

    // ── Output ────────────────────────────────────────────────
    /// Draws from the final belief kept in the result.
    pub samples: usize,
    pub sample_seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::convergence()
    }
}

impl ScenarioConfig {
    /// Straight drive past two landmarks with a badly initialized filter.
    pub fn convergence() -> Self {
        Self {
            name: "convergence".into(),
            dt: 0.1,
            steps: 100,
            landmarks: vec![
                LandmarkSpec { id: 0, x: 10.0, y: 0.0 },
                LandmarkSpec { id: 1, x: 20.0, y: 5.0 },
            ],
            true_start: [0.0, 0.0, 0.0],
            control: ControlProfile::Constant {
                linear: 1.0,
                angular: 0.0,
            },
            sensor: SensorConfig::default(),
            initial_estimate: [5.0, 5.0, 0.5],
            initial_covariance: diag([5.0, 5.0, 5.0]),
            process_noise: diag([0.01, 0.01, 0.001]),
            measurement_noise: diag([1.0, 1.0, 0.1]),
            min_range: 0.5,
            innovation_gate: Some(CHI2_3DOF_999),
            covariance_update: CovarianceForm::Simple,
            samples: 100,
            sample_seed: 7,
        }
    }

    /// Pixel-scale arena with a dense process noise and a weaving agent.
    pub fn arena() -> Self {
        Self {
            name: "arena".into(),
            steps: 600,
            landmarks: vec![
                LandmarkSpec { id: 0, x: 300.0, y: 300.0 },
                LandmarkSpec { id: 1, x: 124.0, y: 478.0 },
            ],
            true_start: [200.0, 200.0, 0.0],
            control: ControlProfile::Slalom {
                linear: 10.0,
                amplitude: 0.5,
                period: 8.0,
            },
            initial_estimate: [200.0, 200.0, 0.0],
            process_noise: vec![vec![0.1; 3]; 3],
            ..Self::convergence()
        }
    }

    pub fn preset(name: &str) -> Result<Self, ScenarioError> {
        match name {
            "convergence" => Ok(Self::convergence()),
            "arena" => Ok(Self::arena()),
            other => Err(ScenarioError::UnknownPreset(other.to_string())),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }

    pub fn world(&self) -> World {
        World::new(
            self.landmarks
                .iter()
                .map(|l| Landmark::new(l.id, l.x, l.y))
                .collect(),
        )
    }

    pub fn agent_params(&self) -> AgentParams {
        AgentParams {
            initial_pose: Pose::from(self.true_start),
            dt: self.dt,
            steps: self.steps,
            profile: self.control,
        }
    }

    /// Validated filter configuration. Non-3x3 matrices fail with
    /// `DimensionMismatch`.
    pub fn ekf_config(&self) -> Result<EkfConfig, ScenarioError> {
        let q = to_dmatrix("process_noise", &self.process_noise)?;
        let r = to_dmatrix("measurement_noise", &self.measurement_noise)?;
        let p0 = to_dmatrix("initial_covariance", &self.initial_covariance)?;

        let config = EkfConfig {
            min_range: self.min_range,
            innovation_gate: self.innovation_gate,
            covariance_update: self.covariance_update.into(),
            ..EkfConfig::from_dynamic(self.dt, &q, &r, &p0)?
        }
        .with_initial_state(Pose::from(self.initial_estimate));
        config.validate()?;
        Ok(config)
    }

    /// Apply one sweep parameter, rejecting values outside its range.
    pub fn apply(&mut self, param: SweepParam, value: f64) -> Result<(), ScenarioError> {
        let spec = param.spec();
        if !(spec.min..=spec.max).contains(&value) {
            return Err(ScenarioError::OutOfRange {
                name: param.name(),
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        match param {
            SweepParam::SensorNoise => self.sensor.noise_scale = value,
            SweepParam::ProcessNoise => scale(&mut self.process_noise, value),
            SweepParam::MeasurementNoise => scale(&mut self.measurement_noise, value),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

fn diag(d: [f64; 3]) -> Vec<Vec<f64>> {
    (0..3)
        .map(|i| (0..3).map(|j| if i == j { d[i] } else { 0.0 }).collect())
        .collect()
}

fn scale(m: &mut [Vec<f64>], factor: f64) {
    m.iter_mut().flatten().for_each(|v| *v *= factor);
}

fn to_dmatrix(what: &'static str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>, EkfError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(EkfError::DimensionMismatch {
            what,
            expected: format!("{ncols} columns in every row"),
            found: format!("a row with {} columns", bad.len()),
        });
    }
    Ok(DMatrix::from_row_iterator(
        nrows,
        ncols,
        rows.iter().flatten().copied(),
    ))
}
