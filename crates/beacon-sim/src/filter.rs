use beacon_core::geometry::{heading_error, position_error};
use beacon_core::{CovarianceEllipse, EkfError, LandmarkEkf, Matrix3r, Pose};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::scenario::{ScenarioConfig, ScenarioError};
use crate::sensor::{generate_sensor_data, SensorData};
use crate::world::{simulate_agent, SimResult};

/// Sigma multiplier of the reported uncertainty ellipse.
const ELLIPSE_SIGMA: f64 = 2.0;

/// Output of one filter run against simulated data.
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub name: String,
    pub time: Vec<f64>,
    pub truth: Vec<Pose>,
    pub estimate: Vec<Pose>,
    pub covariance_trace: Vec<f64>,
    pub applied: Vec<usize>,
    pub skipped: Vec<usize>,
    /// Normalized innovation squared of every applied correction.
    pub nis: Vec<f64>,

    pub initial_trace: f64,
    pub final_covariance: Matrix3r,
    /// Draws from the final belief.
    pub final_samples: Vec<Pose>,
    pub ellipse: CovarianceEllipse,
}

impl FilterResult {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Root-mean-square position error over the whole run.
    pub fn rmse(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .truth
            .iter()
            .zip(&self.estimate)
            .map(|(t, e)| position_error(t, e).powi(2))
            .sum();
        (sum / self.len() as f64).sqrt()
    }

    pub fn final_position_error(&self) -> Option<f64> {
        Some(position_error(self.truth.last()?, self.estimate.last()?))
    }

    pub fn final_heading_error(&self) -> Option<f64> {
        Some(heading_error(self.truth.last()?, self.estimate.last()?))
    }

    pub fn final_trace(&self) -> f64 {
        self.final_covariance.trace()
    }

    pub fn mean_nis(&self) -> Option<f64> {
        (!self.nis.is_empty()).then(|| self.nis.iter().sum::<f64>() / self.nis.len() as f64)
    }

    pub fn summary(&self) -> serde_json::Value {
        let pose = |p: Option<&Pose>| p.map(|p| [p.x, p.y, p.z]);
        serde_json::json!({
            "name": self.name,
            "steps": self.len(),
            "rmse": self.rmse(),
            "final_position_error": self.final_position_error(),
            "final_heading_error": self.final_heading_error(),
            "final_truth": pose(self.truth.last()),
            "final_estimate": pose(self.estimate.last()),
            "initial_trace": self.initial_trace,
            "final_trace": self.final_trace(),
            "applied": self.applied.iter().sum::<usize>(),
            "skipped": self.skipped.iter().sum::<usize>(),
            "mean_nis": self.mean_nis(),
            "ellipse": {
                "sigma": ELLIPSE_SIGMA,
                "semi_major": self.ellipse.semi_major,
                "semi_minor": self.ellipse.semi_minor,
                "orientation": self.ellipse.orientation,
            },
            "samples": self.final_samples.iter().map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>(),
        })
    }
}

/// Run the EKF against pre-generated sensor data.
pub fn run_filter(
    sim_result: &SimResult,
    sensor_data: &SensorData,
    scenario: &ScenarioConfig,
) -> Result<FilterResult, ScenarioError> {
    let n = sim_result.len();
    if sim_result.pose.len() != n {
        return Err(EkfError::DimensionMismatch {
            what: "truth trajectory",
            expected: format!("{n} poses"),
            found: format!("{} poses", sim_result.pose.len()),
        }
        .into());
    }
    if sensor_data.observations.len() != n || sensor_data.odometry.len() != n {
        return Err(EkfError::DimensionMismatch {
            what: "sensor data",
            expected: format!("{n} ticks"),
            found: format!(
                "{} observation ticks, {} odometry ticks",
                sensor_data.observations.len(),
                sensor_data.odometry.len()
            ),
        }
        .into());
    }

    let landmarks = scenario.world().landmarks;
    let mut ekf = LandmarkEkf::new(scenario.ekf_config()?)?;
    ekf.init_from_config(0.0)?;
    let initial_trace = ekf.covariance()?.trace();

    let mut res = FilterResult {
        name: scenario.name.clone(),
        time: Vec::with_capacity(n),
        truth: Vec::with_capacity(n),
        estimate: Vec::with_capacity(n),
        covariance_trace: Vec::with_capacity(n),
        applied: Vec::with_capacity(n),
        skipped: Vec::with_capacity(n),
        nis: Vec::new(),
        initial_trace,
        final_covariance: ekf.covariance()?,
        final_samples: Vec::new(),
        ellipse: ekf.uncertainty_ellipse(ELLIPSE_SIGMA)?,
    };

    for i in 0..n {
        // -------------------------------------------------------------------
        // PREDICT (odometry) + UPDATES (landmarks)
        // -------------------------------------------------------------------
        let report = ekf.localization_landmarks(
            &sensor_data.observations[i],
            &landmarks,
            &sensor_data.odometry[i],
        )?;
        res.nis.extend(
            report
                .outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok().map(|c| c.nis)),
        );

        // -------------------------------------------------------------------
        // RECORD STATE
        // -------------------------------------------------------------------
        let est = ekf.estimate()?;
        let truth = sim_result.pose[i];
        debug!(tick = i, x = truth.x, y = truth.y, phi = truth.z, "True");
        debug!(
            tick = i,
            x = est.state.x,
            y = est.state.y,
            phi = est.state.z,
            "Estimated"
        );

        res.time.push(est.time);
        res.truth.push(truth);
        res.estimate.push(est.state);
        res.covariance_trace.push(est.covariance.trace());
        res.applied.push(report.applied_count());
        res.skipped.push(report.skipped_count());
        res.final_covariance = est.covariance;
    }

    let mut rng = StdRng::seed_from_u64(scenario.sample_seed);
    res.final_samples = ekf.samples(scenario.samples, &mut rng)?;
    res.ellipse = ekf.uncertainty_ellipse(ELLIPSE_SIGMA)?;

    info!(
        scenario = %res.name,
        steps = n,
        rmse = res.rmse(),
        final_error = res.final_position_error().unwrap_or(0.0),
        final_trace = res.final_trace(),
        "filter run complete"
    );
    Ok(res)
}

/// Simulate truth, generate sensor data and run the filter for one scenario.
pub fn run_scenario(scenario: &ScenarioConfig) -> Result<FilterResult, ScenarioError> {
    let sim = simulate_agent(&scenario.agent_params());
    let data = generate_sensor_data(&sim, &scenario.world().landmarks, &scenario.sensor)?;
    run_filter(&sim, &data, scenario)
}
