use beacon_core::measurement::observe;
use beacon_core::{Control, Landmark, Observation};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioError;
use crate::world::SimResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub noise_scale: f64,
    pub offset_noise_std: f64,  // m, per axis
    pub bearing_noise_std: f64, // rad

    /// Landmarks farther than this are not seen.
    pub max_range: Option<f64>,

    // Odometry noise on the control handed to the filter. Truth always
    // moves with the commanded control.
    pub linear_odometry_std: f64,  // m/s
    pub angular_odometry_std: f64, // rad/s

    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            noise_scale: 1.0,
            offset_noise_std: 1.0,
            bearing_noise_std: 0.1_f64.sqrt(),
            max_range: None,
            linear_odometry_std: 0.0,
            angular_odometry_std: 0.0,
            seed: 42,
        }
    }
}

/// What the filter sees at each tick.
#[derive(Debug, Clone, Default)]
pub struct SensorData {
    pub time: Vec<f64>,
    pub observations: Vec<Vec<Observation>>,
    pub odometry: Vec<Control>,
}

impl SensorData {
    pub fn observation_count(&self) -> usize {
        self.observations.iter().map(Vec::len).sum()
    }
}

fn normal(std: f64, what: &str) -> Result<Normal<f64>, ScenarioError> {
    Normal::new(0.0, std)
        .map_err(|e| ScenarioError::InvalidSensor(format!("{what} noise std {std}: {e}")))
}

/// Observe every landmark in range from each true pose, with Gaussian noise.
/// A fixed seed yields the same data every time.
pub fn generate_sensor_data(
    sim: &SimResult,
    landmarks: &[Landmark],
    cfg: &SensorConfig,
) -> Result<SensorData, ScenarioError> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);

    let n = sim.len();
    let mut data = SensorData {
        time: sim.time.clone(),
        observations: Vec::with_capacity(n),
        odometry: Vec::with_capacity(n),
    };

    // Distributions
    let d_offset = normal(cfg.noise_scale * cfg.offset_noise_std, "offset")?;
    let d_bearing = normal(cfg.noise_scale * cfg.bearing_noise_std, "bearing")?;
    let d_linear = normal(cfg.noise_scale * cfg.linear_odometry_std, "linear odometry")?;
    let d_angular = normal(cfg.noise_scale * cfg.angular_odometry_std, "angular odometry")?;

    for i in 0..n {
        let pose = sim.pose[i];

        let mut seen = Vec::with_capacity(landmarks.len());
        for landmark in landmarks {
            let mut z = observe(&pose, landmark);
            if let Some(max_range) = cfg.max_range {
                if z.xy().norm() > max_range {
                    continue;
                }
            }
            z.x += d_offset.sample(&mut rng);
            z.y += d_offset.sample(&mut rng);
            z.z += d_bearing.sample(&mut rng);
            seen.push(Observation::new(landmark.id, z));
        }
        data.observations.push(seen);

        let commanded = sim.control[i];
        data.odometry.push(Control::new(
            commanded.linear + d_linear.sample(&mut rng),
            commanded.angular + d_angular.sample(&mut rng),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{simulate_agent, AgentParams};

    fn landmarks() -> Vec<Landmark> {
        vec![Landmark::new(0, 10.0, 0.0), Landmark::new(1, 20.0, 5.0)]
    }

    #[test]
    fn test_seeded_data_repeats() {
        let sim = simulate_agent(&AgentParams::default());
        let cfg = SensorConfig::default();
        let a = generate_sensor_data(&sim, &landmarks(), &cfg).unwrap();
        let b = generate_sensor_data(&sim, &landmarks(), &cfg).unwrap();
        assert_eq!(a.observations, b.observations);

        let other = SensorConfig {
            seed: 7,
            ..SensorConfig::default()
        };
        let c = generate_sensor_data(&sim, &landmarks(), &other).unwrap();
        assert_ne!(a.observations, c.observations);
    }

    #[test]
    fn test_zero_noise_matches_model() {
        let sim = simulate_agent(&AgentParams::default());
        let cfg = SensorConfig {
            noise_scale: 0.0,
            ..SensorConfig::default()
        };
        let data = generate_sensor_data(&sim, &landmarks(), &cfg).unwrap();
        assert_eq!(data.observation_count(), 200);
        let first = &data.observations[0];
        assert_eq!(first[0].z, observe(&sim.pose[0], &landmarks()[0]));
        assert_eq!(data.odometry, sim.control);
    }

    #[test]
    fn test_max_range_hides_far_landmarks() {
        let sim = simulate_agent(&AgentParams::default());
        let cfg = SensorConfig {
            max_range: Some(12.0),
            ..SensorConfig::default()
        };
        let data = generate_sensor_data(&sim, &landmarks(), &cfg).unwrap();
        // (20, 5) only comes within 12 m after x passes 9.
        assert!(data.observations[0].iter().all(|o| o.landmark_id == 0));
        assert!(data.observations[99].iter().any(|o| o.landmark_id == 1));
    }

    #[test]
    fn test_bad_noise_rejected() {
        let sim = simulate_agent(&AgentParams::default());
        let cfg = SensorConfig {
            bearing_noise_std: -1.0,
            ..SensorConfig::default()
        };
        assert!(matches!(
            generate_sensor_data(&sim, &landmarks(), &cfg),
            Err(ScenarioError::InvalidSensor(_))
        ));
    }
}
