use std::f64::consts::TAU;

use beacon_core::motion::{self, Control};
use beacon_core::{Landmark, Pose};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------
const MAX_STEPS: usize = 10_000;

// ---------------------------------------------------------------------------
// Control profiles
// ---------------------------------------------------------------------------

/// Commanded velocities as a function of time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlProfile {
    Constant {
        linear: f64,
        angular: f64,
    },
    /// Constant speed with a sinusoidal turn rate.
    Slalom {
        linear: f64,
        amplitude: f64, // rad/s
        period: f64,    // s
    },
}

impl Default for ControlProfile {
    fn default() -> Self {
        Self::Constant {
            linear: 1.0,
            angular: 0.0,
        }
    }
}

impl ControlProfile {
    pub fn control_at(&self, t: f64) -> Control {
        match *self {
            Self::Constant { linear, angular } => Control::new(linear, angular),
            Self::Slalom {
                linear,
                amplitude,
                period,
            } => {
                let angular = if period > 0.0 {
                    amplitude * (TAU * t / period).sin()
                } else {
                    0.0
                };
                Control::new(linear, angular)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AgentParams {
    pub initial_pose: Pose,
    pub dt: f64,
    pub steps: usize,
    pub profile: ControlProfile,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            initial_pose: Pose::zeros(),
            dt: 0.1,
            steps: 100,
            profile: ControlProfile::default(),
        }
    }
}

/// Known landmark map.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub landmarks: Vec<Landmark>,
}

impl World {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }
}

// ---------------------------------------------------------------------------
// Simulation Result
// ---------------------------------------------------------------------------

/// True trajectory. Entry `k` holds the control applied during step `k` and
/// the pose and time reached at its end.
#[derive(Debug, Clone, Default)]
pub struct SimResult {
    pub time: Vec<f64>,
    pub pose: Vec<Pose>,
    pub control: Vec<Control>,
}

impl SimResult {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_pose(&self) -> Option<&Pose> {
        self.pose.last()
    }
}

// ---------------------------------------------------------------------------
// Main Loop
// ---------------------------------------------------------------------------

/// Drive the true agent through `params.steps` steps of the unicycle model.
///
/// Step count is capped at 10000 ticks.
pub fn simulate_agent(params: &AgentParams) -> SimResult {
    let steps = params.steps.min(MAX_STEPS);
    let mut res = SimResult {
        time: Vec::with_capacity(steps),
        pose: Vec::with_capacity(steps),
        control: Vec::with_capacity(steps),
    };

    let mut pose = params.initial_pose;
    for k in 0..steps {
        let t = k as f64 * params.dt;
        let control = params.profile.control_at(t);
        pose = motion::propagate(&pose, &control, params.dt);

        res.time.push(t + params.dt);
        res.pose.push(pose);
        res.control.push(control);
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_profile_drives_straight() {
        let res = simulate_agent(&AgentParams::default());
        assert_eq!(res.len(), 100);
        assert_relative_eq!(res.time[99], 10.0, epsilon = 1e-9);
        let end = res.final_pose().unwrap();
        assert_relative_eq!(end.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(end.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_slalom_turns_both_ways() {
        let profile = ControlProfile::Slalom {
            linear: 2.0,
            amplitude: 0.5,
            period: 4.0,
        };
        assert_relative_eq!(profile.control_at(1.0).angular, 0.5, epsilon = 1e-12);
        assert_relative_eq!(profile.control_at(3.0).angular, -0.5, epsilon = 1e-12);

        let res = simulate_agent(&AgentParams {
            profile,
            steps: 40,
            ..AgentParams::default()
        });
        let max_heading = res.pose.iter().map(|p| p.z).fold(f64::MIN, f64::max);
        assert!(max_heading > 0.1, "slalom never turned left");
        assert!(res.pose.iter().all(|p| p.z.abs() < 1.0));
    }

    #[test]
    fn test_step_cap() {
        let res = simulate_agent(&AgentParams {
            steps: 50_000,
            dt: 0.01,
            ..AgentParams::default()
        });
        assert_eq!(res.len(), MAX_STEPS);
    }

    #[test]
    fn test_profile_json_shape() {
        let json = serde_json::to_value(ControlProfile::default()).unwrap();
        assert_eq!(json["kind"], "constant");
        let parsed: ControlProfile =
            serde_json::from_str(r#"{"kind":"slalom","linear":1.0,"amplitude":0.2,"period":5.0}"#)
                .unwrap();
        assert!(matches!(parsed, ControlProfile::Slalom { .. }));
    }
}
