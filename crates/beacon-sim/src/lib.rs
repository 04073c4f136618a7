//! Beacon Simulation Library
//!
//! Drives a planar agent through a landmark world, simulates noisy landmark
//! observations and odometry, and runs the localization filter against them.

pub mod filter;
pub mod params;
pub mod scenario;
pub mod sensor;
pub mod world;

// Re-export main types
pub use filter::{run_filter, run_scenario, FilterResult};
pub use params::{ParamSpec, SweepParam, SWEEP_PARAMS};
pub use scenario::{CovarianceForm, LandmarkSpec, ScenarioConfig, ScenarioError, PRESETS};
pub use sensor::{generate_sensor_data, SensorConfig, SensorData};
pub use world::{simulate_agent, AgentParams, ControlProfile, SimResult, World};
