//! # Beacon Core
//!
//! Planar pose estimation for a mobile agent from known landmarks.
//! This crate holds the estimator and nothing that touches I/O:
//! - Extended Kalman filter over (x, y, heading)
//! - Unicycle motion model and landmark measurement model
//! - Filter phase tracking
//! - Gaussian sampling and covariance ellipses for display

pub mod config;
pub mod ekf;
pub mod error;
pub mod geometry;
pub mod measurement;
pub mod motion;
pub mod phase;
pub mod sampling;

use nalgebra::{Matrix3, Vector2, Vector3};

pub type Scalar = f64;

/// Pose (x, y, heading) in the world frame.
pub type Pose = Vector3<Scalar>;
pub type Matrix3r = Matrix3<Scalar>;
pub type Vector2r = Vector2<Scalar>;
pub type Vector3r = Vector3<Scalar>;

/// Dimension of the filter state.
pub const STATE_DIM: usize = 3;

// Re-export core types
pub use config::{CovarianceUpdate, EkfConfig};
pub use ekf::{Correction, Estimate, LandmarkEkf, ObservationOutcome, UpdateReport};
pub use error::{EkfError, Result};
pub use geometry::normalize_angle;
pub use measurement::{Landmark, Observation, MEASUREMENT_DIM};
pub use motion::Control;
pub use phase::{FilterPhase, PhaseTracker};
pub use sampling::{CovarianceEllipse, GaussianSampler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
