//! Landmark measurement model.
//!
//! An observation of landmark `l` from pose (x, y, θ) is
//! `z = (lx - x, ly - y, wrap(atan2(ly - y, lx - x) - θ))`: the world-frame
//! offset to the landmark plus its bearing relative to the heading.

use nalgebra::Vector3;

use crate::error::{EkfError, Result};
use crate::geometry::normalize_angle;
use crate::{Matrix3r, Pose, Scalar, Vector2r};

/// Length of one observation vector.
pub const MEASUREMENT_DIM: usize = 3;

/// Index of the bearing component inside an observation.
pub const BEARING: usize = 2;

pub type MeasurementVector = Vector3<Scalar>;

/// A fixed, known landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: u32,
    pub position: Vector2r,
}

impl Landmark {
    pub fn new(id: u32, x: Scalar, y: Scalar) -> Self {
        Self {
            id,
            position: Vector2r::new(x, y),
        }
    }
}

/// A measurement of one landmark, tagged with the landmark's id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub landmark_id: u32,
    pub z: MeasurementVector,
}

impl Observation {
    pub fn new(landmark_id: u32, z: MeasurementVector) -> Self {
        Self { landmark_id, z }
    }

    /// Build an observation from an untyped `[dx, dy, bearing]` slice.
    pub fn from_slice(landmark_id: u32, values: &[Scalar]) -> Result<Self> {
        if values.len() != MEASUREMENT_DIM {
            return Err(EkfError::vector("observation", MEASUREMENT_DIM, values.len()));
        }
        Ok(Self::new(landmark_id, MeasurementVector::from_column_slice(values)))
    }

    pub fn is_finite(&self) -> bool {
        self.z.iter().all(|v| v.is_finite())
    }
}

/// Noise-free observation of `landmark` from `pose`.
pub fn observe(pose: &Pose, landmark: &Landmark) -> MeasurementVector {
    let ex = landmark.position.x - pose.x;
    let ey = landmark.position.y - pose.y;
    MeasurementVector::new(ex, ey, normalize_angle(ey.atan2(ex) - pose.z))
}

/// Expected observation and its Jacobian ∂z/∂(x, y, θ).
///
/// The bearing row is undefined at the landmark itself, so ranges below
/// `min_range` fail with `DegenerateGeometry`.
pub fn expected_observation(
    pose: &Pose,
    landmark: &Landmark,
    min_range: Scalar,
) -> Result<(MeasurementVector, Matrix3r)> {
    let ex = landmark.position.x - pose.x;
    let ey = landmark.position.y - pose.y;
    let q = ex * ex + ey * ey;
    let range = q.sqrt();
    if range.is_nan() || range < min_range || q <= 0.0 {
        return Err(EkfError::DegenerateGeometry {
            landmark_id: landmark.id,
            range,
        });
    }

    let z_hat = MeasurementVector::new(ex, ey, normalize_angle(ey.atan2(ex) - pose.z));
    #[rustfmt::skip]
    let c = Matrix3r::new(
        -1.0,     0.0,      0.0,
         0.0,    -1.0,      0.0,
         ey / q, -ex / q,  -1.0,
    );
    Ok((z_hat, c))
}

/// `z - z_hat` with the bearing difference wrapped.
pub fn innovation(z: &MeasurementVector, z_hat: &MeasurementVector) -> MeasurementVector {
    let mut y = z - z_hat;
    y[BEARING] = normalize_angle(z[BEARING] - z_hat[BEARING]);
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_observe_relative_offset_and_bearing() {
        let lm = Landmark::new(0, 10.0, 0.0);
        let z = observe(&Pose::new(0.0, 0.0, 0.0), &lm);
        assert_relative_eq!(z, MeasurementVector::new(10.0, 0.0, 0.0), epsilon = 1e-12);

        // Facing +y, a landmark on +x sits a quarter turn to the right.
        let z = observe(&Pose::new(0.0, 0.0, FRAC_PI_2), &lm);
        assert_relative_eq!(z[BEARING], -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let lm = Landmark::new(3, 4.0, -2.5);
        let pose = Pose::new(0.5, 1.0, 2.9);
        let (_, c) = expected_observation(&pose, &lm, 0.5).unwrap();

        let h = 1e-6;
        for col in 0..3 {
            let mut plus = pose;
            let mut minus = pose;
            plus[col] += h;
            minus[col] -= h;
            let diff = innovation(&observe(&plus, &lm), &observe(&minus, &lm));
            for row in 0..3 {
                let numeric = diff[row] / (2.0 * h);
                assert!(
                    (numeric - c[(row, col)]).abs() < 1e-6,
                    "C[{row},{col}]: analytic {} vs numeric {numeric}",
                    c[(row, col)]
                );
            }
        }
    }

    #[test]
    fn test_degenerate_geometry() {
        let lm = Landmark::new(9, 1.0, 1.0);
        let err = expected_observation(&Pose::new(1.0, 1.1, 0.0), &lm, 0.5).unwrap_err();
        match err {
            EkfError::DegenerateGeometry { landmark_id, range } => {
                assert_eq!(landmark_id, 9);
                assert_relative_eq!(range, 0.1, epsilon = 1e-9);
            }
            other => panic!("expected DegenerateGeometry, got {other:?}"),
        }
        assert!(expected_observation(&Pose::new(1.0, 1.0, 0.0), &lm, 0.0).is_err());
    }

    #[test]
    fn test_innovation_wraps_bearing() {
        let z = MeasurementVector::new(1.0, 2.0, PI - 0.1);
        let z_hat = MeasurementVector::new(0.5, 2.5, -PI + 0.1);
        let y = innovation(&z, &z_hat);
        assert_relative_eq!(y, MeasurementVector::new(0.5, -0.5, -0.2), epsilon = 1e-12);
    }

    #[test]
    fn test_observation_from_slice() {
        let obs = Observation::from_slice(2, &[1.0, 2.0, 0.1]).unwrap();
        assert_eq!(obs.landmark_id, 2);
        assert!(obs.is_finite());
        assert!(matches!(
            Observation::from_slice(2, &[1.0, 2.0]),
            Err(EkfError::DimensionMismatch { what: "observation", .. })
        ));
        assert!(!Observation::from_slice(2, &[1.0, f64::NAN, 0.0])
            .unwrap()
            .is_finite());
    }
}
