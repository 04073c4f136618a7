//! Unicycle motion model.
//!
//! x' = x + v cos(θ) dt, y' = y + v sin(θ) dt, θ' = wrap(θ + ω dt)

use nalgebra::Vector2;

use crate::error::{EkfError, Result};
use crate::geometry::normalize_angle;
use crate::{Matrix3r, Pose, Scalar};

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Commanded velocities for one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Control {
    /// Forward speed along the heading (m/s).
    pub linear: Scalar,
    /// Turn rate (rad/s), counter-clockwise positive.
    pub angular: Scalar,
}

impl Control {
    pub const fn new(linear: Scalar, angular: Scalar) -> Self {
        Self { linear, angular }
    }

    /// Build a control from an untyped `[v, ω]` slice.
    pub fn from_slice(values: &[Scalar]) -> Result<Self> {
        match values {
            [linear, angular] => Ok(Self::new(*linear, *angular)),
            _ => Err(EkfError::vector("control", 2, values.len())),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }

    pub fn as_vector(&self) -> Vector2<Scalar> {
        Vector2::new(self.linear, self.angular)
    }
}

impl From<Vector2<Scalar>> for Control {
    fn from(v: Vector2<Scalar>) -> Self {
        Self::new(v.x, v.y)
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Predicted pose and the state transition Jacobian it was linearized at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPrediction {
    pub pose: Pose,
    pub jacobian: Matrix3r,
}

/// Advance a pose by one step without validation.
///
/// Used directly to move the true agent in simulation, so truth and filter
/// share a single model.
pub fn propagate(pose: &Pose, control: &Control, dt: Scalar) -> Pose {
    let (s, c) = pose.z.sin_cos();
    Pose::new(
        pose.x + control.linear * c * dt,
        pose.y + control.linear * s * dt,
        normalize_angle(pose.z + control.angular * dt),
    )
}

/// ∂(x', y', θ')/∂(x, y, θ) evaluated at `pose`.
pub fn jacobian(pose: &Pose, control: &Control, dt: Scalar) -> Matrix3r {
    let (s, c) = pose.z.sin_cos();
    let mut a = Matrix3r::identity();
    a[(0, 2)] = -control.linear * s * dt;
    a[(1, 2)] = control.linear * c * dt;
    a
}

/// Predict the next pose and its Jacobian.
///
/// Fails with `InvalidArgument` for a non-positive or non-finite `dt`, or a
/// non-finite pose or control.
pub fn predict(pose: &Pose, control: &Control, dt: Scalar) -> Result<MotionPrediction> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(EkfError::InvalidArgument(format!(
            "time step must be positive and finite, got {dt}"
        )));
    }
    if !control.is_finite() {
        return Err(EkfError::InvalidArgument(format!(
            "control must be finite, got {control:?}"
        )));
    }
    if !pose.iter().all(|v| v.is_finite()) {
        return Err(EkfError::InvalidArgument(format!(
            "pose must be finite, got {:?}",
            pose.as_slice()
        )));
    }

    Ok(MotionPrediction {
        pose: propagate(pose, control, dt),
        jacobian: jacobian(pose, control, dt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_straight_line() {
        let out = predict(&Pose::new(1.0, 2.0, 0.0), &Control::new(2.0, 0.0), 0.5).unwrap();
        assert_relative_eq!(out.pose, Pose::new(2.0, 2.0, 0.0), epsilon = 1e-12);

        let up = predict(&Pose::new(0.0, 0.0, FRAC_PI_2), &Control::new(1.0, 0.0), 1.0).unwrap();
        assert_relative_eq!(up.pose, Pose::new(0.0, 1.0, FRAC_PI_2), epsilon = 1e-12);
    }

    #[test]
    fn test_heading_wraps() {
        let out = predict(&Pose::new(0.0, 0.0, PI - 0.05), &Control::new(0.0, 1.0), 0.1).unwrap();
        assert_relative_eq!(out.pose.z, -PI + 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let pose = Pose::new(0.3, -1.2, 0.8);
        let control = Control::new(1.7, -0.4);
        let dt = 0.2;
        let analytic = jacobian(&pose, &control, dt);

        let h = 1e-6;
        for col in 0..3 {
            let mut plus = pose;
            let mut minus = pose;
            plus[col] += h;
            minus[col] -= h;
            let fp = propagate(&plus, &control, dt);
            let fm = propagate(&minus, &control, dt);
            for row in 0..3 {
                let numeric = (fp[row] - fm[row]) / (2.0 * h);
                assert!(
                    (numeric - analytic[(row, col)]).abs() < 1e-6,
                    "A[{row},{col}]: analytic {} vs numeric {numeric}",
                    analytic[(row, col)]
                );
            }
        }
    }

    #[test]
    fn test_rejects_bad_dt() {
        let pose = Pose::zeros();
        let control = Control::new(1.0, 0.0);
        for dt in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(predict(&pose, &control, dt), Err(EkfError::InvalidArgument(_))),
                "dt = {dt} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_inputs() {
        let err = predict(&Pose::zeros(), &Control::new(f64::NAN, 0.0), 0.1).unwrap_err();
        assert!(matches!(err, EkfError::InvalidArgument(_)));
        let err = predict(&Pose::new(0.0, f64::INFINITY, 0.0), &Control::default(), 0.1).unwrap_err();
        assert!(matches!(err, EkfError::InvalidArgument(_)));
    }

    #[test]
    fn test_control_from_slice() {
        assert_eq!(
            Control::from_slice(&[1.0, 0.5]).unwrap(),
            Control::new(1.0, 0.5)
        );
        assert!(matches!(
            Control::from_slice(&[1.0, 0.5, 0.0]),
            Err(EkfError::DimensionMismatch { what: "control", .. })
        ));
        assert_eq!(
            Control::from(Vector2::new(3.0, -1.0)).as_vector(),
            Vector2::new(3.0, -1.0)
        );
    }
}
