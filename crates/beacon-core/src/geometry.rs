//! Angle and planar pose helpers shared by the models and the harness.

use std::f64::consts::{PI, TAU};

use nalgebra::Rotation2;

use crate::{Pose, Scalar, Vector2r};

/// Wrap an angle into (-π, π].
///
/// Angles already in range come back unchanged, so the function is exactly
/// idempotent. NaN and infinities yield NaN.
pub fn normalize_angle(angle: Scalar) -> Scalar {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Smallest signed rotation taking `b` to `a`.
pub fn angle_diff(a: Scalar, b: Scalar) -> Scalar {
    normalize_angle(a - b)
}

/// Express a world-frame point in the body frame of `pose`.
pub fn to_body_frame(pose: &Pose, point: &Vector2r) -> Vector2r {
    let rot = Rotation2::new(pose.z);
    rot.inverse() * (point - pose.xy())
}

/// Express a body-frame point of `pose` in the world frame.
pub fn to_world_frame(pose: &Pose, point: &Vector2r) -> Vector2r {
    let rot = Rotation2::new(pose.z);
    rot * *point + pose.xy()
}

/// Apply a body-frame increment (dx, dy, dθ) to `pose`.
pub fn compose(pose: &Pose, delta: &Pose) -> Pose {
    let xy = to_world_frame(pose, &delta.xy());
    Pose::new(xy.x, xy.y, normalize_angle(pose.z + delta.z))
}

/// Euclidean distance between the positions of two poses.
pub fn position_error(a: &Pose, b: &Pose) -> Scalar {
    (a.xy() - b.xy()).norm()
}

/// Heading error between two poses, wrapped.
pub fn heading_error(a: &Pose, b: &Pose) -> Scalar {
    angle_diff(a.z, b.z).abs()
}
