//! Draws from the current Gaussian and the geometry of its position ellipse.
//! Nothing here renders; the harness decides what to do with the points.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{Matrix2, SymmetricEigen};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{EkfError, Result};
use crate::geometry::normalize_angle;
use crate::{Matrix3r, Pose, Scalar, Vector2r};

// ---------------------------------------------------------------------------
// SAMPLER
// ---------------------------------------------------------------------------

/// Samples `mean + L ξ` with `L Lᵀ = cov` and `ξ ~ N(0, I)`.
#[derive(Debug, Clone, Copy)]
pub struct GaussianSampler {
    mean: Pose,
    factor: Matrix3r,
}

impl GaussianSampler {
    /// Factor `cov` by Cholesky, falling back to a clamped eigendecomposition
    /// when it is only positive semi-definite.
    pub fn new(mean: Pose, cov: &Matrix3r) -> Result<Self> {
        if !mean.iter().chain(cov.iter()).all(|v| v.is_finite()) {
            return Err(EkfError::NumericalFailure(
                "cannot sample from a non-finite Gaussian".into(),
            ));
        }
        let sym = (cov + cov.transpose()) * 0.5;

        let factor = match sym.cholesky() {
            Some(chol) => chol.l(),
            None => {
                let eigen = SymmetricEigen::new(sym);
                let roots = eigen.eigenvalues.map(|v| v.max(0.0).sqrt());
                eigen.eigenvectors * Matrix3r::from_diagonal(&roots)
            }
        };
        Ok(Self { mean, factor })
    }

    pub fn mean(&self) -> &Pose {
        &self.mean
    }

    /// Lower factor `L` with `L Lᵀ` equal to the (symmetrized) covariance.
    pub fn factor(&self) -> &Matrix3r {
        &self.factor
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Pose {
        let xi = Pose::from_fn(|_, _| StandardNormal.sample(&mut *rng));
        let mut p = self.mean + self.factor * xi;
        p.z = normalize_angle(p.z);
        p
    }

    pub fn samples<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Pose> {
        (0..n).map(|_| self.sample(&mut *rng)).collect()
    }
}

// ---------------------------------------------------------------------------
// ELLIPSE
// ---------------------------------------------------------------------------

/// n-sigma ellipse of the position block of a covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceEllipse {
    pub center: Vector2r,
    pub semi_major: Scalar,
    pub semi_minor: Scalar,
    /// Angle of the major axis from the world x axis, in (-π/2, π/2].
    pub orientation: Scalar,
}

impl CovarianceEllipse {
    pub fn from_covariance(center: Vector2r, cov: &Matrix2<Scalar>, n_sigma: Scalar) -> Self {
        let sym = (cov + cov.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(sym);
        let (major, minor) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
            (0, 1)
        } else {
            (1, 0)
        };
        let axis = eigen.eigenvectors.column(major);

        // An axis and its negation describe the same ellipse.
        let mut orientation = axis[1].atan2(axis[0]);
        if orientation > FRAC_PI_2 {
            orientation -= PI;
        } else if orientation <= -FRAC_PI_2 {
            orientation += PI;
        }

        Self {
            center,
            semi_major: n_sigma * eigen.eigenvalues[major].max(0.0).sqrt(),
            semi_minor: n_sigma * eigen.eigenvalues[minor].max(0.0).sqrt(),
            orientation,
        }
    }

    /// Ellipse of the (x, y) block of a full pose covariance.
    pub fn from_pose(mean: &Pose, cov: &Matrix3r, n_sigma: Scalar) -> Self {
        let xy = cov.fixed_view::<2, 2>(0, 0).into_owned();
        Self::from_covariance(mean.xy(), &xy, n_sigma)
    }

    /// Closed polyline with `n + 1` points around the ellipse.
    pub fn points(&self, n: usize) -> Vec<Vector2r> {
        let n = n.max(3);
        let (s, c) = self.orientation.sin_cos();
        (0..=n)
            .map(|i| {
                let t = TAU * i as Scalar / n as Scalar;
                let ex = self.semi_major * t.cos();
                let ey = self.semi_minor * t.sin();
                Vector2r::new(ex * c - ey * s + self.center.x, ex * s + ey * c + self.center.y)
            })
            .collect()
    }

    pub fn area(&self) -> Scalar {
        PI * self.semi_major * self.semi_minor
    }
}
