use nalgebra::{DMatrix, DVector};

use crate::error::{EkfError, Result};
use crate::{Matrix3r, Pose, Scalar, STATE_DIM};

// ---------------------------------------------------------------------------
// Covariance update form
// ---------------------------------------------------------------------------

/// How the covariance is corrected after a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovarianceUpdate {
    /// `P = (I - KC) P`
    #[default]
    Simple,
    /// `P = (I - KC) P (I - KC)^T + K R K^T`
    Joseph,
}

impl CovarianceUpdate {
    pub fn label(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Joseph => "joseph",
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Immutable filter configuration, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EkfConfig {
    /// Step used by `localization_landmarks` (s).
    pub dt: Scalar,
    pub initial_state: Pose,
    pub initial_covariance: Matrix3r,
    /// Q, added to the covariance on every prediction.
    pub process_noise: Matrix3r,
    /// R, covariance of one landmark observation.
    pub measurement_noise: Matrix3r,
    /// Landmarks closer than this are skipped (bearing undefined).
    pub min_range: Scalar,
    /// Innovation covariances with a larger condition number are singular.
    pub max_condition: Scalar,
    /// Innovation covariances with a smaller |det| are singular.
    pub min_determinant: Scalar,
    /// Observations whose normalized innovation squared exceeds this are
    /// rejected. `None` accepts every observation.
    pub innovation_gate: Option<Scalar>,
    pub covariance_update: CovarianceUpdate,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            initial_state: Pose::zeros(),
            initial_covariance: Matrix3r::from_diagonal_element(5.0),
            process_noise: Matrix3r::from_diagonal(&Pose::new(0.01, 0.01, 0.001)),
            measurement_noise: Matrix3r::from_diagonal(&Pose::new(1.0, 1.0, 0.1)),
            min_range: 0.5,
            max_condition: 1e12,
            min_determinant: 1e-12,
            innovation_gate: None,
            covariance_update: CovarianceUpdate::Simple,
        }
    }
}

impl EkfConfig {
    /// Build a configuration from dynamically sized matrices, checking that
    /// every one of them is 3x3.
    pub fn from_dynamic(
        dt: Scalar,
        process_noise: &DMatrix<Scalar>,
        measurement_noise: &DMatrix<Scalar>,
        initial_covariance: &DMatrix<Scalar>,
    ) -> Result<Self> {
        let config = Self {
            dt,
            process_noise: square3("Q", process_noise)?,
            measurement_noise: square3("R", measurement_noise)?,
            initial_covariance: square3("P0", initial_covariance)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_initial_state(mut self, x0: Pose) -> Self {
        self.initial_state = x0;
        self
    }

    pub fn with_innovation_gate(mut self, gate: Option<Scalar>) -> Self {
        self.innovation_gate = gate;
        self
    }

    pub fn with_covariance_update(mut self, form: CovarianceUpdate) -> Self {
        self.covariance_update = form;
        self
    }

    /// Check values; shapes are guaranteed by the fixed-size types.
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(EkfError::InvalidArgument(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if !self.initial_state.iter().all(|v| v.is_finite()) {
            return Err(EkfError::InvalidArgument(
                "initial state must be finite".into(),
            ));
        }
        check_covariance("P0", &self.initial_covariance)?;
        check_covariance("Q", &self.process_noise)?;
        check_covariance("R", &self.measurement_noise)?;

        if !(self.min_range.is_finite() && self.min_range >= 0.0) {
            return Err(EkfError::InvalidArgument(format!(
                "min_range must be finite and non-negative, got {}",
                self.min_range
            )));
        }
        if self.max_condition.is_nan() || self.max_condition <= 1.0 {
            return Err(EkfError::InvalidArgument(format!(
                "max_condition must exceed 1, got {}",
                self.max_condition
            )));
        }
        if !(self.min_determinant.is_finite() && self.min_determinant >= 0.0) {
            return Err(EkfError::InvalidArgument(format!(
                "min_determinant must be finite and non-negative, got {}",
                self.min_determinant
            )));
        }
        if let Some(gate) = self.innovation_gate {
            if gate.is_nan() || gate <= 0.0 {
                return Err(EkfError::InvalidArgument(format!(
                    "innovation gate must be positive, got {gate}"
                )));
            }
        }
        Ok(())
    }
}

/// 99.9% quantile of the chi-square distribution with 3 degrees of freedom.
pub const CHI2_3DOF_999: Scalar = 16.266;

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

const SYMMETRY_TOLERANCE: Scalar = 1e-9;

/// Copy a dynamic matrix into a 3x3 one, rejecting any other shape.
pub(crate) fn square3(what: &'static str, m: &DMatrix<Scalar>) -> Result<Matrix3r> {
    if m.shape() != (STATE_DIM, STATE_DIM) {
        return Err(EkfError::dims(what, (STATE_DIM, STATE_DIM), m.shape()));
    }
    Ok(m.fixed_view::<3, 3>(0, 0).into_owned())
}

/// Copy a dynamic vector into a pose, rejecting any other length.
pub(crate) fn pose3(what: &'static str, v: &DVector<Scalar>) -> Result<Pose> {
    if v.len() != STATE_DIM {
        return Err(EkfError::vector(what, STATE_DIM, v.len()));
    }
    Ok(Pose::new(v[0], v[1], v[2]))
}

/// Finite, symmetric and positive semi-definite.
pub(crate) fn check_covariance(what: &'static str, m: &Matrix3r) -> Result<()> {
    if !m.iter().all(|v| v.is_finite()) {
        return Err(EkfError::InvalidArgument(format!("{what} must be finite")));
    }
    let scale = m.amax().max(1.0);
    if (m - m.transpose()).amax() > SYMMETRY_TOLERANCE * scale {
        return Err(EkfError::InvalidArgument(format!("{what} must be symmetric")));
    }
    if m.diagonal().iter().any(|&d| d < 0.0) {
        return Err(EkfError::InvalidArgument(format!(
            "{what} must have a non-negative diagonal"
        )));
    }
    let min_eigenvalue = m.symmetric_eigenvalues().min();
    if min_eigenvalue < -SYMMETRY_TOLERANCE * scale {
        return Err(EkfError::InvalidArgument(format!(
            "{what} must be positive semi-definite, smallest eigenvalue is {min_eigenvalue}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EkfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.covariance_update, CovarianceUpdate::Simple);
        assert_eq!(config.measurement_noise[(2, 2)], 0.1);
    }

    #[test]
    fn test_from_dynamic_rejects_wrong_shapes() {
        let i3 = DMatrix::<f64>::identity(3, 3);
        let i2 = DMatrix::<f64>::identity(2, 2);
        let err = EkfConfig::from_dynamic(0.1, &i3, &i2, &i3).unwrap_err();
        assert_eq!(err, EkfError::dims("R", (3, 3), (2, 2)));

        let wide = DMatrix::<f64>::zeros(3, 4);
        assert!(matches!(
            EkfConfig::from_dynamic(0.1, &wide, &i3, &i3),
            Err(EkfError::DimensionMismatch { what: "Q", .. })
        ));
        assert!(EkfConfig::from_dynamic(0.1, &i3, &i3, &i3).is_ok());
    }

    #[test]
    fn test_validate_values() {
        let bad_dt = EkfConfig {
            dt: 0.0,
            ..EkfConfig::default()
        };
        assert!(matches!(bad_dt.validate(), Err(EkfError::InvalidArgument(_))));

        let mut asym = EkfConfig::default();
        asym.process_noise[(0, 1)] = 0.5;
        assert!(matches!(asym.validate(), Err(EkfError::InvalidArgument(_))));

        let mut negative = EkfConfig::default();
        negative.measurement_noise[(1, 1)] = -1.0;
        assert!(matches!(negative.validate(), Err(EkfError::InvalidArgument(_))));

        let mut indefinite_q = EkfConfig::default();
        indefinite_q.process_noise = Matrix3r::new(1.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        match indefinite_q.validate() {
            Err(EkfError::InvalidArgument(msg)) => assert!(msg.contains("semi-definite"), "{msg}"),
            other => panic!("indefinite Q accepted: {other:?}"),
        }

        // Dense rank-1 noise is semi-definite and stays valid.
        let mut dense = EkfConfig::default();
        dense.process_noise = Matrix3r::repeat(0.1);
        assert!(dense.validate().is_ok());

        let gated = EkfConfig::default().with_innovation_gate(Some(-1.0));
        assert!(matches!(gated.validate(), Err(EkfError::InvalidArgument(_))));

        let mut nan = EkfConfig::default();
        nan.initial_covariance[(2, 2)] = f64::NAN;
        assert!(matches!(nan.validate(), Err(EkfError::InvalidArgument(_))));

        // A zero R and a rank-deficient P0 are allowed.
        let degenerate = EkfConfig {
            measurement_noise: Matrix3r::zeros(),
            initial_covariance: Matrix3r::from_diagonal(&Pose::new(1.0, 1.0, 0.0)),
            ..EkfConfig::default()
        };
        assert!(degenerate.validate().is_ok());
    }

    #[test]
    fn test_pose3() {
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(pose3("x0", &v).unwrap(), Pose::new(1.0, 2.0, 3.0));
        let short = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(
            pose3("x0", &short).unwrap_err(),
            EkfError::vector("x0", 3, 2)
        );
    }
}
