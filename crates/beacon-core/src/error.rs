use thiserror::Error;

use crate::Scalar;

/// Errors raised by the filter, its models and its configuration.
///
/// `NotInitialized`, `DimensionMismatch` and `InvalidArgument` are boundary
/// errors and are returned to the caller immediately. The remaining variants
/// are per-observation outcomes: an update skips the offending observation,
/// records the error in its report and carries on with the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EkfError {
    #[error("filter used before init")]
    NotInitialized,

    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "innovation covariance for landmark {landmark_id} is singular \
         (det = {determinant:e}, cond = {condition:e})"
    )]
    SingularInnovation {
        landmark_id: u32,
        determinant: Scalar,
        condition: Scalar,
    },

    #[error("landmark {landmark_id} innovation rejected by gate (nis = {nis:.2})")]
    RejectedInnovation { landmark_id: u32, nis: Scalar },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error("unknown landmark id {0}")]
    UnknownLandmark(u32),

    #[error("landmark {landmark_id} too close for a bearing (range {range:.3e})")]
    DegenerateGeometry { landmark_id: u32, range: Scalar },
}

impl EkfError {
    pub(crate) fn dims(what: &'static str, expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            what,
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }

    pub(crate) fn vector(what: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// True for the errors that abort an operation rather than skip one
    /// observation.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::DimensionMismatch { .. } | Self::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EkfError>;
