use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::config::{check_covariance, pose3, square3, CovarianceUpdate, EkfConfig};
use crate::error::{EkfError, Result};
use crate::geometry::normalize_angle;
use crate::measurement::{self, Landmark, MeasurementVector, Observation};
use crate::motion::{self, Control, MotionPrediction};
use crate::phase::{FilterPhase, PhaseTracker};
use crate::sampling::{CovarianceEllipse, GaussianSampler};
use crate::{Matrix3r, Pose, Scalar};

// ---------------------------------------------------------------------------
// OUTPUTS
// ---------------------------------------------------------------------------

/// Snapshot of the filter belief at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub state: Pose,
    pub covariance: Matrix3r,
    pub time: Scalar,
}

/// A measurement that was folded into the estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub innovation: MeasurementVector,
    /// Normalized innovation squared, `yᵀ S⁻¹ y`.
    pub nis: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationOutcome {
    pub landmark_id: u32,
    pub result: std::result::Result<Correction, EkfError>,
}

impl ObservationOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-observation results of one `update`, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub outcomes: Vec<ObservationOutcome>,
}

impl UpdateReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (u32, &EkfError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.landmark_id, e)))
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MAIN FILTER
// ---------------------------------------------------------------------------

/// Extended Kalman filter over a planar pose, corrected by observations of
/// known landmarks.
#[derive(Debug, Clone)]
pub struct LandmarkEkf {
    config: EkfConfig,
    state: Pose,
    covariance: Matrix3r,
    time: Scalar,
    phase: PhaseTracker,

    // Jacobians of the last predict (A) and the last applied correction (C).
    system_jacobian: Matrix3r,
    output_jacobian: Matrix3r,
}

impl LandmarkEkf {
    pub fn new(config: EkfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Pose::zeros(),
            covariance: Matrix3r::zeros(),
            time: 0.0,
            phase: PhaseTracker::new(),
            system_jacobian: Matrix3r::identity(),
            output_jacobian: Matrix3r::zeros(),
        })
    }

    /// Construct from dynamically sized `A`, `C`, `Q`, `R` and `P0`.
    ///
    /// `A` and `C` only seed the Jacobian slots; both are recomputed at every
    /// step. Any matrix that is not 3x3 fails with `DimensionMismatch`.
    pub fn from_dynamic(
        dt: Scalar,
        a: &DMatrix<Scalar>,
        c: &DMatrix<Scalar>,
        q: &DMatrix<Scalar>,
        r: &DMatrix<Scalar>,
        p0: &DMatrix<Scalar>,
    ) -> Result<Self> {
        let a = square3("A", a)?;
        let c = square3("C", c)?;
        let mut filter = Self::new(EkfConfig::from_dynamic(dt, q, r, p0)?)?;
        filter.system_jacobian = a;
        filter.output_jacobian = c;
        Ok(filter)
    }

    // =====================================================================
    // INIT
    // =====================================================================

    /// Set the belief to `N(x0, p0)` at time `t0`. Calling it again restarts
    /// the filter.
    pub fn init(&mut self, t0: Scalar, x0: Pose, p0: Matrix3r) -> Result<()> {
        if !t0.is_finite() {
            return Err(EkfError::InvalidArgument(format!(
                "start time must be finite, got {t0}"
            )));
        }
        if !x0.iter().all(|v| v.is_finite()) {
            return Err(EkfError::InvalidArgument(format!(
                "initial state must be finite, got {:?}",
                x0.as_slice()
            )));
        }
        check_covariance("P0", &p0)?;

        self.state = Pose::new(x0.x, x0.y, normalize_angle(x0.z));
        self.covariance = symmetrize(&p0);
        self.time = t0;
        self.phase.init(t0);
        debug!(t0, x = x0.x, y = x0.y, heading = self.state.z, "filter initialized");
        Ok(())
    }

    /// `init` with the configured initial state and covariance.
    pub fn init_from_config(&mut self, t0: Scalar) -> Result<()> {
        self.init(t0, self.config.initial_state, self.config.initial_covariance)
    }

    /// `init` from dynamically sized inputs.
    pub fn init_dynamic(
        &mut self,
        t0: Scalar,
        x0: &DVector<Scalar>,
        p0: &DMatrix<Scalar>,
    ) -> Result<()> {
        let x0 = pose3("x0", x0)?;
        let p0 = square3("P0", p0)?;
        self.init(t0, x0, p0)
    }

    // =====================================================================
    // PREDICT
    // =====================================================================

    /// Time update: `x = f(x, u)`, `P = A P Aᵀ + Q`.
    ///
    /// A zero `dt` leaves the belief untouched. Nothing is committed if the
    /// propagated belief is not finite.
    pub fn predict(&mut self, control: &Control, dt: Scalar) -> Result<()> {
        self.phase.require_initialized()?;
        if dt.is_nan() || dt < 0.0 {
            return Err(EkfError::InvalidArgument(format!(
                "time step must not be negative, got {dt}"
            )));
        }
        if !control.is_finite() {
            return Err(EkfError::InvalidArgument(format!(
                "control must be finite, got {control:?}"
            )));
        }

        if dt == 0.0 {
            trace!("zero time step, belief unchanged");
            return self.phase.predicted(self.time);
        }

        let MotionPrediction { pose, jacobian } = motion::predict(&self.state, control, dt)?;
        let p = symmetrize(&(jacobian * self.covariance * jacobian.transpose()
            + self.config.process_noise));

        if !is_finite(&pose) || !is_finite(&p) {
            return Err(EkfError::NumericalFailure(
                "prediction produced a non-finite belief".into(),
            ));
        }

        self.state = pose;
        self.covariance = p;
        self.system_jacobian = jacobian;
        self.time += dt;
        self.phase.predicted(self.time)?;

        trace!(
            t = self.time,
            x = pose.x,
            y = pose.y,
            heading = pose.z,
            trace = p.trace(),
            "predicted"
        );
        Ok(())
    }

    // =====================================================================
    // UPDATES
    // =====================================================================

    /// Measurement update with a batch of id-tagged observations.
    ///
    /// Observations are applied one at a time in ascending landmark id. An
    /// observation that cannot be applied is skipped without touching the
    /// belief; the reason is recorded in the returned report.
    pub fn update(
        &mut self,
        observations: &[Observation],
        landmarks: &[Landmark],
    ) -> Result<UpdateReport> {
        self.phase.require_initialized()?;

        let mut by_id: HashMap<u32, &Landmark> = HashMap::with_capacity(landmarks.len());
        for landmark in landmarks {
            if by_id.insert(landmark.id, landmark).is_some() {
                return Err(EkfError::InvalidArgument(format!(
                    "duplicate landmark id {}",
                    landmark.id
                )));
            }
        }

        let mut ordered: Vec<&Observation> = observations.iter().collect();
        ordered.sort_by_key(|o| o.landmark_id);

        let mut report = UpdateReport {
            outcomes: Vec::with_capacity(ordered.len()),
        };
        for obs in ordered {
            let result = self.apply_correction(obs, by_id.get(&obs.landmark_id).copied());
            if let Err(err) = &result {
                warn!(landmark = obs.landmark_id, t = self.time, %err, "observation skipped");
            }
            report.outcomes.push(ObservationOutcome {
                landmark_id: obs.landmark_id,
                result,
            });
        }

        self.phase.updated(self.time)?;
        debug!(
            t = self.time,
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            trace = self.covariance.trace(),
            "updated"
        );
        Ok(report)
    }

    /// One predict with the configured `dt` followed by an update.
    pub fn localization_landmarks(
        &mut self,
        observations: &[Observation],
        landmarks: &[Landmark],
        control: &Control,
    ) -> Result<UpdateReport> {
        self.predict(control, self.config.dt)?;
        self.update(observations, landmarks)
    }

    fn apply_correction(
        &mut self,
        obs: &Observation,
        landmark: Option<&Landmark>,
    ) -> Result<Correction> {
        let landmark = landmark.ok_or(EkfError::UnknownLandmark(obs.landmark_id))?;
        if !obs.is_finite() {
            return Err(EkfError::InvalidArgument(format!(
                "observation of landmark {} is not finite",
                obs.landmark_id
            )));
        }

        let (z_hat, c) =
            measurement::expected_observation(&self.state, landmark, self.config.min_range)?;
        let y = measurement::innovation(&obs.z, &z_hat);

        let r = &self.config.measurement_noise;
        let p_ct = self.covariance * c.transpose();
        let s = c * p_ct + r;
        if !is_finite(&s) {
            return Err(EkfError::NumericalFailure(format!(
                "innovation covariance for landmark {} is not finite",
                landmark.id
            )));
        }
        let s = symmetrize(&s);

        let determinant = s.determinant();
        let condition = condition_number(&s);
        let singular = EkfError::SingularInnovation {
            landmark_id: landmark.id,
            determinant,
            condition,
        };
        if determinant.abs() < self.config.min_determinant
            || condition.is_nan()
            || condition > self.config.max_condition
        {
            return Err(singular);
        }
        let s_inv = s.try_inverse().ok_or(singular)?;

        let nis = y.dot(&(s_inv * y));
        if let Some(gate) = self.config.innovation_gate {
            if nis > gate {
                return Err(EkfError::RejectedInnovation {
                    landmark_id: landmark.id,
                    nis,
                });
            }
        }

        let k_gain = p_ct * s_inv;
        let mut x = self.state + k_gain * y;
        x.z = normalize_angle(x.z);

        let i_minus_kc = Matrix3r::identity() - k_gain * c;
        let p = match self.config.covariance_update {
            CovarianceUpdate::Simple => i_minus_kc * self.covariance,
            CovarianceUpdate::Joseph => {
                i_minus_kc * self.covariance * i_minus_kc.transpose()
                    + k_gain * r * k_gain.transpose()
            }
        };
        let p = symmetrize(&p);

        if !is_finite(&x) || !is_finite(&p) {
            return Err(EkfError::NumericalFailure(format!(
                "correction with landmark {} produced a non-finite belief",
                landmark.id
            )));
        }

        self.state = x;
        self.covariance = p;
        self.output_jacobian = c;
        Ok(Correction { innovation: y, nis })
    }

    // =====================================================================
    // QUERIES
    // =====================================================================

    pub fn state(&self) -> Result<Pose> {
        self.phase.require_initialized()?;
        Ok(self.state)
    }

    pub fn covariance(&self) -> Result<Matrix3r> {
        self.phase.require_initialized()?;
        Ok(self.covariance)
    }

    pub fn time(&self) -> Result<Scalar> {
        self.phase.require_initialized()?;
        Ok(self.time)
    }

    pub fn estimate(&self) -> Result<Estimate> {
        self.phase.require_initialized()?;
        Ok(Estimate {
            state: self.state,
            covariance: self.covariance,
            time: self.time,
        })
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase.current()
    }

    pub fn phase_tracker(&self) -> &PhaseTracker {
        &self.phase
    }

    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    /// `(A, C)` from the last prediction and the last applied correction.
    pub fn jacobians(&self) -> (Matrix3r, Matrix3r) {
        (self.system_jacobian, self.output_jacobian)
    }

    pub fn sampler(&self) -> Result<GaussianSampler> {
        self.phase.require_initialized()?;
        GaussianSampler::new(self.state, &self.covariance)
    }

    /// `n` draws from the current belief.
    pub fn samples<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<Pose>> {
        Ok(self.sampler()?.samples(n, rng))
    }

    pub fn uncertainty_ellipse(&self, n_sigma: Scalar) -> Result<CovarianceEllipse> {
        self.phase.require_initialized()?;
        Ok(CovarianceEllipse::from_pose(
            &self.state,
            &self.covariance,
            n_sigma,
        ))
    }
}

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

fn symmetrize(p: &Matrix3r) -> Matrix3r {
    (p + p.transpose()) * 0.5
}

fn is_finite<'a>(m: impl IntoIterator<Item = &'a Scalar>) -> bool {
    m.into_iter().all(|v| v.is_finite())
}

/// Ratio of the largest to the smallest singular value.
fn condition_number(m: &Matrix3r) -> Scalar {
    let sv = m.singular_values();
    let max = sv.max();
    let min = sv.min();
    if min > 0.0 {
        max / min
    } else {
        Scalar::INFINITY
    }
}
