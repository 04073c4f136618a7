use crate::error::{EkfError, Result};
use crate::Scalar;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterPhase {
    Uninitialized = 0,
    Initialized = 1,
    Predicted = 2, // last step was a time update
    Updated = 3,   // last step was a measurement update
}

impl FilterPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initialized => "Initialized",
            Self::Predicted => "Predicted",
            Self::Updated => "Updated",
        }
    }

    pub fn is_initialized(self) -> bool {
        self != Self::Uninitialized
    }
}

pub const NUM_PHASES: usize = 4;

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Uninitialized -> Initialized -> (Predicted <-> Updated)*
///
/// `init` is accepted from any phase and restarts the cycle.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: FilterPhase,

    /// Filter time when each phase was last entered, NaN if never.
    entered_at: [Scalar; NUM_PHASES],

    predict_count: u64,
    update_count: u64,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: FilterPhase::Uninitialized,
            entered_at: [Scalar::NAN; NUM_PHASES],
            predict_count: 0,
            update_count: 0,
        }
    }

    pub fn init(&mut self, time: Scalar) {
        self.entered_at = [Scalar::NAN; NUM_PHASES];
        self.predict_count = 0;
        self.update_count = 0;
        self.transition_to(FilterPhase::Initialized, time);
    }

    /// Fails with `NotInitialized` unless `init` has run.
    pub fn require_initialized(&self) -> Result<()> {
        if self.phase.is_initialized() {
            Ok(())
        } else {
            Err(EkfError::NotInitialized)
        }
    }

    pub fn predicted(&mut self, time: Scalar) -> Result<()> {
        self.require_initialized()?;
        self.predict_count += 1;
        self.transition_to(FilterPhase::Predicted, time);
        Ok(())
    }

    pub fn updated(&mut self, time: Scalar) -> Result<()> {
        self.require_initialized()?;
        self.update_count += 1;
        self.transition_to(FilterPhase::Updated, time);
        Ok(())
    }

    fn transition_to(&mut self, next: FilterPhase, time: Scalar) {
        self.phase = next;
        self.entered_at[next as usize] = time;
    }

    pub fn current(&self) -> FilterPhase {
        self.phase
    }

    pub fn entered_at(&self, phase: FilterPhase) -> Scalar {
        self.entered_at[phase as usize]
    }

    pub fn predict_count(&self) -> u64 {
        self.predict_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_require_init() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.current(), FilterPhase::Uninitialized);
        assert_eq!(tracker.predicted(0.1), Err(EkfError::NotInitialized));
        assert_eq!(tracker.updated(0.1), Err(EkfError::NotInitialized));
        assert_eq!(tracker.current(), FilterPhase::Uninitialized);
        assert!(tracker.entered_at(FilterPhase::Predicted).is_nan());
    }

    #[test]
    fn test_cycle_and_timestamps() {
        let mut tracker = PhaseTracker::new();
        tracker.init(1.0);
        tracker.predicted(1.1).unwrap();
        tracker.updated(1.1).unwrap();
        tracker.predicted(1.2).unwrap();

        assert_eq!(tracker.current(), FilterPhase::Predicted);
        assert_eq!(tracker.current().label(), "Predicted");
        assert_eq!(tracker.entered_at(FilterPhase::Initialized), 1.0);
        assert_eq!(tracker.entered_at(FilterPhase::Predicted), 1.2);
        assert_eq!(tracker.entered_at(FilterPhase::Updated), 1.1);
        assert_eq!(tracker.predict_count(), 2);
        assert_eq!(tracker.update_count(), 1);
    }

    #[test]
    fn test_reinit_resets_history() {
        let mut tracker = PhaseTracker::new();
        tracker.init(0.0);
        tracker.predicted(0.5).unwrap();
        tracker.init(10.0);
        assert_eq!(tracker.current(), FilterPhase::Initialized);
        assert_eq!(tracker.predict_count(), 0);
        assert!(tracker.entered_at(FilterPhase::Predicted).is_nan());
        assert_eq!(tracker.entered_at(FilterPhase::Initialized), 10.0);
    }
}
