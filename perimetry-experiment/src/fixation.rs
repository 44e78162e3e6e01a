use nalgebra::{Point3, Vector3};
use perimetry_core::PerimetryStatus;
use perimetry_timing::Timer;
use rand::Rng;
use tracing::debug;

use crate::state::StimulusScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixationState {
    Fixating,
    LookingAway,
}

/// Gaze gate: the sweep only runs while the eye stays on the fixation star.
#[derive(Debug, Clone, Copy)]
pub struct FixationMonitor {
    acceptance_deg: f64,
}

impl FixationMonitor {
    pub fn new(acceptance_deg: f64) -> Self {
        Self { acceptance_deg }
    }

    pub fn acceptance_deg(&self) -> f64 {
        self.acceptance_deg
    }

    /// Angle in degrees between two directions, `None` if either is zero.
    pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<f64> {
        let a = a.try_normalize(f64::EPSILON)?;
        let b = b.try_normalize(f64::EPSILON)?;
        Some(a.dot(&b).clamp(-1.0, 1.0).acos().to_degrees())
    }

    pub fn classify(
        &self,
        head: &Point3<f64>,
        target: &Point3<f64>,
        gaze: &Vector3<f64>,
    ) -> FixationState {
        match Self::angle_between(gaze, &(target - head)) {
            Some(angle) if angle <= self.acceptance_deg => FixationState::Fixating,
            _ => FixationState::LookingAway,
        }
    }

    /// Pauses a running sweep when the gaze leaves the target and resumes it
    /// once it is back. Returns whether the scheduler changed state.
    pub fn apply<T, R>(&self, state: FixationState, scheduler: &mut StimulusScheduler<T, R>) -> bool
    where
        T: Timer<Timestamp = u64>,
        R: Rng,
    {
        let changed = match (state, scheduler.status()) {
            (FixationState::Fixating, PerimetryStatus::Paused) => scheduler.resume(),
            (FixationState::LookingAway, PerimetryStatus::Running) => scheduler.pause(false),
            _ => false,
        };
        if changed {
            debug!(?state, status = %scheduler.status(), "gaze gate");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PerimetryConfig;
    use approx::assert_relative_eq;
    use perimetry_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_angle_between() {
        let a = Vector3::new(0.0, 0.0, -1.0);
        assert_relative_eq!(FixationMonitor::angle_between(&a, &a).unwrap(), 0.0);
        let b = Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(FixationMonitor::angle_between(&a, &b).unwrap(), 90.0);
        assert!(FixationMonitor::angle_between(&a, &Vector3::zeros()).is_none());
    }

    #[test]
    fn test_classify_against_acceptance() {
        let monitor = FixationMonitor::new(6.0);
        let head = Point3::origin();
        let target = Point3::new(0.0, 0.0, -50.0);
        let on = Vector3::new(0.0, 0.0, -1.0);
        // tan(5°) ≈ 0.0875, tan(7°) ≈ 0.1228
        let near = Vector3::new(0.0875, 0.0, -1.0);
        let off = Vector3::new(0.1228, 0.0, -1.0);
        assert_eq!(monitor.classify(&head, &target, &on), FixationState::Fixating);
        assert_eq!(monitor.classify(&head, &target, &near), FixationState::Fixating);
        assert_eq!(monitor.classify(&head, &target, &off), FixationState::LookingAway);
        assert_eq!(
            monitor.classify(&head, &target, &Vector3::zeros()),
            FixationState::LookingAway
        );
    }

    #[test]
    fn test_apply_pauses_and_resumes() {
        let timer = ManualTimer::new();
        let mut scheduler = StimulusScheduler::new(
            PerimetryConfig::default(),
            timer.clone(),
            StdRng::seed_from_u64(9),
        );
        let monitor = FixationMonitor::new(6.0);
        assert!(!monitor.apply(FixationState::LookingAway, &mut scheduler));

        scheduler.start().unwrap();
        timer.advance_secs(0.05);
        assert!(monitor.apply(FixationState::LookingAway, &mut scheduler));
        assert_eq!(scheduler.status(), PerimetryStatus::Paused);
        assert!(!monitor.apply(FixationState::LookingAway, &mut scheduler));
        assert!(monitor.apply(FixationState::Fixating, &mut scheduler));
        assert_eq!(scheduler.status(), PerimetryStatus::Running);
        assert_eq!(scheduler.sheet().point_count(perimetry_core::Eye::Right), 0);
    }
}
