use std::path::{Path, PathBuf};

use nalgebra::Point3;
use perimetry_core::{Eye, PerimetryStatus, SessionPhase};
use perimetry_timing::Timer;
use rand::Rng;
use tracing::{info, warn};

use crate::config::PerimetryConfig;
use crate::error::Result;
use crate::export;
use crate::fixation::{FixationMonitor, FixationState};
use crate::state::{RenderParams, StimulusFrame, StimulusScheduler};

/// Result of polling the session once.
#[derive(Debug)]
pub struct SessionUpdate {
    pub phase: SessionPhase,
    pub frame: StimulusFrame,
    pub render: Option<RenderParams>,
    /// Set on the frame an eye finished; the outcome of its export.
    pub export: Option<Result<PathBuf>>,
}

/// Drives both eyes through the scheduler: welcome, one menu and one test per
/// eye, debrief. Each finished eye is exported before the next one starts.
pub struct PerimetrySession<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    scheduler: StimulusScheduler<T, R>,
    monitor: FixationMonitor,
    phase: SessionPhase,
    first_eye: Eye,
    export_dir: PathBuf,
    menu_paused: bool,
}

impl<T, R> PerimetrySession<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    /// `first_eye` of `None` flips a coin with the session's RNG.
    pub fn new(
        config: PerimetryConfig,
        timer: T,
        rng: R,
        export_dir: impl Into<PathBuf>,
        first_eye: Option<Eye>,
    ) -> Self {
        let monitor = FixationMonitor::new(config.fixation_acceptance_deg);
        let mut scheduler = StimulusScheduler::new(config, timer, rng);
        let first_eye = first_eye.unwrap_or_else(|| {
            if scheduler.rng_mut().random_bool(0.5) {
                Eye::Right
            } else {
                Eye::Left
            }
        });
        scheduler.set_active_eye(first_eye);
        info!(%first_eye, "session created");

        Self {
            scheduler,
            monitor,
            phase: SessionPhase::Welcome,
            first_eye,
            export_dir: export_dir.into(),
            menu_paused: false,
        }
    }

    /// Trigger button. Registers a detection while a sweep is running,
    /// otherwise moves through the menus. Returns whether anything happened.
    pub fn confirm(&mut self) -> Result<bool> {
        match self.phase {
            SessionPhase::Testing(_) => {
                if self.scheduler.status() == PerimetryStatus::Running {
                    Ok(self.scheduler.point_detected())
                } else {
                    Ok(false)
                }
            }
            SessionPhase::Welcome => {
                self.phase = SessionPhase::EyeMenu(self.first_eye);
                Ok(true)
            }
            SessionPhase::EyeMenu(eye) => {
                self.scheduler.set_active_eye(eye);
                self.scheduler.start()?;
                self.menu_paused = false;
                self.phase = SessionPhase::Testing(eye);
                info!(%eye, "testing started");
                Ok(true)
            }
            SessionPhase::Debrief => Ok(false),
        }
    }

    /// Pause menu toggle while testing.
    pub fn toggle_pause(&mut self) -> bool {
        if !self.phase.allows_detection() {
            return false;
        }
        if self.menu_paused {
            self.menu_paused = !self.scheduler.resume();
            !self.menu_paused
        } else {
            self.menu_paused = self.scheduler.pause(false);
            self.menu_paused
        }
    }

    /// Feeds the latest gaze classification. Ignored while the pause menu is
    /// open so looking back at the star does not override it.
    pub fn update_gaze(&mut self, state: FixationState) -> bool {
        if !self.phase.allows_detection() || self.menu_paused {
            return false;
        }
        self.monitor.apply(state, &mut self.scheduler)
    }

    pub fn set_fixation_target(&mut self, target: &Point3<f64>) {
        self.scheduler.set_fixation_target(target);
    }

    /// Polls the scheduler once. When the active eye's sequence is done its
    /// sheet is exported and the session moves on.
    pub fn frame(&mut self) -> SessionUpdate {
        let frame = self.scheduler.current_point_info(false);
        let render = self.scheduler.render_params(&frame);

        let mut export = None;
        let finished = match self.phase {
            SessionPhase::Testing(eye) if self.scheduler.status() == PerimetryStatus::Done => {
                Some(eye)
            }
            _ => None,
        };
        if let Some(eye) = finished {
            export = Some(self.export_eye(eye));
            self.scheduler.reset();
            self.menu_paused = false;
            self.phase = self.phase.next(self.first_eye).unwrap_or(SessionPhase::Debrief);
            match self.phase {
                SessionPhase::EyeMenu(next) => {
                    self.scheduler.set_active_eye(next);
                    info!(finished = %eye, %next, "switching eye");
                }
                _ => info!(
                    right = self.scheduler.sheet().point_count(Eye::Right),
                    left = self.scheduler.sheet().point_count(Eye::Left),
                    "session finished"
                ),
            }
        }

        SessionUpdate {
            phase: self.phase,
            frame,
            render,
            export,
        }
    }

    /// Writes one eye's sheet to the export directory. Safe to call again
    /// after a failed attempt.
    pub fn export_eye(&self, eye: Eye) -> Result<PathBuf> {
        let result = export::write_to_dir(self.scheduler.sheet(), eye, &self.export_dir);
        if let Err(err) = &result {
            warn!(%eye, %err, "results for this eye were not saved");
        }
        result
    }

    pub fn set_export_dir(&mut self, dir: impl Into<PathBuf>) {
        self.export_dir = dir.into();
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn first_eye(&self) -> Eye {
        self.first_eye
    }

    pub fn is_menu_paused(&self) -> bool {
        self.menu_paused
    }

    pub fn monitor(&self) -> &FixationMonitor {
        &self.monitor
    }

    pub fn scheduler(&self) -> &StimulusScheduler<T, R> {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PerimetryError;
    use crate::trial::TestVector;
    use perimetry_core::{LuminanceLabel, SizeClass};
    use perimetry_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn l(s: &str) -> LuminanceLabel {
        s.parse().unwrap()
    }

    fn config() -> PerimetryConfig {
        PerimetryConfig {
            randomize: false,
            iterations_per_size: 1,
            luminances: BTreeMap::from([(SizeClass::V, vec![l("4e")])]),
            vectors: vec![TestVector::new(0, 90.0, 90.0)],
            ..Default::default()
        }
    }

    type TestSession = PerimetrySession<ManualTimer, StdRng>;

    fn session(dir: &Path, first: Option<Eye>) -> (TestSession, ManualTimer) {
        let timer = ManualTimer::new();
        let session = PerimetrySession::new(
            config(),
            timer.clone(),
            StdRng::seed_from_u64(11),
            dir,
            first,
        );
        (session, timer)
    }

    #[test]
    fn test_menus_lead_into_testing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(dir.path(), Some(Eye::Left));
        assert_eq!(s.phase(), SessionPhase::Welcome);
        assert!(s.confirm().unwrap());
        assert_eq!(s.phase(), SessionPhase::EyeMenu(Eye::Left));
        assert!(s.confirm().unwrap());
        assert_eq!(s.phase(), SessionPhase::Testing(Eye::Left));
        assert_eq!(s.scheduler().active_eye(), Eye::Left);
        assert_eq!(s.scheduler().status(), PerimetryStatus::Running);
    }

    #[test]
    fn test_toggle_pause_blocks_gaze_resume() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(dir.path(), Some(Eye::Right));
        assert!(!s.toggle_pause());
        s.confirm().unwrap();
        s.confirm().unwrap();
        timer.advance_secs(0.05);
        assert!(s.toggle_pause());
        assert!(s.is_menu_paused());
        assert!(!s.update_gaze(FixationState::Fixating));
        assert_eq!(s.scheduler().status(), PerimetryStatus::Paused);
        // A detection press while paused is ignored.
        assert!(!s.confirm().unwrap());
        assert!(s.toggle_pause());
        assert_eq!(s.scheduler().status(), PerimetryStatus::Running);
    }

    #[test]
    fn test_fixation_target_moves_drawn_field_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut moved, timer) = session(dir.path(), Some(Eye::Right));
        let (mut straight, straight_timer) = session(dir.path(), Some(Eye::Right));
        moved.set_fixation_target(&Point3::new(50.0, 0.0, 0.0));
        for s in [&mut moved, &mut straight] {
            s.confirm().unwrap();
            s.confirm().unwrap();
        }
        timer.advance_secs(0.1);
        straight_timer.advance_secs(0.1);

        let a = moved.frame().frame;
        let b = straight.frame().frame;
        assert_eq!(a.point, b.point);
        assert!((a.position - b.position).norm() > 1.0);
        assert!((a.position.coords.norm() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_export_dir_still_advances() {
        let (mut s, timer) = session(Path::new(""), Some(Eye::Right));
        s.confirm().unwrap();
        s.confirm().unwrap();
        timer.advance_secs(0.1);
        assert!(s.confirm().unwrap());

        let update = s.frame();
        assert!(matches!(update.export, Some(Err(PerimetryError::MissingExportPath))));
        assert_eq!(update.phase, SessionPhase::EyeMenu(Eye::Left));
        assert_eq!(s.scheduler().status(), PerimetryStatus::NotStarted);

        // Retry once a directory is known.
        let dir = tempfile::tempdir().unwrap();
        s.set_export_dir(dir.path());
        let path = s.export_eye(Eye::Right).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("0,Size_V,4e,[("));
    }

    #[test]
    fn test_coin_flip_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = session(dir.path(), None);
        let (b, _) = session(dir.path(), None);
        assert_eq!(a.first_eye(), b.first_eye());
    }
}
