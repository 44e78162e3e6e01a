use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use nalgebra::Point3;
use perimetry_core::{Eye, PerimetryStatus, SessionPhase};
use perimetry_experiment::{PerimetrySession, UNDETECTED_ANGLE};
use perimetry_timing::{FrameStats, Timer};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::observer::{Percept, SimulatedObserver};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub exported: Vec<PathBuf>,
    pub failed_exports: usize,
}

/// Headless host: polls the session once per frame and plays the subject.
pub struct PerimetryApp<T, R, O>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    O: Rng,
{
    session: PerimetrySession<T, R>,
    observer: SimulatedObserver<O>,
    timer: T,
    frame_period: Duration,
    frame_stats: FrameStats,
}

impl<T, R, O> PerimetryApp<T, R, O>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    O: Rng,
{
    pub fn new(
        session: PerimetrySession<T, R>,
        observer: SimulatedObserver<O>,
        timer: T,
        fps: f64,
    ) -> Self {
        Self {
            session,
            observer,
            timer,
            frame_period: Duration::from_secs_f64(1.0 / fps),
            frame_stats: FrameStats::default(),
        }
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        while !self.session.phase().is_debrief() {
            let frame_start = self.timer.now();
            self.update(&mut summary)?;
            summary.frames += 1;

            let spent = self.timer.elapsed(frame_start);
            if spent < self.frame_period {
                self.timer.sleep(self.frame_period - spent);
            }
            self.frame_stats.record(self.timer.elapsed(frame_start));
        }
        self.cleanup(&summary);
        Ok(summary)
    }

    fn update(&mut self, summary: &mut RunSummary) -> Result<()> {
        match self.session.phase() {
            SessionPhase::Welcome => {
                self.session.confirm()?;
            }
            SessionPhase::EyeMenu(eye) => {
                info!(%eye, "cover the other eye and press the trigger");
                // star straight ahead on the stimulus sphere
                let distance = self.session.scheduler().config().meteoroid_distance;
                self.session
                    .set_fixation_target(&Point3::new(0.0, 0.0, -distance));
                self.session
                    .confirm()
                    .with_context(|| format!("failed to start testing the {eye} eye"))?;
            }
            SessionPhase::Testing(eye) => self.update_testing(eye, summary),
            SessionPhase::Debrief => {}
        }
        Ok(())
    }

    fn update_testing(&mut self, eye: Eye, summary: &mut RunSummary) {
        let percept = self.percept(eye);
        let action = self.observer.observe(self.timer.now(), percept.as_ref());
        self.session.update_gaze(action.gaze);
        if action.press && self.session.scheduler().status() == PerimetryStatus::Running {
            match self.session.confirm() {
                Ok(true) => debug!(%eye, "trigger pressed"),
                Ok(false) => {}
                Err(err) => warn!(%err, "trigger press failed"),
            }
        }

        let update = self.session.frame();
        match update.export {
            Some(Ok(path)) => summary.exported.push(path),
            Some(Err(_)) => summary.failed_exports += 1,
            None => {}
        }
    }

    fn percept(&self, eye: Eye) -> Option<Percept> {
        let scheduler = self.session.scheduler();
        if !scheduler.status().is_active() {
            return None;
        }
        let entry = scheduler.current_entry()?;
        Some(Percept {
            sweep: scheduler.cursor(),
            eccentricity: UNDETECTED_ANGLE - scheduler.radial_position(),
            normative: entry.vector.normative(eye),
            size: entry.size,
            luminance: entry.luminance,
        })
    }

    fn cleanup(&self, summary: &RunSummary) {
        let sheet = self.session.scheduler().sheet();
        for eye in [Eye::Right, Eye::Left] {
            info!(%eye, detections = sheet.point_count(eye), "eye summary");
        }
        for path in &summary.exported {
            info!(path = %path.display(), "results file");
        }
        if summary.failed_exports > 0 {
            warn!(failed = summary.failed_exports, "some results were not saved");
        }
        if let Some(stats) = self.frame_stats.summary() {
            info!(
                frames = summary.frames,
                avg_ms = stats.average_frame_time_ns / 1e6,
                jitter_ms = stats.jitter_ns / 1e6,
                fps = stats.effective_fps,
                "frame timing"
            );
        }
    }
}
