use nalgebra::Point3;
use perimetry_core::{
    display_color, Eye, LuminanceLabel, PerimetryStatus, PolarPoint, SizeCatalog, SizeClass,
};
use perimetry_timing::{seconds_between, Timer};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::PerimetryConfig;
use crate::error::{PerimetryError, Result};
use crate::geometry::SphereProjection;
use crate::sheet::{ResultsSheet, UNDETECTED_ANGLE};
use crate::trial::{build_sequence, SequenceEntry};

/// What the host should draw this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusFrame {
    pub visible: bool,
    pub position: Point3<f64>,
    pub size: SizeClass,
    pub point: PolarPoint,
    pub luminance: Option<LuminanceLabel>,
    pub longitude: Option<u16>,
}

impl StimulusFrame {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            position: Point3::origin(),
            size: SizeClass::None,
            point: PolarPoint::default(),
            luminance: None,
            longitude: None,
        }
    }

    fn paused_default(radius: f64) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, -radius),
            size: SizeClass::I,
            ..Self::hidden()
        }
    }
}

/// Sphere to draw for a visible stimulus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub position: Point3<f64>,
    pub radius_m: f64,
    pub color: [f32; 3],
}

/// Adaptive kinetic staircase. Each sequence entry sweeps a stimulus from the
/// rim (radial 0) towards fixation (radial 90) along one meridian; the sweep
/// ends at a detection or when the centre is reached.
///
/// Time only moves when the host polls [`current_point_info`], once per frame.
///
/// [`current_point_info`]: StimulusScheduler::current_point_info
pub struct StimulusScheduler<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    timer: T,
    rng: R,
    config: PerimetryConfig,
    sheet: ResultsSheet,
    catalog: SizeCatalog,
    projection: SphereProjection,
    sequence: Vec<SequenceEntry>,
    cursor: usize,
    radial: f64,
    status: PerimetryStatus,
    eye: Eye,
    last_update: Option<u64>,
    /// Capped frame time the current sweep has actually advanced by.
    sweep_elapsed_s: f64,
    paused_frame: StimulusFrame,
}

impl<T, R> StimulusScheduler<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(config: PerimetryConfig, timer: T, rng: R) -> Self {
        let mut sheet = ResultsSheet::new();
        for eye in [Eye::Right, Eye::Left] {
            sheet.setup(&config.vectors, &config.luminances, eye);
        }
        let projection = SphereProjection::new(config.meteoroid_distance);
        let paused_frame = StimulusFrame::paused_default(config.meteoroid_distance);

        Self {
            timer,
            rng,
            config,
            sheet,
            catalog: SizeCatalog::new(),
            projection,
            sequence: Vec::new(),
            cursor: 0,
            radial: 0.0,
            status: PerimetryStatus::NotStarted,
            eye: Eye::Right,
            last_update: None,
            sweep_elapsed_s: 0.0,
            paused_frame,
        }
    }

    /// Builds a fresh sequence and starts sweeping its first entry.
    ///
    /// On a rejected configuration the scheduler keeps its previous state.
    pub fn start(&mut self) -> Result<()> {
        if let Err(err) = self.config.validate() {
            warn!(%err, "refusing to start");
            return Err(err);
        }
        let sequence = build_sequence(&self.config, &mut self.rng);
        if sequence.is_empty() {
            warn!("refusing to start with an empty test sequence");
            return Err(PerimetryError::InvalidConfiguration(
                "test sequence is empty".into(),
            ));
        }

        let now = self.timer.now();
        self.sequence = sequence;
        self.cursor = 0;
        self.radial = 0.0;
        self.last_update = Some(now);
        self.sweep_elapsed_s = 0.0;
        self.paused_frame = StimulusFrame::paused_default(self.projection.radius());
        self.status = PerimetryStatus::Running;
        self.prepare_current_size();

        info!(entries = self.sequence.len(), eye = %self.eye, "test sequence built");
        Ok(())
    }

    /// Per-frame tick. Advances the sweep by the clamped time since the last
    /// call and reports what to draw. With `detected` set, the current
    /// position is recorded as a detection before anything else moves on.
    pub fn current_point_info(&mut self, detected: bool) -> StimulusFrame {
        match self.status {
            PerimetryStatus::Paused => {
                self.last_update = Some(self.timer.now());
                return self.paused_frame.clone();
            }
            PerimetryStatus::NotStarted | PerimetryStatus::Done => {
                return StimulusFrame::hidden();
            }
            PerimetryStatus::Running => {}
        }

        let now = self.timer.now();
        let mut delta = self
            .last_update
            .map_or(0.0, |last| seconds_between(last, now))
            .clamp(0.0, self.config.max_frame_delta_s);
        self.last_update = Some(now);
        if detected {
            delta = (delta - self.config.reaction_time_s).max(0.0);
        }

        let mut detected = detected;
        loop {
            let Some(entry) = self.sequence.get(self.cursor).copied() else {
                self.status = PerimetryStatus::Done;
                info!(eye = %self.eye, "test sequence exhausted");
                return StimulusFrame::hidden();
            };

            let threshold = self.current_threshold(&entry);
            self.radial += self.adaptive_speed(entry.size, self.radial, threshold) * delta;
            self.sweep_elapsed_s += delta;

            if detected {
                self.record_detection(&entry);
                detected = false;
            }

            if self.radial >= UNDETECTED_ANGLE {
                debug!(
                    longitude = entry.longitude(),
                    size = %entry.size,
                    luminance = %entry.luminance,
                    "sweep reached the centre"
                );
                self.advance_cursor();
                delta = 0.0;
                continue;
            }

            let (position, point) = self
                .projection
                .coordinates(f64::from(entry.longitude()), self.radial / UNDETECTED_ANGLE);
            return StimulusFrame {
                visible: true,
                position,
                size: entry.size,
                point,
                luminance: Some(entry.luminance),
                longitude: Some(entry.longitude()),
            };
        }
    }

    /// Sweep speed in °/s at `radial` for an expected threshold eccentricity.
    pub fn adaptive_speed(&self, size: SizeClass, radial: f64, threshold: f64) -> f64 {
        let base = self.config.base_speed(size);
        let fast = self.config.fast_speed_deg_s.max(base);
        let eccentricity = UNDETECTED_ANGLE - radial;
        if eccentricity <= threshold {
            return base;
        }

        let distance = eccentricity - threshold;
        let margin = self.config.safety_margin_deg;
        let ramp = self.config.ramp_deg;
        if distance <= margin {
            base
        } else if distance >= margin + ramp {
            fast
        } else {
            base + (fast - base) * (distance - margin) / ramp
        }
    }

    /// Freezes the stimulus. Returns false unless the scheduler was running
    /// and still is after the final tick.
    pub fn pause(&mut self, detected: bool) -> bool {
        if self.status != PerimetryStatus::Running {
            return false;
        }
        let mut frame = self.current_point_info(detected);
        if self.status != PerimetryStatus::Running {
            return false;
        }

        // Folds count capped sweep time, never wall-clock time.
        let per_longitude = self.seconds_per_longitude();
        if per_longitude > 0.0 {
            let whole = (self.sweep_elapsed_s / per_longitude).floor() as usize;
            if whole > 0 {
                self.cursor = (self.cursor + whole).min(self.sequence.len());
                self.radial = 0.0;
                self.prepare_current_size();
                frame = StimulusFrame::paused_default(self.projection.radius());
                debug!(skipped = whole, cursor = self.cursor, "folded elapsed sweeps into cursor");
            }
            self.sweep_elapsed_s %= per_longitude;
        }

        self.paused_frame = frame;
        self.status = PerimetryStatus::Paused;
        debug!(cursor = self.cursor, radial = self.radial, "paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != PerimetryStatus::Paused {
            return false;
        }
        self.last_update = Some(self.timer.now());
        self.paused_frame = StimulusFrame::paused_default(self.projection.radius());
        self.status = PerimetryStatus::Running;
        debug!(cursor = self.cursor, radial = self.radial, "resumed");
        true
    }

    /// Back to `NotStarted`. The results sheet is kept.
    pub fn reset(&mut self) {
        self.last_update = None;
        self.cursor = 0;
        self.radial = 0.0;
        self.sweep_elapsed_s = 0.0;
        self.paused_frame = StimulusFrame::paused_default(self.projection.radius());
        self.status = PerimetryStatus::NotStarted;
        debug!("scheduler reset");
    }

    /// Trigger pressed while the stimulus was shown: records the detection
    /// and moves straight on to the next sequence entry.
    pub fn point_detected(&mut self) -> bool {
        let cursor = self.cursor;
        if !self.pause(true) {
            return false;
        }
        if self.cursor == cursor {
            self.advance_cursor();
        }
        self.last_update = Some(self.timer.now());
        self.sweep_elapsed_s = 0.0;
        self.paused_frame = StimulusFrame::paused_default(self.projection.radius());
        self.status = PerimetryStatus::Running;
        true
    }

    pub fn render_params(&self, frame: &StimulusFrame) -> Option<RenderParams> {
        if !frame.visible {
            return None;
        }
        let luminance = frame.luminance?;
        Some(RenderParams {
            position: frame.position,
            radius_m: self.catalog.radius_m(frame.size),
            color: display_color(
                &luminance,
                self.config.background_nits,
                self.config.max_headset_nits,
            ),
        })
    }

    pub fn set_fixation_target(&mut self, target: &Point3<f64>) {
        self.projection.set_fixation_target(target);
    }

    pub fn set_active_eye(&mut self, eye: Eye) {
        if self.eye != eye {
            info!(from = %self.eye, to = %eye, "active eye changed");
        }
        self.eye = eye;
    }

    pub fn active_eye(&self) -> Eye {
        self.eye
    }

    pub fn status(&self) -> PerimetryStatus {
        self.status
    }

    pub fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    pub fn sheet(&self) -> &ResultsSheet {
        &self.sheet
    }

    pub fn config(&self) -> &PerimetryConfig {
        &self.config
    }

    pub fn radial_position(&self) -> f64 {
        self.radial
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sequence(&self) -> &[SequenceEntry] {
        &self.sequence
    }

    pub fn current_entry(&self) -> Option<&SequenceEntry> {
        self.sequence.get(self.cursor)
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    fn seconds_per_longitude(&self) -> f64 {
        match self.current_entry() {
            Some(entry) => {
                let base = self.config.base_speed(entry.size);
                if base > 0.0 { UNDETECTED_ANGLE / base } else { 0.0 }
            }
            None => 0.0,
        }
    }

    fn current_threshold(&self, entry: &SequenceEntry) -> f64 {
        self.sheet
            .threshold(self.eye, entry.longitude(), entry.size, entry.luminance)
            .unwrap_or_else(|| entry.vector.normative(self.eye))
    }

    fn prepare_current_size(&mut self) {
        if let Some(size) = self.current_entry().map(|e| e.size) {
            self.catalog.set_distance(size, self.config.meteoroid_distance);
        }
    }

    fn advance_cursor(&mut self) {
        self.cursor += 1;
        self.radial = 0.0;
        self.sweep_elapsed_s = 0.0;
        self.prepare_current_size();
    }

    fn record_detection(&mut self, entry: &SequenceEntry) {
        let radial = self.radial.min(UNDETECTED_ANGLE);
        let (_, point) = self
            .projection
            .coordinates(f64::from(entry.longitude()), radial / UNDETECTED_ANGLE);
        let eccentricity = UNDETECTED_ANGLE - radial;
        info!(
            eye = %self.eye,
            longitude = entry.longitude(),
            size = %entry.size,
            luminance = %entry.luminance,
            eccentricity,
            "stimulus detected"
        );

        if let Err(err) =
            self.sheet
                .add_point(point, entry.size, entry.longitude(), self.eye, entry.luminance)
        {
            warn!(%err, "detection not recorded");
            return;
        }
        self.back_propagate(entry, eccentricity);
    }

    /// Carries a detection's eccentricity to the current entry and to every
    /// not yet tested smaller or dimmer stimulus on the same meridian.
    fn back_propagate(&mut self, entry: &SequenceEntry, threshold: f64) {
        let longitude = entry.longitude();
        let mut size = entry.size;
        while !size.is_none() {
            let labels = self.config.luminances_for(size).to_vec();
            for luminance in labels {
                let current = entry.same_stimulus(size, luminance);
                if !current && !self.is_pending(longitude, size, luminance) {
                    continue;
                }
                if self
                    .sheet
                    .set_threshold(self.eye, longitude, size, luminance, threshold)
                    .is_ok()
                {
                    debug!(longitude, %size, %luminance, threshold, "threshold updated");
                }
            }
            size = size.next_smaller();
        }
    }

    fn is_pending(&self, longitude: u16, size: SizeClass, luminance: LuminanceLabel) -> bool {
        self.sequence
            .iter()
            .skip(self.cursor + 1)
            .any(|e| e.longitude() == longitude && e.same_stimulus(size, luminance))
    }
}
