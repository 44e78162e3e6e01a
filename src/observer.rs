use perimetry_core::{LuminanceLabel, SizeClass};
use perimetry_experiment::FixationState;
use perimetry_timing::seconds_between;
use rand::Rng;

/// What the simulated subject sees of the current sweep.
#[derive(Debug, Clone, Copy)]
pub struct Percept {
    /// Index of the sweep in the test sequence.
    pub sweep: usize,
    pub eccentricity: f64,
    pub normative: f64,
    pub size: SizeClass,
    pub luminance: LuminanceLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverAction {
    pub press: bool,
    pub gaze: FixationState,
}

/// Stand-in for a subject in the headset: sees a stimulus once it is inside
/// a per-sweep threshold near the normative one, presses after a reaction
/// latency and now and then glances away from the fixation star.
pub struct SimulatedObserver<R: Rng> {
    rng: R,
    reaction_s: f64,
    look_away_every_s: f64,
    look_away_for_s: f64,
    sweep: Option<usize>,
    threshold: f64,
    press_at: Option<u64>,
    next_glance: Option<u64>,
    back_at: Option<u64>,
}

impl<R: Rng> SimulatedObserver<R> {
    pub fn new(rng: R, reaction_s: f64) -> Self {
        Self {
            rng,
            reaction_s,
            look_away_every_s: 20.0,
            look_away_for_s: 1.5,
            sweep: None,
            threshold: 0.0,
            press_at: None,
            next_glance: None,
            back_at: None,
        }
    }

    /// Expected eccentricity of detection: dimmer and smaller stimuli are
    /// seen closer to fixation.
    fn draw_threshold(&mut self, percept: &Percept) -> f64 {
        let attenuation = percept.luminance.attenuation_db() * 1.5;
        let size_penalty =
            (SizeClass::V.angular_size_deg() - percept.size.angular_size_deg()) * 4.0;
        let jitter = self.rng.random_range(-3.0..=3.0);
        (percept.normative - attenuation - size_penalty + jitter).clamp(0.0, 90.0)
    }

    fn glance_interval(&mut self) -> u64 {
        secs_to_ns(self.look_away_every_s * self.rng.random_range(0.5..1.5))
    }

    fn gaze(&mut self, now: u64) -> FixationState {
        if let Some(back) = self.back_at {
            if now < back {
                return FixationState::LookingAway;
            }
            self.back_at = None;
            let interval = self.glance_interval();
            self.next_glance = Some(now + interval);
            return FixationState::Fixating;
        }
        let next = match self.next_glance {
            Some(next) => next,
            None => {
                let next = now + self.glance_interval();
                self.next_glance = Some(next);
                next
            }
        };
        if now >= next {
            self.back_at = Some(now + secs_to_ns(self.look_away_for_s));
            return FixationState::LookingAway;
        }
        FixationState::Fixating
    }

    /// Decides this frame's action. `percept` is `None` while nothing is shown.
    pub fn observe(&mut self, now: u64, percept: Option<&Percept>) -> ObserverAction {
        let gaze = self.gaze(now);
        let Some(percept) = percept else {
            return ObserverAction { press: false, gaze };
        };

        if self.sweep != Some(percept.sweep) {
            self.sweep = Some(percept.sweep);
            self.threshold = self.draw_threshold(percept);
            self.press_at = None;
        }
        if self.press_at.is_none()
            && gaze == FixationState::Fixating
            && percept.eccentricity <= self.threshold
        {
            self.press_at = Some(now + secs_to_ns(self.reaction_s));
        }

        let press = match self.press_at {
            Some(at) if seconds_between(at, now) >= 0.0 && gaze == FixationState::Fixating => {
                self.press_at = None;
                // nothing more to see on this sweep
                self.threshold = -1.0;
                true
            }
            _ => false,
        };
        ObserverAction { press, gaze }
    }
}

fn secs_to_ns(secs: f64) -> u64 {
    (secs.max(0.0) * 1e9) as u64
}
