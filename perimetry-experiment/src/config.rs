use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use perimetry_core::{LuminanceLabel, SizeClass};
use serde::{Deserialize, Serialize};

use crate::error::{PerimetryError, Result};
use crate::trial::TestVector;

/// Session configuration, loaded once and handed to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerimetryConfig {
    /// Radius of the stimulus sphere around the viewer, in metres.
    pub meteoroid_distance: f64,
    /// Shuffle meridian order inside every (size, luminance, repetition) block.
    pub randomize: bool,
    /// Overrides the per-size base speed when set, in °/s.
    pub base_speed_deg_s: Option<f64>,
    pub fast_speed_deg_s: f64,
    /// Distance to the expected threshold below which the base speed is used.
    pub safety_margin_deg: f64,
    /// Distance over which speed ramps from base to fast beyond the margin.
    pub ramp_deg: f64,
    pub iterations_per_size: usize,
    pub reaction_time_s: f64,
    pub max_frame_delta_s: f64,
    pub background_nits: f64,
    pub max_headset_nits: f64,
    pub fixation_acceptance_deg: f64,
    pub luminances: BTreeMap<SizeClass, Vec<LuminanceLabel>>,
    pub vectors: Vec<TestVector>,
}

impl Default for PerimetryConfig {
    fn default() -> Self {
        Self {
            meteoroid_distance: 50.0,
            randomize: true,
            base_speed_deg_s: None,
            fast_speed_deg_s: 15.0,
            safety_margin_deg: 15.0,
            ramp_deg: 15.0,
            iterations_per_size: 2,
            reaction_time_s: 0.5,
            max_frame_delta_s: 0.1,
            // Goldmann background 31.5 asb
            background_nits: 10.0,
            max_headset_nits: 150.0,
            fixation_acceptance_deg: 6.0,
            luminances: default_luminances(),
            vectors: default_vectors(),
        }
    }
}

const L4E: LuminanceLabel = LuminanceLabel::from_static(4, 'e');
const L3E: LuminanceLabel = LuminanceLabel::from_static(3, 'e');
const L2E: LuminanceLabel = LuminanceLabel::from_static(2, 'e');

fn default_luminances() -> BTreeMap<SizeClass, Vec<LuminanceLabel>> {
    BTreeMap::from([
        (SizeClass::I, vec![L3E, L2E]),
        (SizeClass::II, vec![]),
        (SizeClass::III, vec![]),
        (SizeClass::IV, vec![]),
        (SizeClass::V, vec![L4E]),
    ])
}

fn default_vectors() -> Vec<TestVector> {
    [
        (0, 85.0, 70.0),
        (30, 80.0, 70.0),
        (60, 65.0, 65.0),
        (90, 55.0, 55.0),
        (120, 65.0, 65.0),
        (150, 70.0, 80.0),
        (180, 70.0, 85.0),
        (210, 75.0, 85.0),
        (240, 75.0, 85.0),
        (270, 75.0, 75.0),
        (300, 85.0, 75.0),
        (330, 85.0, 75.0),
    ]
    .into_iter()
    .map(|(longitude, right, left)| TestVector::new(longitude, right, left))
    .collect()
}

impl PerimetryConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Configured luminances for a size, in test order.
    pub fn luminances_for(&self, size: SizeClass) -> &[LuminanceLabel] {
        self.luminances.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sizes with at least one luminance, largest first.
    pub fn enabled_sizes(&self) -> Vec<SizeClass> {
        SizeClass::DESCENDING
            .into_iter()
            .filter(|size| !self.luminances_for(*size).is_empty())
            .collect()
    }

    pub fn base_speed(&self, size: SizeClass) -> f64 {
        self.base_speed_deg_s.unwrap_or(size.speed_deg_s())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid =
            |msg: String| -> Result<()> { Err(PerimetryError::InvalidConfiguration(msg)) };

        if self.vectors.is_empty() {
            return invalid("no test meridians configured".into());
        }
        let mut seen = BTreeSet::new();
        for vector in &self.vectors {
            if !seen.insert(vector.longitude_deg) {
                return invalid(format!("meridian {} listed twice", vector.longitude_deg));
            }
            for angle in [vector.normative_right, vector.normative_left] {
                if !(0.0..=90.0).contains(&angle) {
                    return invalid(format!(
                        "normative angle {angle} for meridian {} outside 0..=90",
                        vector.longitude_deg
                    ));
                }
            }
        }
        if !self.luminances_for(SizeClass::None).is_empty() {
            return invalid("size None cannot be tested".into());
        }
        if self.enabled_sizes().is_empty() {
            return invalid("no size class has a luminance to test".into());
        }
        if self.iterations_per_size == 0 {
            return invalid("iterations_per_size must be at least 1".into());
        }
        if self.meteoroid_distance <= 0.0 {
            return invalid("meteoroid_distance must be positive".into());
        }
        for size in self.enabled_sizes() {
            let base = self.base_speed(size);
            if base <= 0.0 {
                return invalid(format!("base speed for {size} must be positive"));
            }
            if self.fast_speed_deg_s < base {
                return invalid(format!(
                    "fast speed {} below base speed {base} of {size}",
                    self.fast_speed_deg_s
                ));
            }
        }
        if self.safety_margin_deg < 0.0 || self.ramp_deg < 0.0 {
            return invalid("safety margin and ramp must not be negative".into());
        }
        if self.reaction_time_s < 0.0 {
            return invalid("reaction_time_s must not be negative".into());
        }
        if self.max_frame_delta_s <= 0.0 {
            return invalid("max_frame_delta_s must be positive".into());
        }
        Ok(())
    }
}
