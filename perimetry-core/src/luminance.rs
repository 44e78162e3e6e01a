use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stimulus luminance at 0 dB attenuation (1000 asb), in cd/m².
pub const REFERENCE_NITS: f64 = 315.0;

const DISPLAY_GAMMA: f64 = 2.2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LuminanceError {
    #[error("luminance label must be two characters, got {0:?}")]
    InvalidLength(String),
    #[error("luminance level must be a digit 1-4, got {0:?}")]
    InvalidLevel(char),
    #[error("luminance step must be a letter a-e, got {0:?}")]
    InvalidStep(char),
}

/// Goldmann luminance code such as `3e`: a filter level digit (1–4, 5 dB
/// apart) and a fine step letter (a–e, 1 dB apart). `4e` is unattenuated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LuminanceLabel {
    level: u8,
    step: u8,
}

impl LuminanceLabel {
    pub fn new(level: u8, step: char) -> Result<Self, LuminanceError> {
        if !(1..=4).contains(&level) {
            return Err(LuminanceError::InvalidLevel(
                char::from_digit(level as u32, 10).unwrap_or('?'),
            ));
        }
        if !('a'..='e').contains(&step) {
            return Err(LuminanceError::InvalidStep(step));
        }
        Ok(Self {
            level,
            step: step as u8,
        })
    }

    /// Label known at compile time; invalid input fails const evaluation.
    pub const fn from_static(level: u8, step: char) -> Self {
        assert!(level >= 1 && level <= 4, "luminance level must be 1-4");
        assert!(step >= 'a' && step <= 'e', "luminance step must be a-e");
        Self {
            level,
            step: step as u8,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn step(&self) -> char {
        self.step as char
    }

    /// Total attenuation in dB: 0/5/10/15 for levels 4..1 plus 0..4 for e..a.
    pub fn attenuation_db(&self) -> f64 {
        let coarse = (4 - self.level) as f64 * 5.0;
        let fine = (b'e' - self.step) as f64;
        coarse + fine
    }

    pub fn intensity_nits(&self) -> f64 {
        REFERENCE_NITS * 10f64.powf(-self.attenuation_db() / 10.0)
    }
}

impl FromStr for LuminanceLabel {
    type Err = LuminanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(digit), Some(letter), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(LuminanceError::InvalidLength(s.to_string()));
        };
        let level = digit
            .to_digit(10)
            .ok_or(LuminanceError::InvalidLevel(digit))?;
        if !(1..=4).contains(&level) {
            return Err(LuminanceError::InvalidLevel(digit));
        }
        Self::new(level as u8, letter)
    }
}

impl TryFrom<String> for LuminanceLabel {
    type Error = LuminanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LuminanceLabel> for String {
    fn from(label: LuminanceLabel) -> Self {
        label.to_string()
    }
}

impl fmt::Display for LuminanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level, self.step as char)
    }
}

/// Decodes a raw label and returns the stimulus luminance in cd/m².
pub fn stimulus_intensity_nits(label: &str) -> Result<f64, LuminanceError> {
    Ok(label.parse::<LuminanceLabel>()?.intensity_nits())
}

/// Normalized grayscale RGB for a stimulus drawn over the given background.
///
/// Returns full white when stimulus plus background exceed the headset.
pub fn display_color(label: &LuminanceLabel, background_nits: f64, max_nits: f64) -> [f32; 3] {
    let total = label.intensity_nits() + background_nits;
    if max_nits <= 0.0 || total > max_nits {
        return [1.0; 3];
    }
    let value = (total / max_nits).powf(1.0 / DISPLAY_GAMMA) as f32;
    [value; 3]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn all_labels() -> Vec<LuminanceLabel> {
        let mut labels = Vec::new();
        for level in 1..=4 {
            for step in ['a', 'b', 'c', 'd', 'e'] {
                labels.push(LuminanceLabel::new(level, step).unwrap());
            }
        }
        labels
    }

    #[test]
    fn test_unattenuated_label_is_reference() {
        assert_eq!(stimulus_intensity_nits("4e").unwrap(), 315.0);
    }

    #[test]
    fn test_known_attenuations() {
        let label: LuminanceLabel = "3e".parse().unwrap();
        assert_eq!(label.attenuation_db(), 5.0);
        let label: LuminanceLabel = "1a".parse().unwrap();
        assert_eq!(label.attenuation_db(), 19.0);
        assert_relative_eq!(
            stimulus_intensity_nits("2e").unwrap(),
            31.5,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_intensity_decreases_with_attenuation() {
        for label in all_labels() {
            let nits = label.intensity_nits();
            if label.level() > 1 {
                let dimmer = LuminanceLabel::new(label.level() - 1, label.step()).unwrap();
                assert!(dimmer.intensity_nits() < nits, "{dimmer} vs {label}");
            }
            if label.step() > 'a' {
                let step = (label.step() as u8 - 1) as char;
                let dimmer = LuminanceLabel::new(label.level(), step).unwrap();
                assert!(dimmer.intensity_nits() < nits, "{dimmer} vs {label}");
            }
        }
    }

    #[test]
    fn test_malformed_labels() {
        assert_eq!(
            stimulus_intensity_nits("5e"),
            Err(LuminanceError::InvalidLevel('5'))
        );
        assert_eq!(
            stimulus_intensity_nits("0e"),
            Err(LuminanceError::InvalidLevel('0'))
        );
        assert_eq!(
            stimulus_intensity_nits("3f"),
            Err(LuminanceError::InvalidStep('f'))
        );
        assert_eq!(
            stimulus_intensity_nits("xe"),
            Err(LuminanceError::InvalidLevel('x'))
        );
        assert!(matches!(
            stimulus_intensity_nits("3"),
            Err(LuminanceError::InvalidLength(_))
        ));
        assert!(matches!(
            stimulus_intensity_nits("3ee"),
            Err(LuminanceError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_display_color_clips_to_white() {
        let label: LuminanceLabel = "4e".parse().unwrap();
        assert_eq!(display_color(&label, 10.0, 150.0), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_display_color_gamma() {
        // 1e: 315 · 10^-1.5 ≈ 9.96 cd/m²
        let label: LuminanceLabel = "1e".parse().unwrap();
        let total = label.intensity_nits() + 10.0;
        let expected = (total / 150.0).powf(1.0 / 2.2) as f32;
        let [r, g, b] = display_color(&label, 10.0, 150.0);
        assert_relative_eq!(r, expected, max_relative = 1e-6);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r < 1.0);
    }

    #[test]
    fn test_serde_as_string() {
        let label: LuminanceLabel = serde_json::from_str("\"2e\"").unwrap();
        assert_eq!(label.to_string(), "2e");
        assert_eq!(serde_json::to_string(&label).unwrap(), "\"2e\"");
        assert!(serde_json::from_str::<LuminanceLabel>("\"9z\"").is_err());
    }

    #[test]
    fn test_ordering_follows_text() {
        let a: LuminanceLabel = "2e".parse().unwrap();
        let b: LuminanceLabel = "3a".parse().unwrap();
        assert!(a < b);
    }
}
