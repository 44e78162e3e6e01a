use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler status. `NotStarted` and `Done` both mean inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerimetryStatus {
    #[default]
    NotStarted,
    Running,
    Paused,
    Done,
}

impl PerimetryStatus {
    /// Status string the host menus key on.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Done => "Done",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for PerimetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result point in degrees: `phi` horizontal, `theta` vertical,
/// both within [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarPoint {
    pub theta: f64,
    pub phi: f64,
}

impl PolarPoint {
    pub fn new(theta: f64, phi: f64) -> Self {
        Self { theta, phi }
    }
}
