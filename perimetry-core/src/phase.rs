use serde::{Deserialize, Serialize};
use std::fmt;

/// Eye under test. The numeric codes (1 = right, 2 = left) follow the host's
/// menu convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Right,
    Left,
}

impl Eye {
    pub fn code(self) -> u8 {
        match self {
            Eye::Right => 1,
            Eye::Left => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Eye::Right),
            2 => Some(Eye::Left),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Eye::Right => Eye::Left,
            Eye::Left => Eye::Right,
        }
    }

    /// Prefix used for exported result files.
    pub fn file_prefix(self) -> &'static str {
        match self {
            Eye::Right => "Right_",
            Eye::Left => "Left_",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Eye::Right => "right",
            Eye::Left => "left",
        })
    }
}

/// Phases of a two-eye perimetry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    /// Menu asking the subject to cover the other eye.
    EyeMenu(Eye),
    Testing(Eye),
    Debrief,
}

impl SessionPhase {
    pub fn allows_detection(&self) -> bool {
        matches!(self, Self::Testing(_))
    }

    pub fn is_debrief(&self) -> bool {
        matches!(self, Self::Debrief)
    }

    /// Next phase given the eye tested first; `None` after `Debrief`.
    pub fn next(&self, first_eye: Eye) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => EyeMenu(first_eye),
            EyeMenu(eye) => Testing(*eye),
            Testing(eye) if *eye == first_eye => EyeMenu(eye.other()),
            Testing(_) => Debrief,
            Debrief => return None,
        })
    }
}
