use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Goldmann stimulus size classes.
///
/// `None` is the terminal sentinel of the successor chain and is never tested.
/// The derived ordering (I < II < … < V < None) is the key order used by the
/// results sheet and its export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    I,
    II,
    III,
    IV,
    V,
    None,
}

struct SizeSpec {
    angular_deg: f64,
    speed_deg_s: f64,
    name: &'static str,
}

// Indexed by `SizeClass::index`. Angular diameters after the Octopus visual
// field digest, p. 217.
const SIZE_TABLE: [SizeSpec; 6] = [
    SizeSpec { angular_deg: 0.11, speed_deg_s: 5.0, name: "Size_I" },
    SizeSpec { angular_deg: 0.22, speed_deg_s: 5.0, name: "Size_II" },
    SizeSpec { angular_deg: 0.43, speed_deg_s: 5.0, name: "Size_III" },
    SizeSpec { angular_deg: 0.86, speed_deg_s: 5.0, name: "Size_IV" },
    SizeSpec { angular_deg: 1.72, speed_deg_s: 5.0, name: "Size_V" },
    SizeSpec { angular_deg: 0.0, speed_deg_s: 0.0, name: "None" },
];

impl SizeClass {
    /// Testable classes, largest first.
    pub const DESCENDING: [SizeClass; 5] = [
        SizeClass::V,
        SizeClass::IV,
        SizeClass::III,
        SizeClass::II,
        SizeClass::I,
    ];

    fn index(self) -> usize {
        match self {
            Self::I => 0,
            Self::II => 1,
            Self::III => 2,
            Self::IV => 3,
            Self::V => 4,
            Self::None => 5,
        }
    }

    /// Maps the roman numeral as a number (1..=5); anything else is `None`.
    pub fn from_number(number: u8) -> Self {
        match number {
            1 => Self::I,
            2 => Self::II,
            3 => Self::III,
            4 => Self::IV,
            5 => Self::V,
            _ => Self::None,
        }
    }

    /// Angular diameter in degrees.
    pub fn angular_size_deg(self) -> f64 {
        SIZE_TABLE[self.index()].angular_deg
    }

    /// Base (precision) sweep speed in degrees per second.
    pub fn speed_deg_s(self) -> f64 {
        SIZE_TABLE[self.index()].speed_deg_s
    }

    pub fn name(self) -> &'static str {
        SIZE_TABLE[self.index()].name
    }

    /// Next class in decreasing physical size, `None` after `I`.
    pub fn next_smaller(self) -> Self {
        match self {
            Self::V => Self::IV,
            Self::IV => Self::III,
            Self::III => Self::II,
            Self::II => Self::I,
            Self::I | Self::None => Self::None,
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical stimulus areas once a viewing distance is known.
#[derive(Debug, Clone, Default)]
pub struct SizeCatalog {
    distances: [Option<f64>; 6],
    areas: [Option<f64>; 6],
}

impl SizeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the viewing distance and recomputes `π · (tan(size/2) · d)²`.
    pub fn set_distance(&mut self, size: SizeClass, distance: f64) {
        let half_angle = size.angular_size_deg().to_radians() * 0.5;
        let radius_m = half_angle.tan() * distance;
        let i = size.index();
        self.distances[i] = Some(distance);
        self.areas[i] = Some(radius_m * radius_m * PI);
    }

    pub fn distance(&self, size: SizeClass) -> Option<f64> {
        self.distances[size.index()]
    }

    /// Last computed area in m², 0 if no distance was set yet.
    pub fn area(&self, size: SizeClass) -> f64 {
        self.areas[size.index()].unwrap_or(0.0)
    }

    /// Radius of the disc with the stimulus area, in metres.
    pub fn radius_m(&self, size: SizeClass) -> f64 {
        (self.area(size) / PI).sqrt()
    }

    pub fn next_smaller(&self, size: SizeClass) -> SizeClass {
        size.next_smaller()
    }
}
