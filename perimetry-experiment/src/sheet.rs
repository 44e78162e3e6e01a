use std::collections::BTreeMap;

use perimetry_core::{Eye, LuminanceLabel, PolarPoint, SizeClass};
use serde::Serialize;
use tracing::error;

use crate::error::{PerimetryError, Result};
use crate::trial::TestVector;

/// Threshold value meaning "not detected anywhere inside the rim".
pub const UNDETECTED_ANGLE: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetEntry {
    pub points: Vec<PolarPoint>,
    /// Threshold eccentricity in degrees from the centre.
    pub normalized_angle: f64,
}

impl SheetEntry {
    fn seeded(angle: f64) -> Self {
        Self {
            points: Vec::new(),
            normalized_angle: angle,
        }
    }
}

type EyeSheet = BTreeMap<u16, BTreeMap<SizeClass, BTreeMap<LuminanceLabel, SheetEntry>>>;

/// One exported line of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetRow<'a> {
    pub longitude: u16,
    pub size: SizeClass,
    pub luminance: LuminanceLabel,
    pub points: &'a [PolarPoint],
    pub threshold: f64,
}

/// Per-eye results keyed by longitude, size class and luminance.
#[derive(Debug, Clone, Default)]
pub struct ResultsSheet {
    right: EyeSheet,
    left: EyeSheet,
}

impl ResultsSheet {
    pub fn new() -> Self {
        Self::default()
    }

    fn eye(&self, eye: Eye) -> &EyeSheet {
        match eye {
            Eye::Right => &self.right,
            Eye::Left => &self.left,
        }
    }

    fn eye_mut(&mut self, eye: Eye) -> &mut EyeSheet {
        match eye {
            Eye::Right => &mut self.right,
            Eye::Left => &mut self.left,
        }
    }

    /// Registers an empty entry for every (size, luminance, meridian) that
    /// will be tested, seeded with the eye's normative angle. Calling it again
    /// for the same eye overwrites the entries.
    pub fn setup(
        &mut self,
        vectors: &[TestVector],
        luminances: &BTreeMap<SizeClass, Vec<LuminanceLabel>>,
        eye: Eye,
    ) {
        let sheet = self.eye_mut(eye);
        for size in SizeClass::DESCENDING {
            let Some(labels) = luminances.get(&size) else {
                continue;
            };
            for &luminance in labels {
                for vector in vectors {
                    sheet
                        .entry(vector.longitude_deg)
                        .or_default()
                        .entry(size)
                        .or_default()
                        .insert(luminance, SheetEntry::seeded(vector.normative(eye)));
                }
            }
        }
    }

    pub fn entry(
        &self,
        eye: Eye,
        longitude: u16,
        size: SizeClass,
        luminance: LuminanceLabel,
    ) -> Option<&SheetEntry> {
        self.eye(eye)
            .get(&longitude)
            .and_then(|sizes| sizes.get(&size))
            .and_then(|labels| labels.get(&luminance))
    }

    fn entry_mut(
        &mut self,
        eye: Eye,
        longitude: u16,
        size: SizeClass,
        luminance: LuminanceLabel,
    ) -> Result<&mut SheetEntry> {
        self.eye_mut(eye)
            .get_mut(&longitude)
            .and_then(|sizes| sizes.get_mut(&size))
            .and_then(|labels| labels.get_mut(&luminance))
            .ok_or_else(|| {
                error!(%eye, longitude, %size, %luminance, "sheet entry was never set up");
                PerimetryError::UnregisteredEntry {
                    eye,
                    longitude,
                    size,
                    luminance,
                }
            })
    }

    pub fn threshold(
        &self,
        eye: Eye,
        longitude: u16,
        size: SizeClass,
        luminance: LuminanceLabel,
    ) -> Option<f64> {
        self.entry(eye, longitude, size, luminance)
            .map(|e| e.normalized_angle)
    }

    pub fn add_point(
        &mut self,
        point: PolarPoint,
        size: SizeClass,
        longitude: u16,
        eye: Eye,
        luminance: LuminanceLabel,
    ) -> Result<()> {
        self.entry_mut(eye, longitude, size, luminance)?
            .points
            .push(point);
        Ok(())
    }

    pub fn set_threshold(
        &mut self,
        eye: Eye,
        longitude: u16,
        size: SizeClass,
        luminance: LuminanceLabel,
        angle: f64,
    ) -> Result<()> {
        self.entry_mut(eye, longitude, size, luminance)?
            .normalized_angle = angle;
        Ok(())
    }

    /// Entries in ascending (longitude, size, luminance) order.
    pub fn export(&self, eye: Eye) -> impl Iterator<Item = SheetRow<'_>> + '_ {
        self.eye(eye).iter().flat_map(|(&longitude, sizes)| {
            sizes.iter().flat_map(move |(&size, labels)| {
                labels.iter().map(move |(&luminance, entry)| SheetRow {
                    longitude,
                    size,
                    luminance,
                    points: &entry.points,
                    threshold: entry.normalized_angle,
                })
            })
        })
    }

    pub fn point_count(&self, eye: Eye) -> usize {
        self.export(eye).map(|row| row.points.len()).sum()
    }

    pub fn is_empty(&self, eye: Eye) -> bool {
        self.eye(eye).is_empty()
    }
}
