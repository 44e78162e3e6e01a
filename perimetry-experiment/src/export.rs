//! CSV serialization of one eye's results sheet.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use perimetry_core::Eye;
use tracing::{error, info};

use crate::error::{PerimetryError, Result};
use crate::sheet::ResultsSheet;

pub const HEADER: &str = "Longitude,Size,Luminance,Points[(PHI|THETA)],NormedValue";

/// Writes the header and one row per (longitude, size, luminance) entry.
pub fn write_sheet<W: Write>(sheet: &ResultsSheet, eye: Eye, out: &mut W) -> io::Result<()> {
    writeln!(out, "{HEADER}")?;
    for row in sheet.export(eye) {
        write!(out, "{},{},{},[", row.longitude, row.size, row.luminance)?;
        for point in row.points {
            write!(out, "({:.3}|{:.3});", point.phi, point.theta)?;
        }
        writeln!(out, "],{:.2}", row.threshold)?;
    }
    Ok(())
}

/// `Right_perimetry_2024-05-01_13-45-12.csv`
pub fn export_file_name(eye: Eye, at: &DateTime<Local>) -> String {
    format!(
        "{}perimetry_{}.csv",
        eye.file_prefix(),
        at.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Writes `eye`'s sheet into `dir` under a timestamped name and returns the
/// file path. An empty `dir` is rejected before touching the filesystem.
pub fn write_to_dir(sheet: &ResultsSheet, eye: Eye, dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        error!(%eye, "no export directory configured, skipping export");
        return Err(PerimetryError::MissingExportPath);
    }
    let path = dir.join(export_file_name(eye, &Local::now()));
    write_to_path(sheet, eye, &path)?;
    Ok(path)
}

pub fn write_to_path(sheet: &ResultsSheet, eye: Eye, path: &Path) -> Result<()> {
    let written = File::create(path).and_then(|file| {
        let mut out = BufWriter::new(file);
        write_sheet(sheet, eye, &mut out)?;
        out.flush()
    });
    match written {
        Ok(()) => {
            info!(%eye, path = %path.display(), "results exported");
            Ok(())
        }
        Err(err) => {
            error!(%eye, path = %path.display(), %err, "export failed");
            Err(err.into())
        }
    }
}
