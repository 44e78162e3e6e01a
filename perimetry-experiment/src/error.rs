use perimetry_core::{Eye, LuminanceError, LuminanceLabel, SizeClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerimetryError {
    #[error("invalid perimetry configuration: {0}")]
    InvalidConfiguration(String),
    #[error(
        "no sheet entry for {eye} eye, longitude {longitude}, {size}, luminance {luminance}"
    )]
    UnregisteredEntry {
        eye: Eye,
        longitude: u16,
        size: SizeClass,
        luminance: LuminanceLabel,
    },
    #[error("export path is empty")]
    MissingExportPath,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error(transparent)]
    Luminance(#[from] LuminanceError),
}

pub type Result<T> = std::result::Result<T, PerimetryError>;
