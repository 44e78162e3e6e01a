pub mod config;
pub mod error;
pub mod export;
pub mod fixation;
pub mod geometry;
pub mod session;
pub mod sheet;
pub mod state;
pub mod trial;

pub use config::PerimetryConfig;
pub use error::{PerimetryError, Result};
pub use fixation::{FixationMonitor, FixationState};
pub use geometry::{rotation_between, SphereProjection};
pub use session::{PerimetrySession, SessionUpdate};
pub use sheet::{ResultsSheet, SheetEntry, SheetRow, UNDETECTED_ANGLE};
pub use state::{RenderParams, StimulusFrame, StimulusScheduler};
pub use trial::{build_sequence, SequenceEntry, TestVector};
