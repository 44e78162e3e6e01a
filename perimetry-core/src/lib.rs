pub mod luminance;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use luminance::{LuminanceError, LuminanceLabel, display_color, stimulus_intensity_nits};
pub use phase::{Eye, SessionPhase};
pub use stimulus::{SizeCatalog, SizeClass};
pub use trial::{PerimetryStatus, PolarPoint};
