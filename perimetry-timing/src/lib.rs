pub mod timer;

pub use timer::{seconds_between, FrameStats, FrameSummary, HighPrecisionTimer, ManualTimer, Timer};
