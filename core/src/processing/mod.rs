pub mod background;
pub mod detection;
pub mod idle;
pub mod smoothing;
pub mod tracking;

pub use background::{BackgroundConfig, BackgroundModel};
pub use detection::{Detector, DetectorConfig};
pub use idle::IdleResetPolicy;
pub use smoothing::{SmoothingConfig, VisualSmoother};
pub use tracking::{TrackSnapshot, TrackUpdate, Tracker, TrackerConfig};
