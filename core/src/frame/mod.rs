pub mod candidate;
pub mod thermal;

pub use candidate::{BoundingBox, HotObjectCandidate};
pub use thermal::{ThermalFrame, VisualFrame};
