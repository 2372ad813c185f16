pub mod device;
pub mod synthetic;

pub use device::{DeviceConfig, DeviceSource};
pub use synthetic::{SyntheticBlob, SyntheticConfig, SyntheticSource};

use crate::frame::{ThermalFrame, VisualFrame};
use crate::prelude::RecorderResult;

/// Capability of producing paired thermal and visual frames.
pub trait FrameSource {
    fn open(&mut self) -> RecorderResult<()>;
    /// Blocks until the next frame pair is available.
    fn acquire(&mut self) -> RecorderResult<(ThermalFrame, VisualFrame)>;
    fn close(&mut self);
    fn describe(&self) -> String;
}
