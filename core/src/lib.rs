//! Core of the thermal wildlife recorder.
//!
//! Frames from a [`source::FrameSource`] flow through background subtraction,
//! hot-object detection and tracking; an arm-gated state machine turns the
//! resulting activity into video sessions and snapshots, and the current state
//! is published for an external control panel.

pub mod control;
pub mod frame;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod publish;
pub mod recording;
pub mod source;
pub mod storage;
pub mod telemetry;

pub use pipeline::{CycleReport, PipelineConfig, Recorder};
pub use prelude::{ArmState, ExternalSignals, RecorderError, RecorderResult};
