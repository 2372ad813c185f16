pub mod annotate;
pub mod avi;
pub mod controller;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod session;
pub mod sink;

pub use controller::{ControllerReport, RecorderState, RecordingConfig, RecordingController};
pub use session::{RecordingSession, SessionSummary};
pub use sink::{open_sink, AviSummary, VideoFormat, VideoSink, WriteOutcome, MAX_CONTAINER_BYTES};
