//! Video container backends.
//!
//! Every backend streams into `<name>.part` and renames the file to its final
//! name only once the container is complete. The default backend writes
//! Motion-JPEG AVI through the `riff` chunk writer; building with the `ffmpeg`
//! feature switches to libavformat/libavcodec.

use crate::prelude::RecorderResult;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Containers are closed before crossing the AVI 1.0 size limit.
pub const MAX_CONTAINER_BYTES: u64 = 1 << 30;

/// Geometry and encoding shared by both containers of a session.
#[derive(Debug, Clone, Copy)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub quality: u8,
    pub max_bytes: u64,
}

/// Summary of a finished container.
#[derive(Debug, Clone, PartialEq)]
pub struct AviSummary {
    pub path: PathBuf,
    pub frames: u32,
    pub bytes: u64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The frame would push the container past its size limit and was not written.
    Full,
}

pub trait VideoSink {
    fn write_frame(&mut self, image: &RgbImage) -> RecorderResult<WriteOutcome>;

    fn frames(&self) -> u32;

    /// Completes the container and moves it into place.
    ///
    /// A container without frames is removed and yields `None`.
    fn finish(self: Box<Self>) -> RecorderResult<Option<AviSummary>>;

    fn discard(self: Box<Self>);
}

pub(crate) fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

#[cfg(not(feature = "ffmpeg"))]
pub fn open_sink(path: &Path, format: VideoFormat) -> RecorderResult<Box<dyn VideoSink>> {
    let writer = crate::recording::avi::AviWriter::create(path, format)?;
    Ok(Box::new(writer))
}

#[cfg(feature = "ffmpeg")]
pub fn open_sink(path: &Path, format: VideoFormat) -> RecorderResult<Box<dyn VideoSink>> {
    let writer = crate::recording::ffmpeg::FfmpegWriter::create(path, format)?;
    Ok(Box::new(writer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/media/videos/20240101_000000.avi")),
            PathBuf::from("/media/videos/20240101_000000.avi.part")
        );
    }

    #[test]
    fn opened_sink_streams_into_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let format = VideoFormat {
            width: 8,
            height: 8,
            fps: 10,
            quality: 80,
            max_bytes: MAX_CONTAINER_BYTES,
        };
        let mut sink = open_sink(&path, format).unwrap();
        assert_eq!(sink.write_frame(&RgbImage::new(8, 8)).unwrap(), WriteOutcome::Written);
        assert!(part_path(&path).exists());
        assert!(!path.exists());

        let summary = sink.finish().unwrap().unwrap();
        assert_eq!(summary.frames, 1);
        assert!(path.is_file());
        assert!(!part_path(&path).exists());
    }
}
