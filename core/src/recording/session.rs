use crate::prelude::{RecorderError, RecorderResult};
use crate::recording::sink::{open_sink, AviSummary, VideoFormat, VideoSink, WriteOutcome};
use crate::storage::MediaLayout;
use image::RgbImage;

/// Outcome of closing a session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub label: String,
    pub raw: Option<AviSummary>,
    pub tracked: Option<AviSummary>,
    pub duration_secs: f64,
}

/// Raw and track-annotated videos written side by side.
pub struct RecordingSession {
    label: String,
    raw: Box<dyn VideoSink>,
    tracked: Box<dyn VideoSink>,
    started_at: f64,
    last_motion_at: f64,
}

impl RecordingSession {
    pub fn open(
        layout: &MediaLayout,
        label: &str,
        format: VideoFormat,
        now: f64,
    ) -> RecorderResult<Self> {
        let raw_path = MediaLayout::unique_path(&layout.videos(), label, "avi");
        let raw = open_sink(&raw_path, format)?;

        let tracked_path = MediaLayout::unique_path(&layout.videos_tracked(), label, "avi");
        let tracked = match open_sink(&tracked_path, format) {
            Ok(writer) => writer,
            Err(err) => {
                raw.discard();
                return Err(err);
            }
        };

        Ok(Self {
            label: label.to_string(),
            raw,
            tracked,
            started_at: now,
            last_motion_at: now,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn frames(&self) -> u32 {
        self.raw.frames()
    }

    pub fn note_motion(&mut self, now: f64) {
        self.last_motion_at = now;
    }

    /// Seconds since the last cycle with an active track.
    pub fn quiet_for(&self, now: f64) -> f64 {
        now - self.last_motion_at
    }

    /// Appends one frame to both videos.
    ///
    /// `Full` means one of the videos hit its size limit and the session should close.
    pub fn append(&mut self, raw: &RgbImage, tracked: &RgbImage) -> RecorderResult<WriteOutcome> {
        if self.raw.write_frame(raw)? == WriteOutcome::Full {
            return Ok(WriteOutcome::Full);
        }
        self.tracked.write_frame(tracked)
    }

    /// Finalizes both containers; the second is finalized even if the first fails.
    pub fn finish(self, now: f64) -> (SessionSummary, Option<RecorderError>) {
        let RecordingSession {
            label,
            raw,
            tracked,
            started_at,
            ..
        } = self;

        let raw = raw.finish();
        let tracked = tracked.finish();
        let mut error = None;
        let mut keep = |result: RecorderResult<Option<AviSummary>>| match result {
            Ok(summary) => summary,
            Err(err) => {
                error.get_or_insert(err);
                None
            }
        };
        let raw = keep(raw);
        let tracked = keep(tracked);

        (
            SessionSummary {
                label,
                raw,
                tracked,
                duration_secs: (now - started_at).max(0.0),
            },
            error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::sink::MAX_CONTAINER_BYTES;

    fn format() -> VideoFormat {
        VideoFormat {
            width: 16,
            height: 12,
            fps: 10,
            quality: 80,
            max_bytes: MAX_CONTAINER_BYTES,
        }
    }

    #[test]
    fn session_writes_matching_raw_and_tracked_videos() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MediaLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        let mut session =
            RecordingSession::open(&layout, "20240101_000000", format(), 3.0).unwrap();
        let frame = RgbImage::new(16, 12);
        for _ in 0..4 {
            assert_eq!(session.append(&frame, &frame).unwrap(), WriteOutcome::Written);
        }
        session.note_motion(3.5);
        assert_eq!(session.quiet_for(4.0), 0.5);

        let (summary, error) = session.finish(5.0);
        assert!(error.is_none());
        assert_eq!(summary.raw.unwrap().frames, 4);
        assert_eq!(summary.tracked.unwrap().frames, 4);
        assert_eq!(summary.duration_secs, 2.0);
        let name = "20240101_000000.avi";
        assert!(layout.videos().join(name).is_file());
        assert!(layout.videos_tracked().join(name).is_file());
    }

    #[test]
    fn failed_open_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MediaLayout::new(dir.path());
        std::fs::create_dir_all(layout.videos()).unwrap();

        assert!(RecordingSession::open(&layout, "x", format(), 0.0).is_err());
        assert_eq!(std::fs::read_dir(layout.videos()).unwrap().count(), 0);
    }
}
