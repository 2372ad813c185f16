use crate::frame::VisualFrame;
use crate::prelude::{ArmState, RecorderError};
use crate::processing::TrackSnapshot;
use crate::recording::annotate::{render_plain, render_tracked};
use crate::recording::session::{RecordingSession, SessionSummary};
use crate::recording::sink::{VideoFormat, WriteOutcome, MAX_CONTAINER_BYTES};
use crate::storage::{atomic_write, encode_jpeg, MediaLayout};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Timing and output parameters for recording and photo capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub fps: u32,
    pub video_scale: u32,
    pub pre_roll_secs: f64,
    pub post_roll_secs: f64,
    pub photo_interval_secs: f64,
    /// Lets an elapsed photo timer open a video session on its own.
    pub photo_triggers_recording: bool,
    /// Size at which a container is closed and the next trigger opens a new one.
    pub max_video_bytes: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            video_scale: 3,
            pre_roll_secs: 10.0,
            post_roll_secs: 10.0,
            photo_interval_secs: 20.0,
            photo_triggers_recording: true,
            max_video_bytes: MAX_CONTAINER_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Disarmed,
    ArmedIdle,
    ArmedRecording,
}

/// Side effects produced by one controller step.
#[derive(Debug, Default)]
pub struct ControllerReport {
    pub opened: Option<String>,
    pub closed: Option<SessionSummary>,
    pub photo: Option<PathBuf>,
    pub failures: Vec<RecorderError>,
}

fn format_hhmmss(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Arm-gated state machine owning the video session and photo timer.
pub struct RecordingController {
    config: RecordingConfig,
    layout: MediaLayout,
    quality: u8,
    state: RecorderState,
    session: Option<RecordingSession>,
    prebuffer: VecDeque<GrayImage>,
    prebuffer_capacity: usize,
    last_photo_at: Option<f64>,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl RecordingController {
    pub fn new(
        config: RecordingConfig,
        layout: MediaLayout,
        quality: u8,
        initial: ArmState,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let prebuffer_capacity =
            (config.pre_roll_secs.max(0.0) * f64::from(config.fps)).ceil() as usize;
        let state = if initial.is_armed() {
            RecorderState::ArmedIdle
        } else {
            RecorderState::Disarmed
        };
        Self {
            config,
            layout,
            quality,
            state,
            session: None,
            prebuffer: VecDeque::with_capacity(prebuffer_capacity),
            prebuffer_capacity,
            last_photo_at: None,
            logger: LogManager::new("recording"),
            metrics,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::ArmedRecording
    }

    pub fn buffered_frames(&self) -> usize {
        self.prebuffer.len()
    }

    /// Label of the open session, if any.
    pub fn session_label(&self) -> Option<&str> {
        self.session.as_ref().map(RecordingSession::label)
    }

    /// Advances the state machine by one cycle.
    pub fn step(
        &mut self,
        arm: ArmState,
        tracks: &[TrackSnapshot],
        frame: &VisualFrame,
    ) -> ControllerReport {
        let now = frame.timestamp();
        let mut report = ControllerReport::default();

        match (arm, self.state) {
            (ArmState::Disarmed, RecorderState::Disarmed) => return report,
            (ArmState::Disarmed, _) => {
                self.disarm(now, &mut report);
                return report;
            }
            (ArmState::Armed, RecorderState::Disarmed) => {
                self.state = RecorderState::ArmedIdle;
                self.last_photo_at = Some(now);
                self.logger.record(&format!("armed at t={:.2}s", now));
            }
            _ => {}
        }

        let motion = !tracks.is_empty();
        let last_photo = *self.last_photo_at.get_or_insert(now);
        let photo_due = now - last_photo >= self.config.photo_interval_secs;

        if self.state == RecorderState::ArmedIdle
            && (motion || (photo_due && self.config.photo_triggers_recording))
        {
            self.open_session(frame, now, &mut report);
        }

        let mut appended = false;
        if self.state == RecorderState::ArmedRecording {
            appended = self.record(frame, tracks, motion, now, &mut report);
        }

        if report.photo.is_none() && self.photo_due(now) {
            self.take_photo(frame, now, &mut report);
        }

        // A frame already in a closed video must not come back as pre-roll.
        if !appended && self.state != RecorderState::ArmedRecording {
            self.buffer_frame(frame);
        }

        report
    }

    /// Closes any open session; called once before the process exits.
    pub fn shutdown(&mut self, now: f64) -> Option<SessionSummary> {
        let mut report = ControllerReport::default();
        self.close_session(now, "shutdown", &mut report);
        if self.state == RecorderState::ArmedRecording {
            self.state = RecorderState::ArmedIdle;
        }
        report.closed
    }

    fn photo_due(&self, now: f64) -> bool {
        self.last_photo_at
            .map(|last| now - last >= self.config.photo_interval_secs)
            .unwrap_or(false)
    }

    fn disarm(&mut self, now: f64, report: &mut ControllerReport) {
        self.close_session(now, "disarm", report);
        self.prebuffer.clear();
        self.state = RecorderState::Disarmed;
        self.logger.record(&format!("disarmed at t={:.2}s", now));
    }

    fn video_format(&self, frame: &VisualFrame) -> VideoFormat {
        let scale = self.config.video_scale.max(1);
        let (width, height) = frame.image().dimensions();
        VideoFormat {
            width: width * scale,
            height: height * scale,
            fps: self.config.fps.max(1),
            quality: self.quality,
            max_bytes: self.config.max_video_bytes,
        }
    }

    fn open_session(&mut self, frame: &VisualFrame, now: f64, report: &mut ControllerReport) {
        let label = frame.label();
        let format = self.video_format(frame);
        let mut session = match RecordingSession::open(&self.layout, &label, format, now) {
            Ok(session) => session,
            Err(err) => {
                self.logger.recovered("opening session", now, &err);
                self.metrics.record_storage_error();
                report.failures.push(err);
                return;
            }
        };

        let scale = self.config.video_scale;
        for buffered in self.prebuffer.drain(..) {
            let plain = render_plain(&buffered, scale);
            match session.append(&plain, &plain) {
                Ok(WriteOutcome::Written) => {}
                Ok(WriteOutcome::Full) => break,
                Err(err) => {
                    self.logger.recovered("writing pre-roll", now, &err);
                    self.metrics.record_storage_error();
                    report.failures.push(err);
                    let (_, finish_err) = session.finish(now);
                    report.failures.extend(finish_err);
                    return;
                }
            }
        }

        self.logger.record(&format!(
            "START {} ({} pre-roll frames)",
            label,
            session.frames()
        ));
        self.metrics.record_session();
        self.session = Some(session);
        self.state = RecorderState::ArmedRecording;
        report.opened = Some(label);
        self.take_photo(frame, now, report);
    }

    /// Appends the cycle's frame; returns whether it landed in the video.
    fn record(
        &mut self,
        frame: &VisualFrame,
        tracks: &[TrackSnapshot],
        motion: bool,
        now: f64,
        report: &mut ControllerReport,
    ) -> bool {
        let Some(session) = self.session.as_mut() else {
            self.state = RecorderState::ArmedIdle;
            return false;
        };
        if motion {
            session.note_motion(now);
        }

        let scale = self.config.video_scale;
        let plain = render_plain(frame.image(), scale);
        let annotated = render_tracked(frame.image(), tracks, scale);
        match session.append(&plain, &annotated) {
            Ok(WriteOutcome::Written) => {}
            Ok(WriteOutcome::Full) => {
                self.close_session(now, "size limit", report);
                self.state = RecorderState::ArmedIdle;
                return false;
            }
            Err(err) => {
                self.logger.recovered("appending frame", now, &err);
                self.metrics.record_storage_error();
                report.failures.push(err);
                self.close_session(now, "abandoned", report);
                self.state = RecorderState::ArmedIdle;
                return false;
            }
        }

        if !motion && session.quiet_for(now) > self.config.post_roll_secs {
            self.close_session(now, "post-roll elapsed", report);
            self.state = RecorderState::ArmedIdle;
        }
        true
    }

    fn close_session(&mut self, now: f64, reason: &str, report: &mut ControllerReport) {
        let Some(session) = self.session.take() else {
            return;
        };
        let (summary, error) = session.finish(now);
        if let Some(err) = error {
            self.logger.recovered("finalizing session", now, &err);
            self.metrics.record_storage_error();
            report.failures.push(err);
        }
        self.prebuffer.clear();
        self.logger.record(&format!(
            "STOP {} | LENGTH:{} | {}",
            summary.label,
            format_hhmmss(summary.duration_secs),
            reason
        ));
        report.closed = Some(summary);
    }

    fn take_photo(&mut self, frame: &VisualFrame, now: f64, report: &mut ControllerReport) {
        self.last_photo_at = Some(now);
        let path = MediaLayout::unique_path(&self.layout.photos(), &frame.label(), "jpg");
        let result = encode_jpeg(frame.image(), self.quality)
            .and_then(|bytes| atomic_write(&path, &bytes));
        match result {
            Ok(()) => {
                self.metrics.record_photo();
                self.logger.detail(&format!("photo {}", path.display()));
                report.photo = Some(path);
            }
            Err(err) => {
                self.logger.recovered("writing photo", now, &err);
                self.metrics.record_storage_error();
                report.failures.push(err);
            }
        }
    }

    fn buffer_frame(&mut self, frame: &VisualFrame) {
        if self.prebuffer_capacity == 0 {
            return;
        }
        while self.prebuffer.len() >= self.prebuffer_capacity {
            self.prebuffer.pop_front();
        }
        self.prebuffer.push_back(frame.image().clone());
    }
}
