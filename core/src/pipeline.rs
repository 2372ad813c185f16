//! Per-cycle orchestration of the detection and recording stages.
//!
//! One call to [`Recorder::cycle`] takes an acquired frame pair and the
//! signals sampled for that cycle through background maintenance, detection,
//! tracking, the recording state machine and status publication.

use crate::frame::{ThermalFrame, VisualFrame};
use crate::prelude::{ArmState, ExternalSignals};
use crate::processing::{
    BackgroundConfig, BackgroundModel, Detector, DetectorConfig, IdleResetPolicy, SmoothingConfig,
    TrackSnapshot, Tracker, TrackerConfig, VisualSmoother,
};
use crate::publish::{StatusPublisher, StatusRecord};
use crate::recording::{
    ControllerReport, RecorderState, RecordingConfig, RecordingController, SessionSummary,
};
use crate::storage::MediaLayout;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Processing and recording parameters for one recorder instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub background: BackgroundConfig,
    pub detection: DetectorConfig,
    pub tracking: TrackerConfig,
    pub smoothing: SmoothingConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    Manual,
    Idle,
}

/// What happened during one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub timestamp: f64,
    pub active: Vec<TrackSnapshot>,
    pub spawned: Vec<u64>,
    pub events: u64,
    pub reset: Option<ResetCause>,
    pub state: RecorderState,
    pub recording: ControllerReport,
    /// Console status line, present when the visible ids or recording changed.
    pub status_line: Option<String>,
}

/// Emits a status line whenever the visible id set or the recording changes.
#[derive(Debug, Default)]
struct StatusConsole {
    last_ids: Vec<u64>,
    last_label: Option<String>,
}

impl StatusConsole {
    fn observe(&mut self, active: &[TrackSnapshot], label: Option<&str>) -> Option<String> {
        let mut ids: Vec<u64> = active.iter().map(|track| track.id).collect();
        ids.sort_unstable();
        if ids == self.last_ids && label == self.last_label.as_deref() {
            return None;
        }

        let shown = if ids.is_empty() {
            "none".to_string()
        } else {
            ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
        };
        let rec = match label {
            Some(label) => format!("ON@{}", label),
            None => "OFF".to_string(),
        };
        let line = format!("OBJ:{} | IDs:{} | REC:{}", ids.len(), shown, rec);
        self.last_ids = ids;
        self.last_label = label.map(str::to_string);
        Some(line)
    }
}

pub struct Recorder {
    background: BackgroundModel,
    idle: IdleResetPolicy,
    detector: Detector,
    tracker: Tracker,
    smoother: VisualSmoother,
    controller: RecordingController,
    publisher: StatusPublisher,
    console: StatusConsole,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl Recorder {
    pub fn new(
        config: &PipelineConfig,
        layout: &MediaLayout,
        jpeg_quality: u8,
        initial_arm: ArmState,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            background: BackgroundModel::new(&config.background, config.detection.threshold),
            idle: IdleResetPolicy::new(config.background.idle_reset_secs),
            detector: Detector::new(config.detection.clone()),
            tracker: Tracker::new(config.tracking.clone()),
            smoother: VisualSmoother::new(&config.smoothing),
            controller: RecordingController::new(
                config.recording.clone(),
                layout.clone(),
                jpeg_quality,
                initial_arm,
                metrics.clone(),
            ),
            publisher: StatusPublisher::new(layout, jpeg_quality, metrics.clone()),
            console: StatusConsole::default(),
            logger: LogManager::new("pipeline"),
            metrics,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.controller.state()
    }

    pub fn events(&self) -> u64 {
        self.tracker.events()
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn cycle(
        &mut self,
        thermal: &ThermalFrame,
        visual: &VisualFrame,
        signals: ExternalSignals,
    ) -> CycleReport {
        let now = thermal.timestamp();
        let mut reset = None;

        if !self.background.is_initialized() {
            self.background.initialize(thermal);
        } else if signals.reset_requested {
            self.background.reset(thermal);
            self.idle.note_manual_reset();
            self.metrics.record_background_reset();
            reset = Some(ResetCause::Manual);
        }

        let delta = match self.background.subtract(thermal) {
            Ok(delta) => delta,
            Err(err) => {
                self.logger.recovered("background subtraction", now, &err);
                self.background.initialize(thermal);
                Array2::zeros(thermal.raw().dim())
            }
        };

        let candidates = self.detector.detect(&delta);
        let update = self.tracker.update(&candidates);

        if self.idle.observe(update.active.len(), now) {
            self.background.reset(thermal);
            self.metrics.record_background_reset();
            reset = Some(ResetCause::Idle);
        }

        let smoothed = self.smoother.apply(visual);
        let visual = smoothed.as_ref().unwrap_or(visual);
        let recording = self.controller.step(signals.arm, &update.active, visual);

        let status_line = self
            .console
            .observe(&update.active, self.controller.session_label());
        if let Some(line) = &status_line {
            self.logger.record(&format!("[STATUS] {}", line));
        }

        let status = StatusRecord::now(self.controller.is_recording(), update.events);
        self.publisher.publish(&status, Some(visual));
        self.metrics.record_cycle();

        CycleReport {
            timestamp: now,
            active: update.active,
            spawned: update.spawned,
            events: update.events,
            reset,
            state: self.controller.state(),
            recording,
            status_line,
        }
    }

    /// Finalizes any open session and publishes a final idle status.
    pub fn shutdown(&mut self, now: f64) -> Option<SessionSummary> {
        let summary = self.controller.shutdown(now);
        self.publisher
            .publish(&StatusRecord::now(false, self.tracker.events()), None);
        self.logger.record(&format!(
            "shutdown at t={:.2}s, {} event(s)",
            now,
            self.tracker.events()
        ));
        summary
    }
}
