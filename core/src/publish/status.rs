use crate::frame::VisualFrame;
use crate::prelude::{RecorderError, RecorderResult};
use crate::storage::{atomic_write, encode_jpeg, MediaLayout};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// State exposed to the control panel through `status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub recording: bool,
    pub events: u64,
    /// Unix time of the write, in seconds.
    pub ts: f64,
}

impl StatusRecord {
    pub fn now(recording: bool, events: u64) -> Self {
        let now = Utc::now();
        Self {
            recording,
            events,
            ts: now.timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Replaces the status and live-frame files once per cycle.
pub struct StatusPublisher {
    status_path: PathBuf,
    live_path: PathBuf,
    quality: u8,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl StatusPublisher {
    pub fn new(layout: &MediaLayout, quality: u8, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            status_path: layout.status(),
            live_path: layout.live_frame(),
            quality,
            logger: LogManager::new("publish"),
            metrics,
        }
    }

    pub fn write_status(&self, record: &StatusRecord) -> RecorderResult<()> {
        let json = serde_json::to_vec(record)
            .map_err(|err| RecorderError::InvalidInput(format!("serializing status: {}", err)))?;
        atomic_write(&self.status_path, &json)
    }

    pub fn write_live(&self, frame: &VisualFrame) -> RecorderResult<()> {
        let jpeg = encode_jpeg(frame.image(), self.quality)?;
        atomic_write(&self.live_path, &jpeg)
    }

    /// Publishes both artifacts; failures are logged and the cycle carries on.
    pub fn publish(&self, record: &StatusRecord, frame: Option<&VisualFrame>) {
        let timestamp = frame.map(VisualFrame::timestamp).unwrap_or_default();
        if let Err(err) = self.write_status(record) {
            self.logger.recovered("writing status", timestamp, &err);
            self.metrics.record_storage_error();
        }
        if let Some(frame) = frame {
            if let Err(err) = self.write_live(frame) {
                self.logger.recovered("writing live frame", timestamp, &err);
                self.metrics.record_storage_error();
            }
        }
    }
}
