use crate::prelude::{ArmState, ExternalSignals, RecorderError, RecorderResult};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Locations of the control-panel artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub arm_path: PathBuf,
    pub reset_path: PathBuf,
    /// Arm state assumed while the arm artifact is absent.
    pub default_armed: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            arm_path: PathBuf::from("/tmp/trailcam_armed"),
            reset_path: PathBuf::from("/tmp/trailcam_reset_bg"),
            default_armed: true,
        }
    }
}

/// Interprets the arm artifact's content.
pub fn parse_arm(content: &str) -> RecorderResult<ArmState> {
    match content.trim().to_ascii_lowercase().as_str() {
        "1" | "armed" | "on" | "true" => Ok(ArmState::Armed),
        "0" | "disarmed" | "off" | "false" => Ok(ArmState::Disarmed),
        other => Err(RecorderError::Signal(format!("unrecognized arm value {:?}", other))),
    }
}

/// Polls the arm and reset artifacts once per cycle.
pub struct SignalReader {
    config: SignalConfig,
    arm: ArmState,
    stuck_reset: Option<SystemTime>,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl SignalReader {
    pub fn new(config: SignalConfig, metrics: Arc<MetricsRecorder>) -> Self {
        let arm = Self::default_arm(&config);
        let mut reader = Self {
            config,
            arm,
            stuck_reset: None,
            logger: LogManager::new("signals"),
            metrics,
        };
        reader.arm = reader.read_arm();
        reader
    }

    fn default_arm(config: &SignalConfig) -> ArmState {
        if config.default_armed {
            ArmState::Armed
        } else {
            ArmState::Disarmed
        }
    }

    /// Arm state observed at construction or by the latest poll.
    pub fn arm(&self) -> ArmState {
        self.arm
    }

    pub fn poll(&mut self) -> ExternalSignals {
        let arm = self.read_arm();
        if arm != self.arm {
            self.logger.record(&format!("arm signal changed to {:?}", arm));
        }
        self.arm = arm;
        ExternalSignals {
            arm,
            reset_requested: self.take_reset(),
        }
    }

    fn read_arm(&self) -> ArmState {
        match self.load_arm() {
            Ok(arm) => arm,
            Err(err) => {
                self.logger.recovered("reading arm signal", 0.0, &err);
                self.metrics.record_signal_error();
                self.arm
            }
        }
    }

    fn load_arm(&self) -> RecorderResult<ArmState> {
        match fs::read_to_string(&self.config.arm_path) {
            Ok(content) => parse_arm(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default_arm(&self.config)),
            Err(err) => Err(RecorderError::Signal(format!(
                "reading {}: {}",
                self.config.arm_path.display(),
                err
            ))),
        }
    }

    /// Consumes a pending reset request, returning whether one was present.
    fn take_reset(&mut self) -> bool {
        let path = &self.config.reset_path;
        let modified = match fs::metadata(path) {
            Ok(meta) => meta.modified().ok(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.stuck_reset = None;
                return false;
            }
            Err(err) => {
                let err = RecorderError::Signal(format!("inspecting {}: {}", path.display(), err));
                self.logger.recovered("reading reset signal", 0.0, &err);
                self.metrics.record_signal_error();
                return false;
            }
        };

        if modified.is_some() && modified == self.stuck_reset {
            return false;
        }

        match fs::remove_file(path) {
            Ok(()) => self.stuck_reset = None,
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                self.logger.detail(&format!(
                    "could not consume {}: {}; remembering its mtime",
                    path.display(),
                    err
                ));
                self.stuck_reset = modified;
            }
        }
        self.logger.record("manual background reset requested");
        true
    }
}
