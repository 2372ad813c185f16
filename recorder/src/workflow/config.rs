use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thermcore::control::SignalConfig;
use thermcore::processing::{BackgroundConfig, DetectorConfig, SmoothingConfig, TrackerConfig};
use thermcore::recording::RecordingConfig;
use thermcore::source::{DeviceConfig, SyntheticConfig};
use thermcore::storage::MediaConfig;
use thermcore::PipelineConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Device,
    Synthetic,
}

/// Full recorder configuration as read from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub source: SourceKind,
    pub device: DeviceConfig,
    pub synthetic: SyntheticConfig,
    pub media: MediaConfig,
    pub signals: SignalConfig,
    pub background: BackgroundConfig,
    pub detection: DetectorConfig,
    pub tracking: TrackerConfig,
    pub smoothing: SmoothingConfig,
    pub recording: RecordingConfig,
    /// Sleep out the remainder of each frame period.
    pub pacing: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            device: DeviceConfig::default(),
            synthetic: SyntheticConfig::default(),
            media: MediaConfig::default(),
            signals: SignalConfig::default(),
            background: BackgroundConfig::default(),
            detection: DetectorConfig::default(),
            tracking: TrackerConfig::default(),
            smoothing: SmoothingConfig::default(),
            recording: RecordingConfig::default(),
            pacing: true,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub media_root: Option<PathBuf>,
    pub device: Option<PathBuf>,
    pub synthetic: bool,
    pub fast: bool,
}

impl RecorderConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading recorder config {}", path_ref.display()))?;
        let config: RecorderConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing recorder config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(root) = &overrides.media_root {
            self.media.root = root.clone();
        }
        if let Some(device) = &overrides.device {
            self.device.path = device.clone();
            self.source = SourceKind::Device;
        }
        if overrides.synthetic {
            self.source = SourceKind::Synthetic;
        }
        if overrides.fast {
            self.pacing = false;
        }
        self
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            background: self.background.clone(),
            detection: self.detection.clone(),
            tracking: self.tracking.clone(),
            smoothing: self.smoothing.clone(),
            recording: self.recording.clone(),
        }
    }
}
