use crate::frame::{ThermalFrame, VisualFrame};
use crate::prelude::{RecorderError, RecorderResult};
use crate::source::FrameSource;
use crate::telemetry::log::LogManager;
use chrono::Local;
use image::GrayImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::time::Instant;

/// Location and geometry of the stacked visual/thermal stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/video0"),
            width: 256,
            height: 192,
        }
    }
}

impl DeviceConfig {
    /// Two bytes per pixel for each of the stacked halves.
    pub fn frame_bytes(&self) -> usize {
        self.width * self.height * 4
    }
}

/// Splits one stacked frame: YUYV visual on top, little-endian thermal below.
///
/// Drivers that deliver the frame as a single packed row split into visual and
/// thermal halves produce the same byte sequence, so both layouts decode here.
pub fn decode_stacked(
    buffer: &[u8],
    width: usize,
    height: usize,
) -> RecorderResult<(Array2<u16>, GrayImage)> {
    let half = width * height * 2;
    if width == 0 || height == 0 || buffer.len() < half * 2 {
        return Err(RecorderError::Device(format!(
            "malformed frame: {} bytes for {}x{}",
            buffer.len(),
            width,
            height
        )));
    }

    let (top, bottom) = buffer.split_at(half);
    let luma: Vec<u8> = top.chunks_exact(2).map(|pair| pair[0]).collect();
    let visual = GrayImage::from_raw(width as u32, height as u32, luma)
        .ok_or_else(|| RecorderError::Device("visual plane size mismatch".into()))?;

    let thermal: Vec<u16> = bottom[..half]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let thermal = Array2::from_shape_vec((height, width), thermal)
        .map_err(|err| RecorderError::device("thermal plane", err))?;

    Ok((thermal, visual))
}

/// Reads raw stacked frames from a capture device node or pipe.
pub struct DeviceSource {
    config: DeviceConfig,
    reader: Option<BufReader<File>>,
    buffer: Vec<u8>,
    started: Instant,
    logger: LogManager,
}

impl DeviceSource {
    pub fn new(config: DeviceConfig) -> Self {
        let buffer = vec![0; config.frame_bytes()];
        Self {
            config,
            reader: None,
            buffer,
            started: Instant::now(),
            logger: LogManager::new("device"),
        }
    }
}

impl FrameSource for DeviceSource {
    fn open(&mut self) -> RecorderResult<()> {
        let file = File::open(&self.config.path).map_err(|err| {
            RecorderError::device(format!("opening {}", self.config.path.display()), err)
        })?;
        self.reader = Some(BufReader::with_capacity(self.config.frame_bytes(), file));
        self.logger.record(&format!(
            "opened {} ({}x{})",
            self.config.path.display(),
            self.config.width,
            self.config.height
        ));
        Ok(())
    }

    fn acquire(&mut self) -> RecorderResult<(ThermalFrame, VisualFrame)> {
        if self.reader.is_none() {
            self.open()?;
        }
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| RecorderError::Device("device not open".into()))?;

        if let Err(err) = reader.read_exact(&mut self.buffer) {
            self.reader = None;
            return Err(RecorderError::device("reading frame", err));
        }

        let (thermal, visual) =
            decode_stacked(&self.buffer, self.config.width, self.config.height)?;
        let timestamp = self.started.elapsed().as_secs_f64();
        let captured_at = Local::now();
        Ok((
            ThermalFrame::new(thermal, timestamp, captured_at),
            VisualFrame::new(visual, timestamp, captured_at),
        ))
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn describe(&self) -> String {
        format!("device {}", self.config.path.display())
    }
}
