use crate::frame::{ThermalFrame, VisualFrame};
use crate::prelude::{RecorderError, RecorderResult};
use crate::source::FrameSource;
use chrono::{DateTime, Local};
use image::{GrayImage, Luma};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Warm disc that moves linearly between two points during a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticBlob {
    pub start_secs: f64,
    pub end_secs: f64,
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub radius: f32,
    /// Raw units above ambient (64 per °C).
    pub heat_raw: u16,
}

impl SyntheticBlob {
    fn position_at(&self, t: f64) -> Option<(f32, f32)> {
        if t < self.start_secs || t >= self.end_secs {
            return None;
        }
        let span = (self.end_secs - self.start_secs).max(f64::EPSILON);
        let progress = ((t - self.start_secs) / span) as f32;
        Some((
            self.from.0 + (self.to.0 - self.from.0) * progress,
            self.from.1 + (self.to.1 - self.from.1) * progress,
        ))
    }
}

/// Configuration for generating deterministic frame pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub width: usize,
    pub height: usize,
    pub frame_interval_secs: f64,
    pub ambient_raw: u16,
    pub noise_raw: u16,
    pub seed: u64,
    pub blobs: Vec<SyntheticBlob>,
    /// Frame indices that fail with a device error instead of producing a frame.
    pub dropouts: Vec<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 192,
            frame_interval_secs: 0.04,
            ambient_raw: 18_880,
            noise_raw: 6,
            seed: 0,
            blobs: Vec::new(),
            dropouts: Vec::new(),
        }
    }
}

/// Frame provider with reproducible content and timestamps.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    index: u64,
    epoch: DateTime<Local>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            index: 0,
            epoch: Local::now(),
        }
    }

    fn render(&mut self, t: f64) -> (Array2<u16>, GrayImage) {
        let (width, height) = (self.config.width, self.config.height);
        let noise = i32::from(self.config.noise_raw);
        let ambient = i32::from(self.config.ambient_raw);

        let mut thermal = Array2::<u16>::zeros((height, width));
        for value in thermal.iter_mut() {
            let jitter = if noise > 0 {
                self.rng.gen_range(-noise..=noise)
            } else {
                0
            };
            *value = (ambient + jitter).clamp(0, i32::from(u16::MAX)) as u16;
        }

        let mut visual = GrayImage::from_fn(width as u32, height as u32, |x, _| {
            Luma([40 + (x as usize * 60 / width.max(1)) as u8])
        });

        for blob in &self.config.blobs {
            let Some((cx, cy)) = blob.position_at(t) else {
                continue;
            };
            let r2 = blob.radius * blob.radius;
            for ((row, col), value) in thermal.indexed_iter_mut() {
                let dx = col as f32 + 0.5 - cx;
                let dy = row as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    *value = value.saturating_add(blob.heat_raw);
                    visual.put_pixel(col as u32, row as u32, Luma([220]));
                }
            }
        }

        (thermal, visual)
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> RecorderResult<()> {
        Ok(())
    }

    fn acquire(&mut self) -> RecorderResult<(ThermalFrame, VisualFrame)> {
        let index = self.index;
        self.index += 1;
        let t = index as f64 * self.config.frame_interval_secs;

        if self.config.dropouts.contains(&index) {
            return Err(RecorderError::Device(format!(
                "synthetic dropout at frame {}",
                index
            )));
        }

        let (thermal, visual) = self.render(t);
        let captured_at = self.epoch + chrono::Duration::milliseconds((t * 1000.0) as i64);
        Ok((
            ThermalFrame::new(thermal, t, captured_at),
            VisualFrame::new(visual, t, captured_at),
        ))
    }

    fn close(&mut self) {}

    fn describe(&self) -> String {
        format!(
            "synthetic {}x{} @ {:.3}s, {} blob(s)",
            self.config.width,
            self.config.height,
            self.config.frame_interval_secs,
            self.config.blobs.len()
        )
    }
}
