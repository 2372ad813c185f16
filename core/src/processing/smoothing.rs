use crate::frame::VisualFrame;
use image::{GrayImage, Luma};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Exponential blending of the visual image across cycles.
///
/// Only the recorded and published image is smoothed; detection always runs
/// on the unfiltered thermal grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enabled: bool,
    /// Weight of the newest frame.
    pub alpha: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha: 0.4,
        }
    }
}

pub struct VisualSmoother {
    enabled: bool,
    alpha: f32,
    accumulator: Option<Array2<f32>>,
}

impl VisualSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            enabled: config.enabled,
            alpha: config.alpha.clamp(0.0, 1.0),
            accumulator: None,
        }
    }

    /// Returns the blended frame, or `None` when smoothing is off.
    pub fn apply(&mut self, frame: &VisualFrame) -> Option<VisualFrame> {
        if !self.enabled {
            return None;
        }

        let image = frame.image();
        let (width, height) = image.dimensions();
        let current = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            f32::from(image.get_pixel(x as u32, y as u32)[0])
        });

        let alpha = self.alpha;
        let acc = match self.accumulator.take() {
            Some(mut acc) if acc.dim() == current.dim() => {
                Zip::from(&mut acc)
                    .and(&current)
                    .for_each(|a, &c| *a = (1.0 - alpha) * *a + alpha * c);
                acc
            }
            _ => current,
        };

        let blended = GrayImage::from_fn(width, height, |x, y| {
            Luma([acc[[y as usize, x as usize]].round().clamp(0.0, 255.0) as u8])
        });
        self.accumulator = Some(acc);
        Some(VisualFrame::new(blended, frame.timestamp(), frame.captured_at()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn frame(value: u8, size: u32) -> VisualFrame {
        VisualFrame::new(GrayImage::from_pixel(size, size, Luma([value])), 0.0, Local::now())
    }

    #[test]
    fn disabled_smoother_passes_frames_through() {
        let mut smoother = VisualSmoother::new(&SmoothingConfig::default());
        assert!(smoother.apply(&frame(200, 4)).is_none());
    }

    #[test]
    fn blends_towards_new_frames() {
        let mut smoother = VisualSmoother::new(&SmoothingConfig {
            enabled: true,
            alpha: 0.4,
        });
        let first = smoother.apply(&frame(100, 4)).unwrap();
        assert_eq!(first.image().get_pixel(0, 0)[0], 100);

        // 0.6 * 100 + 0.4 * 200
        let second = smoother.apply(&frame(200, 4)).unwrap();
        assert_eq!(second.image().get_pixel(3, 3)[0], 140);
    }

    #[test]
    fn geometry_change_restarts_the_blend() {
        let mut smoother = VisualSmoother::new(&SmoothingConfig {
            enabled: true,
            alpha: 0.5,
        });
        smoother.apply(&frame(0, 4));
        let resized = smoother.apply(&frame(80, 6)).unwrap();
        assert_eq!(resized.image().dimensions(), (6, 6));
        assert_eq!(resized.image().get_pixel(5, 5)[0], 80);
    }
}
