use chrono::{DateTime, Local};
use image::GrayImage;
use ndarray::Array2;

/// Raw thermal intensities as delivered by the sensor, indexed `[row, col]`.
#[derive(Debug, Clone)]
pub struct ThermalFrame {
    raw: Array2<u16>,
    timestamp: f64,
    captured_at: DateTime<Local>,
}

impl ThermalFrame {
    pub fn new(raw: Array2<u16>, timestamp: f64, captured_at: DateTime<Local>) -> Self {
        Self {
            raw,
            timestamp,
            captured_at,
        }
    }

    pub fn raw(&self) -> &Array2<u16> {
        &self.raw
    }

    /// Seconds since the frame source started.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn width(&self) -> usize {
        self.raw.ncols()
    }

    pub fn height(&self) -> usize {
        self.raw.nrows()
    }
}

/// Visible-light image paired with a thermal frame.
#[derive(Debug, Clone)]
pub struct VisualFrame {
    image: GrayImage,
    timestamp: f64,
    captured_at: DateTime<Local>,
}

impl VisualFrame {
    pub fn new(image: GrayImage, timestamp: f64, captured_at: DateTime<Local>) -> Self {
        Self {
            image,
            timestamp,
            captured_at,
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// File-name label derived from the wall-clock capture time.
    pub fn label(&self) -> String {
        self.captured_at.format("%Y%m%d_%H%M%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn thermal_frame_reports_grid_dimensions() {
        let frame = ThermalFrame::new(Array2::zeros((192, 256)), 0.0, Local::now());
        assert_eq!(frame.width(), 256);
        assert_eq!(frame.height(), 192);
    }

    #[test]
    fn visual_label_uses_capture_time() {
        let at = Local.with_ymd_and_hms(2024, 5, 17, 21, 4, 9).unwrap();
        let frame = VisualFrame::new(GrayImage::new(4, 4), 1.5, at);
        assert_eq!(frame.label(), "20240517_210409");
    }
}
