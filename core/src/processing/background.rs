use crate::frame::ThermalFrame;
use crate::math::stats::StatsHelper;
use crate::prelude::{RecorderError, RecorderResult};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Background maintenance parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Blend factor applied to pixels below the hot threshold; 0 disables drift tracking.
    pub adapt_alpha: f32,
    /// Continuous idle time after which the baseline is replaced.
    pub idle_reset_secs: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            adapt_alpha: 0.01,
            idle_reset_secs: 60.0,
        }
    }
}

/// Rolling no-motion reference used for background subtraction.
pub struct BackgroundModel {
    baseline: Option<Array2<f32>>,
    last_reset_at: Option<f64>,
    adapt_alpha: f32,
    hot_threshold: f32,
    logger: LogManager,
}

impl BackgroundModel {
    /// `hot_threshold` is the delta above which a pixel is never blended.
    pub fn new(config: &BackgroundConfig, hot_threshold: f32) -> Self {
        Self {
            baseline: None,
            last_reset_at: None,
            adapt_alpha: config.adapt_alpha.clamp(0.0, 1.0),
            hot_threshold,
            logger: LogManager::new("background"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&Array2<f32>> {
        self.baseline.as_ref()
    }

    pub fn last_reset_at(&self) -> Option<f64> {
        self.last_reset_at
    }

    /// Seeds the baseline from the first frame without counting it as a reset.
    pub fn initialize(&mut self, frame: &ThermalFrame) {
        self.baseline = Some(frame.raw().mapv(f32::from));
        self.logger.record(&format!(
            "baseline initialized from {}x{} frame",
            frame.width(),
            frame.height()
        ));
    }

    /// Replaces the baseline wholesale with `frame`.
    pub fn reset(&mut self, frame: &ThermalFrame) {
        let baseline = frame.raw().mapv(f32::from);
        let (mean, spread) = baseline
            .as_slice()
            .map(|values| (StatsHelper::mean(values), StatsHelper::std_dev(values)))
            .unwrap_or_default();
        self.baseline = Some(baseline);
        self.last_reset_at = Some(frame.timestamp());
        self.logger.record(&format!(
            "baseline reset at t={:.2}s (mean raw {:.1}, spread {:.1})",
            frame.timestamp(),
            mean,
            spread
        ));
    }

    /// Returns `frame - baseline` clipped at zero and blends cold pixels into the baseline.
    pub fn subtract(&mut self, frame: &ThermalFrame) -> RecorderResult<Array2<f32>> {
        let baseline = self
            .baseline
            .as_mut()
            .ok_or_else(|| RecorderError::InvalidInput("background not initialized".into()))?;

        if baseline.dim() != frame.raw().dim() {
            return Err(RecorderError::InvalidInput(format!(
                "frame {:?} does not match baseline {:?}",
                frame.raw().dim(),
                baseline.dim()
            )));
        }

        let mut delta = Array2::<f32>::zeros(baseline.dim());
        Zip::from(&mut delta)
            .and(&*baseline)
            .and(frame.raw())
            .for_each(|d, &b, &raw| *d = (f32::from(raw) - b).max(0.0));

        if self.adapt_alpha > 0.0 {
            let alpha = self.adapt_alpha;
            let threshold = self.hot_threshold;
            Zip::from(&mut *baseline)
                .and(&delta)
                .and(frame.raw())
                .for_each(|b, &d, &raw| {
                    if d <= threshold {
                        *b = (1.0 - alpha) * *b + alpha * f32::from(raw);
                    }
                });
        }

        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn frame(value: u16, timestamp: f64) -> ThermalFrame {
        ThermalFrame::new(Array2::from_elem((4, 6), value), timestamp, Local::now())
    }

    #[test]
    fn subtract_requires_initialization() {
        let mut model = BackgroundModel::new(&BackgroundConfig::default(), 96.0);
        assert!(model.subtract(&frame(100, 0.0)).is_err());
    }

    #[test]
    fn subtract_clips_colder_pixels_to_zero() {
        let mut model = BackgroundModel::new(&BackgroundConfig::default(), 96.0);
        model.initialize(&frame(1000, 0.0));

        let mut raw = Array2::from_elem((4, 6), 900u16);
        raw[[1, 2]] = 1200;
        let delta = model
            .subtract(&ThermalFrame::new(raw, 0.1, Local::now()))
            .unwrap();

        assert_eq!(delta[[0, 0]], 0.0);
        assert_eq!(delta[[1, 2]], 200.0);
    }

    #[test]
    fn cold_pixels_drift_but_hot_pixels_do_not() {
        let config = BackgroundConfig {
            adapt_alpha: 0.5,
            ..Default::default()
        };
        let mut model = BackgroundModel::new(&config, 96.0);
        model.initialize(&frame(1000, 0.0));

        let mut raw = Array2::from_elem((4, 6), 1040u16);
        raw[[0, 0]] = 1500;
        model
            .subtract(&ThermalFrame::new(raw, 0.1, Local::now()))
            .unwrap();

        let baseline = model.baseline().unwrap();
        assert_eq!(baseline[[0, 0]], 1000.0);
        assert_eq!(baseline[[3, 5]], 1020.0);
    }

    #[test]
    fn reset_replaces_baseline_and_records_time() {
        let mut model = BackgroundModel::new(&BackgroundConfig::default(), 96.0);
        model.initialize(&frame(1000, 0.0));
        assert_eq!(model.last_reset_at(), None);

        model.reset(&frame(1300, 61.0));
        assert_eq!(model.last_reset_at(), Some(61.0));
        assert!(model.baseline().unwrap().iter().all(|&v| v == 1300.0));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let mut model = BackgroundModel::new(&BackgroundConfig::default(), 96.0);
        model.initialize(&frame(1000, 0.0));
        let other = ThermalFrame::new(Array2::zeros((2, 2)), 0.1, Local::now());
        assert!(matches!(
            model.subtract(&other),
            Err(RecorderError::InvalidInput(_))
        ));
    }
}
