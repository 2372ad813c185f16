use crate::workflow::config::RecorderConfig;
use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thermcore::control::SignalReader;
use thermcore::source::FrameSource;
use thermcore::storage::MediaLayout;
use thermcore::telemetry::{LogManager, MetricsRecorder};
use thermcore::Recorder;

const BACKOFF_INITIAL: Duration = Duration::from_millis(50);
const BACKOFF_MAX: Duration = Duration::from_secs(2);
/// Granularity at which sleeps re-check the shutdown flag.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Exponential delay between failed acquisitions.
#[derive(Debug, Clone)]
struct Backoff {
    delay: Duration,
    failures: u32,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: BACKOFF_INITIAL,
            failures: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
        self.failures += 1;
        delay
    }

    fn reset(&mut self) -> u32 {
        let failures = self.failures;
        *self = Self::new();
        failures
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub attempts: u64,
    pub cycles: u64,
    pub events: u64,
    pub last_timestamp: f64,
}

/// Owns the acquisition loop: cadence, retries, signal polling and shutdown.
pub struct Runner {
    source: Box<dyn FrameSource>,
    recorder: Recorder,
    signals: SignalReader,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<MetricsRecorder>,
    frame_period: Option<Duration>,
    max_attempts: Option<u64>,
    logger: LogManager,
}

impl Runner {
    pub fn new(
        config: &RecorderConfig,
        source: Box<dyn FrameSource>,
        shutdown: Arc<AtomicBool>,
        metrics: Arc<MetricsRecorder>,
    ) -> anyhow::Result<Self> {
        let layout = MediaLayout::from_config(&config.media);
        layout
            .ensure_dirs()
            .with_context(|| format!("creating media tree under {}", layout.root().display()))?;

        let signals = SignalReader::new(config.signals.clone(), metrics.clone());
        let recorder = Recorder::new(
            &config.to_pipeline_config(),
            &layout,
            config.media.jpeg_quality,
            signals.arm(),
            metrics.clone(),
        );
        let frame_period = config
            .pacing
            .then(|| Duration::from_secs_f64(1.0 / f64::from(config.recording.fps.max(1))));

        Ok(Self {
            source,
            recorder,
            signals,
            shutdown,
            metrics,
            frame_period,
            max_attempts: None,
            logger: LogManager::new("runner"),
        })
    }

    /// Stops after this many acquisition attempts, successful or not.
    pub fn with_max_attempts(mut self, attempts: Option<u64>) -> Self {
        self.max_attempts = attempts;
        self
    }

    fn should_stop(&self, attempts: u64) -> bool {
        self.shutdown.load(Ordering::SeqCst)
            || self.max_attempts.map_or(false, |max| attempts >= max)
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    pub fn run(mut self) -> RunSummary {
        self.logger.record(&format!(
            "starting on {} (initial arm {:?})",
            self.source.describe(),
            self.signals.arm()
        ));
        if let Err(err) = self.source.open() {
            self.logger.recovered("opening source", 0.0, &err);
            self.metrics.record_device_error();
        }

        let mut summary = RunSummary::default();
        let mut backoff = Backoff::new();

        while !self.should_stop(summary.attempts) {
            let started = Instant::now();
            summary.attempts += 1;

            let (thermal, visual) = match self.source.acquire() {
                Ok(frames) => frames,
                Err(err) => {
                    self.metrics.record_device_error();
                    let delay = backoff.next_delay();
                    self.logger.recovered(
                        &format!("acquire (failure {}, retry in {:?})", backoff.failures, delay),
                        summary.last_timestamp,
                        &err,
                    );
                    self.pause(delay);
                    continue;
                }
            };
            let recovered_after = backoff.reset();
            if recovered_after > 0 {
                self.logger.record(&format!(
                    "source recovered after {} failure(s)",
                    recovered_after
                ));
            }

            let signals = self.signals.poll();
            let report = self.recorder.cycle(&thermal, &visual, signals);
            summary.cycles += 1;
            summary.events = report.events;
            summary.last_timestamp = report.timestamp;
            for id in &report.spawned {
                self.logger
                    .detail(&format!("t={:.2}s spawned ID{}", report.timestamp, id));
            }

            if let Some(period) = self.frame_period {
                self.pause(period.saturating_sub(started.elapsed()));
            }
        }

        if let Some(session) = self.recorder.shutdown(summary.last_timestamp) {
            self.logger
                .record(&format!("closed session {} on shutdown", session.label));
        }
        self.source.close();
        summary.events = self.recorder.events();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::SourceKind;
    use std::fs;
    use thermcore::source::{SyntheticBlob, SyntheticConfig, SyntheticSource};

    fn config(root: &std::path::Path) -> RecorderConfig {
        let mut cfg = RecorderConfig::default();
        cfg.source = SourceKind::Synthetic;
        cfg.media.root = root.join("media");
        cfg.signals.arm_path = root.join("armed");
        cfg.signals.reset_path = root.join("reset_bg");
        cfg.recording.fps = 4;
        cfg.recording.video_scale = 1;
        cfg.recording.pre_roll_secs = 0.5;
        cfg.recording.post_roll_secs = 1.0;
        cfg.pacing = false;
        cfg.synthetic = SyntheticConfig {
            width: 96,
            height: 64,
            frame_interval_secs: 0.25,
            seed: 3,
            blobs: vec![SyntheticBlob {
                start_secs: 1.0,
                end_secs: 3.0,
                from: (20.0, 30.0),
                to: (60.0, 30.0),
                radius: 7.0,
                heat_raw: 640,
            }],
            dropouts: vec![2, 3],
            ..Default::default()
        };
        cfg
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new();
        let delays: Vec<u128> = (0..8).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![50, 100, 200, 400, 800, 1600, 2000, 2000]);
        assert_eq!(backoff.reset(), 8);
        assert_eq!(backoff.next_delay(), BACKOFF_INITIAL);
    }

    #[test]
    fn run_survives_dropouts_and_records_session() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let metrics = Arc::new(MetricsRecorder::new());
        let source = Box::new(SyntheticSource::new(cfg.synthetic.clone()));
        let runner = Runner::new(&cfg, source, Arc::new(AtomicBool::new(false)), metrics.clone())
            .unwrap()
            .with_max_attempts(Some(30));

        let summary = runner.run();
        assert_eq!(summary.attempts, 30);
        assert_eq!(summary.cycles, 28);
        assert_eq!(summary.events, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.device_errors, 2);
        assert_eq!(snapshot.sessions, 1);

        let videos: Vec<_> = fs::read_dir(cfg.media.root.join("videos")).unwrap().collect();
        assert_eq!(videos.len(), 1);
        let status = fs::read_to_string(cfg.media.root.join("status.json")).unwrap();
        assert!(status.contains("\"recording\":false"));
    }

    #[test]
    fn disarm_file_blocks_media_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(&cfg.signals.arm_path, "disarmed\n").unwrap();
        let source = Box::new(SyntheticSource::new(cfg.synthetic.clone()));
        let runner = Runner::new(
            &cfg,
            source,
            Arc::new(AtomicBool::new(false)),
            Arc::new(MetricsRecorder::new()),
        )
        .unwrap()
        .with_max_attempts(Some(24));

        let summary = runner.run();
        assert_eq!(summary.events, 1);
        for sub in ["videos", "videos_tracked", "photos"] {
            assert_eq!(fs::read_dir(cfg.media.root.join(sub)).unwrap().count(), 0);
        }
        assert!(cfg.media.root.join("live.jpg").is_file());
    }

    #[test]
    fn raised_shutdown_flag_stops_before_acquiring() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = Box::new(SyntheticSource::new(cfg.synthetic.clone()));
        let runner = Runner::new(
            &cfg,
            source,
            Arc::new(AtomicBool::new(true)),
            Arc::new(MetricsRecorder::new()),
        )
        .unwrap();

        let summary = runner.run();
        assert_eq!(summary.attempts, 0);
        assert!(cfg.media.root.join("status.json").is_file());
    }
}
