use std::sync::Mutex;

/// Process-wide counters shared by the pipeline components.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub device_errors: u64,
    pub storage_errors: u64,
    pub signal_errors: u64,
    pub background_resets: u64,
    pub sessions: u64,
    pub photos: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_cycle(&self) {
        self.update(|m| m.cycles += 1);
    }

    pub fn record_device_error(&self) {
        self.update(|m| m.device_errors += 1);
    }

    pub fn record_storage_error(&self) {
        self.update(|m| m.storage_errors += 1);
    }

    pub fn record_signal_error(&self) {
        self.update(|m| m.signal_errors += 1);
    }

    pub fn record_background_reset(&self) {
        self.update(|m| m.background_resets += 1);
    }

    pub fn record_session(&self) {
        self.update(|m| m.sessions += 1);
    }

    pub fn record_photo(&self) {
        self.update(|m| m.photos += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
