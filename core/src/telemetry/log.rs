use log::{debug, info, warn};

/// Component-scoped front end over the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    /// Logs a recovered failure together with the operation and frame time.
    pub fn recovered(&self, operation: &str, timestamp: f64, error: &dyn std::fmt::Display) {
        warn!(
            "[{}] {} failed at t={:.2}s: {}",
            self.component, operation, timestamp, error
        );
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("recorder")
    }
}
