/// Decides when a sustained stretch without tracks should refresh the baseline.
///
/// The timer starts on the first cycle with zero active tracks and fires once
/// per idle span; any active track cancels it.
#[derive(Debug, Clone)]
pub struct IdleResetPolicy {
    threshold_secs: f64,
    idle_since: Option<f64>,
    fired: bool,
}

impl IdleResetPolicy {
    pub fn new(threshold_secs: f64) -> Self {
        Self {
            threshold_secs,
            idle_since: None,
            fired: false,
        }
    }

    /// Returns `true` on the single cycle where the idle span crosses the threshold.
    pub fn observe(&mut self, active_tracks: usize, now: f64) -> bool {
        if active_tracks > 0 {
            self.idle_since = None;
            self.fired = false;
            return false;
        }

        let since = *self.idle_since.get_or_insert(now);
        if !self.fired && now - since >= self.threshold_secs {
            self.fired = true;
            return true;
        }
        false
    }

    /// A manual reset during an idle span satisfies that span.
    pub fn note_manual_reset(&mut self) {
        if self.idle_since.is_some() {
            self.fired = true;
        }
    }

    pub fn idle_for(&self, now: f64) -> Option<f64> {
        self.idle_since.map(|since| now - since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_threshold() {
        let mut policy = IdleResetPolicy::new(60.0);
        let fired: Vec<f64> = (0..300)
            .map(|i| i as f64 * 0.5)
            .filter(|&t| policy.observe(0, t))
            .collect();
        assert_eq!(fired, vec![60.0]);
    }

    #[test]
    fn activity_restarts_the_timer() {
        let mut policy = IdleResetPolicy::new(10.0);
        assert!(!policy.observe(0, 0.0));
        assert!(!policy.observe(0, 9.0));
        assert!(!policy.observe(1, 9.5));
        assert!(!policy.observe(0, 10.0));
        assert!(!policy.observe(0, 19.9));
        assert!(policy.observe(0, 20.0));
        assert!(!policy.observe(0, 40.0));
    }

    #[test]
    fn never_fires_while_tracking() {
        let mut policy = IdleResetPolicy::new(1.0);
        assert!((0..100).all(|i| !policy.observe(2, i as f64)));
        assert_eq!(policy.idle_for(100.0), None);
    }

    #[test]
    fn manual_reset_consumes_current_span() {
        let mut policy = IdleResetPolicy::new(5.0);
        policy.observe(0, 0.0);
        policy.note_manual_reset();
        assert!(!policy.observe(0, 6.0));
        policy.observe(1, 7.0);
        policy.observe(0, 8.0);
        assert!(policy.observe(0, 13.0));
    }
}
