use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Stalled,
}

impl Liveness {
    pub fn is_stalled(self) -> bool {
        self == Liveness::Stalled
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StallState {
    pub last_value: f64,
    pub last_change: Instant,
}

/// Tracks whether a transfer is still moving.
///
/// The clock only restarts when the observed value changes; comparison is exact, so any
/// forward motion counts as progress.
#[derive(Debug, Default)]
pub struct StallDetector {
    state: Option<StallState>,
}

impl StallDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<StallState> {
        self.state
    }

    pub fn observe(&mut self, value: f64, now: Instant, timeout: Duration) -> Liveness {
        match self.state.as_mut() {
            None => {
                self.state = Some(StallState {
                    last_value: value,
                    last_change: now,
                });
                Liveness::Alive
            }
            Some(state) if state.last_value != value => {
                state.last_value = value;
                state.last_change = state.last_change.max(now);
                Liveness::Alive
            }
            Some(_) => self.check(now, timeout),
        }
    }

    /// Re-evaluates the window without a new sample. Never stalls before the first observation.
    pub fn check(&self, now: Instant, timeout: Duration) -> Liveness {
        match &self.state {
            Some(state) if now.saturating_duration_since(state.last_change) > timeout => {
                Liveness::Stalled
            }
            _ => Liveness::Alive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn first_observation_is_alive() {
        let now = Instant::now();
        let mut detector = StallDetector::new();
        assert_eq!(detector.observe(0.0, now, Duration::ZERO), Liveness::Alive);
        assert_eq!(detector.state().unwrap().last_change, now);
    }

    #[test]
    fn nothing_observed_never_stalls() {
        let detector = StallDetector::new();
        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(detector.check(later, Duration::ZERO), Liveness::Alive);
    }

    #[test]
    fn unchanged_value_stalls_after_window() {
        let t0 = Instant::now();
        let mut detector = StallDetector::new();
        assert!(!detector.observe(12.5, t0, TIMEOUT).is_stalled());
        assert!(!detector.observe(12.5, t0 + Duration::from_secs(4), TIMEOUT).is_stalled());
        assert!(!detector.observe(12.5, t0 + TIMEOUT, TIMEOUT).is_stalled());
        let past = t0 + TIMEOUT + Duration::from_millis(1);
        assert!(detector.observe(12.5, past, TIMEOUT).is_stalled());
    }

    #[test]
    fn new_value_resets_the_clock() {
        let t0 = Instant::now();
        let mut detector = StallDetector::new();
        detector.observe(1.0, t0, TIMEOUT);
        let t1 = t0 + Duration::from_secs(9);
        assert!(!detector.observe(1.000001, t1, TIMEOUT).is_stalled());
        assert_eq!(detector.state().unwrap().last_change, t1);

        assert!(!detector.observe(1.000001, t0 + Duration::from_secs(15), TIMEOUT).is_stalled());
        assert!(detector.observe(1.000001, t1 + TIMEOUT * 2, TIMEOUT).is_stalled());
    }

    #[test]
    fn change_never_rewinds_the_clock() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(5);
        let mut detector = StallDetector::new();
        detector.observe(1.0, t1, TIMEOUT);
        detector.observe(2.0, t0, TIMEOUT);
        assert_eq!(detector.state().unwrap().last_change, t1);
        assert_eq!(detector.state().unwrap().last_value, 2.0);
    }

    #[test]
    fn check_uses_the_same_window() {
        let t0 = Instant::now();
        let mut detector = StallDetector::new();
        detector.observe(3.0, t0, TIMEOUT);
        assert_eq!(detector.check(t0 + TIMEOUT, TIMEOUT), Liveness::Alive);
        assert_eq!(
            detector.check(t0 + TIMEOUT + Duration::from_secs(1), TIMEOUT),
            Liveness::Stalled
        );
    }
}
