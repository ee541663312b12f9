//! Minimum-spacing filter shared by the input channels and the dispatch gate.

use std::time::{Duration, Instant};

/// Minimum-spacing filter for accepted transitions.
///
/// A transition is accepted only if at least `window` has elapsed since the
/// previously *accepted* one. Rejected transitions do not move the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Decide whether a transition at `now` is accepted, recording it if so
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            // A clock that appears to run backwards counts as zero elapsed
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }

    /// Forget the last accepted transition so the next one passes
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_transition_is_accepted() {
        let mut d = Debouncer::new(Duration::from_millis(50));
        assert!(d.accept(Instant::now()));
    }

    #[test]
    fn test_bounce_inside_window_is_rejected() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(50));
        assert!(d.accept(t0));
        assert!(!d.accept(t0 + Duration::from_millis(10)));
        assert!(!d.accept(t0 + Duration::from_millis(49)));
        assert!(d.accept(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_rejected_transitions_do_not_extend_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(50));
        assert!(d.accept(t0));
        assert!(!d.accept(t0 + Duration::from_millis(40)));
        assert!(d.accept(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_reset_lets_next_transition_through() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(200));
        assert!(d.accept(t0));
        d.reset();
        assert!(d.accept(t0 + Duration::from_millis(1)));
    }
}
