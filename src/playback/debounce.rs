//! Coalescing timer for regeneration requests.
//!
//! Polled rather than callback-driven: the owner calls [`Debouncer::fire`]
//! from its own loop, so no timer thread or event-loop primitive is needed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Debouncer {
            quiet,
            deadline: None,
        }
    }

    /// (Re)arm the timer; any earlier pending deadline is replaced.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once when the quiet period has elapsed since the last
    /// `schedule`. Disarms the timer when it fires.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(100);

    #[test]
    fn idle_debouncer_never_fires() {
        let mut d = Debouncer::new(QUIET);
        assert!(!d.is_pending());
        assert!(!d.fire(Instant::now() + Duration::from_secs(5)));
    }

    #[test]
    fn fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(QUIET);
        d.schedule(t0);
        assert!(!d.fire(t0 + Duration::from_millis(99)));
        assert!(d.fire(t0 + QUIET));
        assert!(!d.fire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn burst_of_edits_coalesces_into_one_fire() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(QUIET);
        let mut fired = 0;
        // A slider drag: an edit every 20 ms for 200 ms.
        for step in 0..=10 {
            let now = t0 + Duration::from_millis(step * 20);
            d.schedule(now);
            if d.fire(now) {
                fired += 1;
            }
        }
        assert_eq!(d.deadline(), Some(t0 + Duration::from_millis(300)));
        for ms in (200..=400).step_by(10) {
            if d.fire(t0 + Duration::from_millis(ms)) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn cancel_disarms() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(QUIET);
        d.schedule(t0);
        d.cancel();
        assert!(!d.fire(t0 + QUIET));
    }
}
