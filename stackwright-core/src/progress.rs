//! Client-side progress estimate for a call whose duration is unknown.
//!
//! This is a UX affordance, not a measurement. The curve rises quickly at
//! first and flattens out, stays strictly below its cap while the call is
//! running, and only jumps to 100 once the caller reports completion.

use std::time::{Duration, Instant};

/// Default ceiling while the call is still outstanding.
pub const DEFAULT_CAP: u8 = 92;
/// Typical duration of a full bundle generation.
pub const DEFAULT_EXPECTED: Duration = Duration::from_secs(20);

/// Raw curve value `min(log10((elapsed/expected) * 9 + 1) * 45, cap)`.
///
/// A zero `expected` is treated as one millisecond.
pub fn estimate(elapsed: Duration, expected: Duration, cap: u8) -> f64 {
    let expected = expected.max(Duration::from_millis(1)).as_secs_f64();
    let ratio = elapsed.as_secs_f64() / expected;
    ((ratio * 9.0 + 1.0).log10() * 45.0).min(f64::from(cap))
}

/// Monotonic integer-percent tracker over [`estimate`].
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    expected: Duration,
    cap: u8,
    percent: u8,
    complete: bool,
}

impl ProgressTracker {
    pub fn new(expected: Duration) -> Self {
        Self {
            started: Instant::now(),
            expected,
            cap: DEFAULT_CAP,
            percent: 0,
            complete: false,
        }
    }

    /// Override the cap. Values are clamped into `1..=99`.
    pub fn with_cap(mut self, cap: u8) -> Self {
        self.cap = cap.clamp(1, 99);
        self
    }

    /// Update from wall-clock time since construction.
    pub fn tick(&mut self) -> u8 {
        self.observe(self.started.elapsed())
    }

    /// Update from an explicit elapsed duration.
    ///
    /// Never decreases, and stays below the cap until [`complete`](Self::complete).
    pub fn observe(&mut self, elapsed: Duration) -> u8 {
        if self.complete {
            return 100;
        }
        let value = estimate(elapsed, self.expected, self.cap).floor() as u8;
        let value = value.min(self.cap - 1);
        self.percent = self.percent.max(value);
        self.percent
    }

    /// Mark the call as resolved.
    pub fn complete(&mut self) -> u8 {
        self.complete = true;
        self.percent = 100;
        100
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Coarse "step n of total" hint derived from the current percent.
    pub fn step(&self, total: u8) -> u8 {
        if total == 0 {
            return 0;
        }
        let per_step = 100.0 / f64::from(total);
        let step = (f64::from(self.percent) / per_step).ceil() as u8;
        step.min(total)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: Duration = Duration::from_secs(20);

    #[test]
    fn curve_starts_at_zero_and_hits_45_at_expected() {
        assert_eq!(estimate(Duration::ZERO, EXPECTED, DEFAULT_CAP), 0.0);
        let at_expected = estimate(EXPECTED, EXPECTED, DEFAULT_CAP);
        assert!((at_expected - 45.0).abs() < 1e-9);
    }

    #[test]
    fn curve_is_capped() {
        let late = estimate(Duration::from_secs(3600), EXPECTED, DEFAULT_CAP);
        assert_eq!(late, f64::from(DEFAULT_CAP));
    }

    #[test]
    fn zero_expected_does_not_divide_by_zero() {
        let value = estimate(Duration::from_secs(1), Duration::ZERO, DEFAULT_CAP);
        assert_eq!(value, f64::from(DEFAULT_CAP));
    }

    #[test]
    fn tracker_stays_below_cap_until_complete() {
        let mut tracker = ProgressTracker::new(EXPECTED);
        assert_eq!(tracker.observe(Duration::ZERO), 0);
        assert_eq!(tracker.observe(Duration::from_secs(86_400)), DEFAULT_CAP - 1);
        assert!(!tracker.is_complete());
        assert_eq!(tracker.complete(), 100);
        assert_eq!(tracker.observe(Duration::ZERO), 100);
    }

    #[test]
    fn tracker_never_goes_backwards() {
        let mut tracker = ProgressTracker::new(EXPECTED);
        let high = tracker.observe(Duration::from_secs(40));
        let after = tracker.observe(Duration::from_secs(5));
        assert_eq!(after, high);

        let mut last = 0;
        for secs in 0..300 {
            let p = tracker.observe(Duration::from_secs(secs));
            assert!(p >= last);
            assert!(p < DEFAULT_CAP);
            last = p;
        }
    }

    #[test]
    fn custom_cap_is_clamped_below_100() {
        let mut tracker = ProgressTracker::new(EXPECTED).with_cap(250);
        assert_eq!(tracker.observe(Duration::from_secs(1_000_000)), 98);
    }

    #[test]
    fn step_hint_tracks_percent() {
        let mut tracker = ProgressTracker::new(EXPECTED);
        assert_eq!(tracker.step(7), 0);
        tracker.observe(EXPECTED); // 45%
        assert_eq!(tracker.step(7), 4);
        tracker.complete();
        assert_eq!(tracker.step(7), 7);
        assert_eq!(tracker.step(0), 0);
    }
}
