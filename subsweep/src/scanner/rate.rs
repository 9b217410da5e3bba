use std::time::{Duration, Instant};

/// Longest stretch of missed send slots that may be made up at once.
///
/// Timers wake up to about a millisecond late, so at high rates several
/// slots can be due by the time the loop runs again.
const MAX_CATCH_UP: Duration = Duration::from_millis(2);

/// Global send ceiling on a fixed `1/qps` grid.
///
/// Each send moves the next slot one interval past the previous slot, not
/// past the moment of the send, so a late wake-up does not stretch the
/// gap. Slots missed by more than `max(1/qps, 2ms)` are dropped, which
/// keeps idle time from turning into a burst: over any window `w`, at most
/// `(w + max(1/qps, 2ms)) * qps + 1` sends go out.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    catch_up: Duration,
    opens_at: Option<Instant>,
}

impl RateGate {
    /// `qps` must be non-zero, which option validation guarantees.
    pub fn new(qps: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / f64::from(qps.max(1)));
        Self {
            interval,
            catch_up: interval.max(MAX_CATCH_UP),
            opens_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.opens_at.is_none_or(|at| now >= at)
    }

    /// Marks a send at `now`.
    pub fn close(&mut self, now: Instant) {
        let earliest = now.checked_sub(self.catch_up).unwrap_or(now);
        let slot = match self.opens_at {
            Some(prev) => prev.max(earliest),
            None => now,
        };
        self.opens_at = Some(slot + self.interval);
    }

    pub fn opens_at(&self) -> Option<Instant> {
        self.opens_at
    }
}
