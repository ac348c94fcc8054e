//! Injected time source and tick scheduling.
//!
//! Distance decay never reads wall-clock time directly. The service asks a
//! [`Clock`] for "now" and a [`Ticker`] converts elapsed time into a whole
//! number of decay steps, so tests can drive arrivals without sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Converts elapsed time into discrete decay steps.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Ticker {
    /// `interval` must be positive; config validation guarantees it.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Number of whole intervals elapsed since the last accounted step.
    ///
    /// The first call only anchors the ticker. Leftover time carries over,
    /// and a clock that moves backwards yields zero steps.
    pub fn due(&mut self, now: DateTime<Utc>) -> u32 {
        let Some(last) = self.last else {
            self.last = Some(now);
            return 0;
        };

        let interval_ms = self.interval.num_milliseconds();
        if interval_ms <= 0 {
            return 0;
        }

        let elapsed_ms = (now - last).num_milliseconds();
        if elapsed_ms < interval_ms {
            return 0;
        }

        let steps = elapsed_ms / interval_ms;
        self.last = Some(last + Duration::milliseconds(steps * interval_ms));
        u32::try_from(steps).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), t0() + Duration::seconds(5));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn test_first_call_anchors() {
        let mut ticker = Ticker::new(Duration::seconds(1));
        assert_eq!(ticker.due(t0()), 0);
        assert_eq!(ticker.due(t0() + Duration::milliseconds(999)), 0);
        assert_eq!(ticker.due(t0() + Duration::seconds(1)), 1);
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut ticker = Ticker::new(Duration::seconds(1));
        ticker.due(t0());
        assert_eq!(ticker.due(t0() + Duration::milliseconds(2500)), 2);
        assert_eq!(ticker.due(t0() + Duration::milliseconds(3000)), 1);
    }

    #[test]
    fn test_backwards_clock() {
        let mut ticker = Ticker::new(Duration::seconds(1));
        ticker.due(t0());
        assert_eq!(ticker.due(t0() - Duration::seconds(10)), 0);
    }
}
