#![forbid(unsafe_code)]

//! Substitutable wall-clock sources.
//!
//! Everything that asks "what time is it" goes through [`Clock`] so tests can
//! pin the current moment with a [`FixedClock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Source of the current moment.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// The current calendar date (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for deterministic tests.
///
/// Clones share the same instant, so a test can keep one handle and move time
/// while the code under test holds another.
#[derive(Clone)]
pub struct FixedClock {
    millis: Arc<AtomicI64>,
}

impl FixedClock {
    /// Create a clock pinned at `instant`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(instant.timestamp_millis())),
        }
    }

    /// Create a clock pinned at midnight UTC of `date`.
    #[must_use]
    pub fn at_midnight(date: NaiveDate) -> Self {
        Self::at(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Move the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move the clock forward (or backward, for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        self.millis
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Debug for FixedClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedClock")
            .field("now", &self.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_reports_pinned_instant() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let clock = FixedClock::at(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn clones_share_time() {
        let clock = FixedClock::at_midnight(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let handle = clock.clone();
        handle.advance(TimeDelta::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn set_moves_clock() {
        let clock = FixedClock::at_midnight(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        let later = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn usable_as_trait_object() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_midnight(
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        ));
        assert_eq!(clock.today().to_string(), "2024-02-29");
    }
}
