//! Fixed-interval polling with injectable time.
//!
//! The platform deletes asynchronously, so cleanup re-checks existence a
//! bounded number of times. Waiting goes through [`Sleeper`] and "now" comes
//! from [`Clock`] so tests run instantly and deterministically.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Something that can block for a duration.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Returns immediately and records every requested duration.
///
/// Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct InstantSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleeper {
    /// Create a sleeper with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far.
    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all requested durations.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.slept().iter().sum()
    }
}

impl Sleeper for InstantSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current date in UTC.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// How many times to check and how long to wait before each check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of checks.
    pub max_attempts: u32,
    /// Wait before each check.
    pub interval: Duration,
}

impl PollPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Wait `policy.interval`, then check; repeat until `converged` returns true
/// or `policy.max_attempts` checks have been made.
///
/// `converged` receives the 1-indexed attempt number. Returns whether it
/// ever returned true.
pub fn poll_until<F>(sleeper: &dyn Sleeper, policy: PollPolicy, mut converged: F) -> bool
where
    F: FnMut(u32) -> bool,
{
    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval);
        if converged(attempt) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_poll_converges_early() {
        let sleeper = InstantSleeper::new();
        let policy = PollPolicy::new(6, Duration::from_secs(5));
        let mut seen = Vec::new();
        let ok = poll_until(&sleeper, policy, |attempt| {
            seen.push(attempt);
            attempt == 3
        });
        assert!(ok);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(sleeper.slept().len(), 3);
        assert_eq!(sleeper.total(), Duration::from_secs(15));
    }

    #[test]
    fn test_poll_exhausts_attempts() {
        let sleeper = InstantSleeper::new();
        let policy = PollPolicy::new(6, Duration::from_secs(5));
        let mut calls = 0;
        let ok = poll_until(&sleeper, policy, |_| {
            calls += 1;
            false
        });
        assert!(!ok);
        assert_eq!(calls, 6);
        assert_eq!(sleeper.total(), Duration::from_secs(30));
    }

    #[test]
    fn test_poll_zero_attempts_never_checks() {
        let sleeper = InstantSleeper::new();
        let ok = poll_until(&sleeper, PollPolicy::new(0, Duration::from_secs(1)), |_| true);
        assert!(!ok);
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn test_instant_sleeper_clones_share_record() {
        let sleeper = InstantSleeper::new();
        let clone = sleeper.clone();
        clone.sleep(Duration::from_secs(10));
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(10)]);
    }

    #[test]
    fn test_fixed_clock_today() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 23, 59, 59).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
    }
}
