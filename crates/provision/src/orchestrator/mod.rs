//! Resource lifecycle orchestrator.
//!
//! Walks the spec tree against a [`Gateway`]:
//!
//! - [`create`]: account, then token, then groups with their projects, then
//!   user-level projects. Parents are always created before children.
//! - [`cleanup`]: projects, then groups, then every other group the account
//!   owns, then the account. Deletions are verified by polling.
//! - [`bulk`]: listing and delete-by-prefix on top of cleanup.
//!
//! Everything runs sequentially on the calling thread.

pub mod bulk;
pub mod cleanup;
pub mod create;

use crate::observer::{Event, NoopObserver, Observer};
use crate::poll::{Clock, PollPolicy, Sleeper, SystemClock, ThreadSleeper};
use labkit::Gateway;
use std::time::Duration;

/// Waits used by the cleanup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupTimings {
    /// Re-checks that configured groups are gone.
    pub group_verify: PollPolicy,
    /// Re-checks that the account owns no groups.
    pub owned_group_verify: PollPolicy,
    /// Pause before deleting the account.
    pub settle: Duration,
    /// Pause between deleting the account and re-checking it.
    pub account_verify_delay: Duration,
}

impl Default for CleanupTimings {
    fn default() -> Self {
        Self {
            group_verify: PollPolicy::new(6, Duration::from_secs(5)),
            owned_group_verify: PollPolicy::new(10, Duration::from_secs(5)),
            settle: Duration::from_secs(10),
            account_verify_delay: Duration::from_secs(10),
        }
    }
}

/// Drives create, cleanup and bulk runs against one gateway.
///
/// # Example
///
/// ```
/// use labkit::MockGateway;
/// use provision::{InstantSleeper, Orchestrator, SpecFile};
///
/// let spec = SpecFile::from_yaml(
///     "users:\n  - username: alice\n    email: alice@example.com\n    nameMode: name\n",
/// )
/// .unwrap();
///
/// let orchestrator = Orchestrator::new(MockGateway::new()).with_sleeper(InstantSleeper::new());
/// let results = orchestrator.create_all(&spec).unwrap();
/// assert_eq!(results[0].username, "alice");
/// ```
pub struct Orchestrator {
    gateway: Box<dyn Gateway>,
    observer: Box<dyn Observer>,
    sleeper: Box<dyn Sleeper>,
    clock: Box<dyn Clock>,
    timings: CleanupTimings,
}

impl Orchestrator {
    /// Create an orchestrator with real time and no observer.
    pub fn new(gateway: impl Gateway + 'static) -> Self {
        Self {
            gateway: Box::new(gateway),
            observer: Box::new(NoopObserver),
            sleeper: Box::new(ThreadSleeper),
            clock: Box::new(SystemClock),
            timings: CleanupTimings::default(),
        }
    }

    /// Report progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Wait through `sleeper`.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Read the time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Override cleanup waits.
    #[must_use]
    pub fn with_timings(mut self, timings: CleanupTimings) -> Self {
        self.timings = timings;
        self
    }

    fn emit(&self, event: Event) {
        self.observer.on_step(&event);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::poll::{FixedClock, InstantSleeper};
    use chrono::{DateTime, TimeZone, Utc};
    use labkit::{Account, MockGateway};

    pub(crate) struct Harness {
        pub mock: MockGateway,
        pub observer: RecordingObserver,
        pub sleeper: InstantSleeper,
        pub orchestrator: Orchestrator,
    }

    pub(crate) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap()
    }

    pub(crate) fn harness() -> Harness {
        let mock = MockGateway::new();
        let observer = RecordingObserver::new();
        let sleeper = InstantSleeper::new();
        let orchestrator = Orchestrator::new(mock.clone())
            .with_observer(observer.clone())
            .with_sleeper(sleeper.clone())
            .with_clock(FixedClock(now()));
        Harness {
            mock,
            observer,
            sleeper,
            orchestrator,
        }
    }

    pub(crate) fn account(id: u64, username: &str, age_days: Option<i64>) -> Account {
        Account {
            id,
            username: username.to_string(),
            name: username.to_string(),
            email: Some(format!("{}@example.com", username)),
            is_admin: false,
            state: Some("active".to_string()),
            created_at: age_days.map(|days| now() - chrono::Duration::days(days)),
            web_url: None,
        }
    }
}
