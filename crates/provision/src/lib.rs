//! # provision
//!
//! Declarative provisioning and teardown of accounts, groups and projects.
//!
//! - [`spec`]: the YAML spec file model and loader
//! - [`naming`]: how declared names become platform identifiers
//! - [`orchestrator`]: the create, cleanup and bulk runs
//! - [`poll`]: bounded fixed-interval polling with injectable time
//! - [`observer`]: progress events
//! - [`report`]: what a run produced
//!
//! All work is sequential. Platform access goes through [`labkit::Gateway`],
//! so tests run against [`labkit::MockGateway`].
//!
//! ## Example
//!
//! ```
//! use labkit::MockGateway;
//! use provision::{InstantSleeper, Orchestrator, RecordingObserver, SpecFile};
//!
//! let spec = SpecFile::from_yaml(
//!     r#"
//! users:
//!   - username: alice
//!     email: alice@example.com
//!     nameMode: name
//!     groups:
//!       - name: team
//! "#,
//! )
//! .unwrap();
//!
//! let mock = MockGateway::new();
//! let observer = RecordingObserver::new();
//! let orchestrator = Orchestrator::new(mock.clone())
//!     .with_observer(observer.clone())
//!     .with_sleeper(InstantSleeper::new());
//!
//! let results = orchestrator.create_all(&spec).unwrap();
//! assert_eq!(results[0].groups[0].path, "team");
//!
//! let summary = orchestrator.cleanup_all(&spec, 0);
//! assert_eq!(summary.deleted(), vec!["alice"]);
//! assert!(!mock.has_group("team"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod naming;
pub mod observer;
pub mod orchestrator;
pub mod poll;
pub mod report;
pub mod spec;

pub use error::{Error, NamingError, Result, SpecError};
pub use naming::{IdentifierKind, NamingMode};
pub use observer::{Event, NoopObserver, Observer, RecordingObserver, Resource, Severity};
pub use orchestrator::{CleanupTimings, Orchestrator};
pub use poll::{
    poll_until, Clock, FixedClock, InstantSleeper, PollPolicy, Sleeper, SystemClock,
    ThreadSleeper,
};
pub use report::{
    AccountResult, BatchSummary, CleanupOutcome, GroupResult, PrefixDeleteReport, ProjectResult,
    TokenResult,
};
pub use spec::{AccountSpec, GroupSpec, ProjectSpec, SpecFile, TokenSpec};
