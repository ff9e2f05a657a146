//! Terminal observer for orchestrator events.

use crate::ui;
use provision::{Event, Observer, Severity};

/// Prints every event through [`ui`] and mirrors it to the `log` facade at debug level.
///
/// With `quiet`, only warnings reach the terminal.
pub struct ConsoleObserver {
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn should_print(&self, severity: Severity) -> bool {
        !self.quiet || severity == Severity::Warn
    }
}

impl Observer for ConsoleObserver {
    fn on_step(&self, event: &Event) {
        let severity = event.severity();
        let message = event.to_string();

        // Terminal output already covers the default level
        log::debug!(target: "labseed::event", "[{:?}] {}", severity, message);

        if !self.should_print(severity) {
            return;
        }
        match (severity, event) {
            (_, Event::VerifyAttempt { .. }) => ui::dim(&message),
            (Severity::Info, _) => ui::info(&message),
            (Severity::Success, _) => ui::success(&message),
            (Severity::Warn, _) => ui::warn(&message),
        }
    }
}
