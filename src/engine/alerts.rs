//! New-assignment alerts: pending-count delta tracking and the desktop
//! notification it produces.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

/// Desktop notification permission as reported by the [`Notifier`].
///
/// [`Notifier`]: crate::engine::host::Notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Never asked.
    Default,
    Granted,
    Denied,
}

/// Handle for a shown notification, used to close it or route its click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification-{}", self.0)
    }
}

/// Content of a new-assignment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
}

impl DesktopNotification {
    /// `{user} have {n} application(s) for your action[ as {role}]`.
    #[must_use]
    pub fn new_assignments(
        title: &str,
        icon: Option<&str>,
        user: &str,
        new_count: u64,
        role: Option<&str>,
    ) -> Self {
        let suffix = role
            .filter(|r| !r.is_empty())
            .map(|r| format!(" as {r}"))
            .unwrap_or_default();
        Self {
            title: title.to_string(),
            body: format!("{user} have {new_count} application(s) for your action{suffix}"),
            icon: icon.map(str::to_string),
        }
    }
}

/// Tracks the last observed pending count for the signed-in user.
///
/// A delta is reported only when the count grew over a nonzero previous
/// observation. Every observation replaces the baseline, reported or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingDeltaTracker {
    last: u64,
}

impl PendingDeltaTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Record `current` and return how many new assignments it represents.
    pub fn observe(&mut self, current: u64) -> Option<u64> {
        let previous = self.last;
        self.last = current;
        (current > previous && previous > 0).then(|| current - previous)
    }

    /// Replace the baseline without reporting.
    pub fn set_baseline(&mut self, current: u64) {
        self.last = current;
    }

    #[must_use]
    pub const fn baseline(&self) -> u64 {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_baseline_never_notifies() {
        let mut tracker = PendingDeltaTracker::new();
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.baseline(), 3);
    }

    #[test]
    fn growth_over_nonzero_baseline_reports_delta() {
        let mut tracker = PendingDeltaTracker::new();
        tracker.set_baseline(3);
        assert_eq!(tracker.observe(5), Some(2));
        assert_eq!(tracker.observe(5), None);
        assert_eq!(tracker.observe(4), None);
        assert_eq!(tracker.baseline(), 4);
        assert_eq!(tracker.observe(6), Some(2));
    }

    #[test]
    fn notification_body_includes_role_when_known() {
        let with_role = DesktopNotification::new_assignments(
            "New Application Assignment",
            None,
            "alice",
            2,
            Some("Approver"),
        );
        assert_eq!(
            with_role.body,
            "alice have 2 application(s) for your action as Approver"
        );

        let without = DesktopNotification::new_assignments("T", None, "bob", 1, Some(""));
        assert_eq!(without.body, "bob have 1 application(s) for your action");
    }
}
