//! Desktop notifications via `notify-send` (Linux) or `osascript` (macOS).
//!
//! Fire-and-forget: the child process is spawned and never awaited, so a
//! slow notification daemon cannot stall the engine thread.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::process::{Command, Stdio};

use crate::core::errors::{DeskError, Result};
use crate::engine::alerts::{DesktopNotification, NotificationId, Permission};
use crate::engine::host::Notifier;

/// [`Notifier`] backed by the platform's notification command.
#[derive(Debug)]
pub struct DesktopNotifier {
    permission: Permission,
    expire_ms: u64,
    next_id: u64,
    open: BTreeSet<NotificationId>,
}

impl DesktopNotifier {
    #[must_use]
    pub const fn new(expire_ms: u64) -> Self {
        Self {
            permission: Permission::Default,
            expire_ms,
            next_id: 0,
            open: BTreeSet::new(),
        }
    }

    /// Notifications shown and not yet closed.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

fn command_available(program: &str, check_args: &[&str]) -> bool {
    Command::new(program)
        .args(check_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

impl Notifier for DesktopNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        #[cfg(target_os = "linux")]
        let available = command_available("notify-send", &["--version"]);
        #[cfg(target_os = "macos")]
        let available = command_available("osascript", &["-e", "return"]);
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let available = {
            let _ = command_available;
            false
        };

        self.permission = if available {
            Permission::Granted
        } else {
            Permission::Denied
        };
        self.permission
    }

    fn show(&mut self, notification: &DesktopNotification) -> Result<NotificationId> {
        if self.permission != Permission::Granted {
            return Err(DeskError::Collaborator {
                collaborator: "notifier",
                details: "notification permission not granted".to_string(),
            });
        }

        #[cfg(target_os = "linux")]
        let spawned = {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name=ldk")
                .arg("--expire-time")
                .arg(self.expire_ms.to_string());
            if let Some(icon) = &notification.icon {
                cmd.arg("--icon").arg(icon);
            }
            cmd.arg(&notification.title)
                .arg(&notification.body)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
        };

        #[cfg(target_os = "macos")]
        let spawned = {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                notification.body.replace('"', "\\\""),
                notification.title.replace('"', "\\\"")
            );
            Command::new("osascript").arg("-e").arg(&script).spawn()
        };

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let spawned: std::io::Result<()> = {
            let _ = notification;
            Err(std::io::Error::other("desktop notifications unsupported"))
        };

        spawned.map_err(|e| DeskError::Collaborator {
            collaborator: "notifier",
            details: e.to_string(),
        })?;

        self.next_id += 1;
        let id = NotificationId(self.next_id);
        self.open.insert(id);
        Ok(id)
    }

    fn close(&mut self, id: NotificationId) {
        // The daemon expires the bubble itself; only the bookkeeping is ours.
        self.open.remove(&id);
    }

    fn focus_window(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_requires_granted_permission() {
        let mut notifier = DesktopNotifier::new(10_000);
        assert_eq!(notifier.permission(), Permission::Default);
        let err = notifier
            .show(&DesktopNotification::new_assignments("T", None, "u", 1, None))
            .unwrap_err();
        assert_eq!(err.code(), "LDK-2301");
        assert_eq!(notifier.open_count(), 0);
    }

    #[test]
    fn close_of_unknown_id_is_ignored() {
        let mut notifier = DesktopNotifier::new(10_000);
        notifier.close(NotificationId(42));
        assert_eq!(notifier.open_count(), 0);
    }
}
