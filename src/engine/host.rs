//! Host collaborators the engine renders into.
//!
//! Only the [`ViewSink`] is mandatory. Modals, toasts and desktop
//! notifications are optional capabilities fixed at composition time; the
//! engine skips whatever is absent.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::errors::Result;
use crate::engine::alerts::{DesktopNotification, NotificationId, Permission};
use crate::engine::badges::BadgeBoard;
use crate::model::application::ApplicationDetail;
use crate::model::section::Section;
use crate::table::view::SectionView;

/// Receives view-model updates. Called on the engine thread.
pub trait ViewSink: Send {
    /// The body, busy state or row markers of `section` changed.
    fn section_changed(&mut self, section: Section, view: &SectionView);

    fn badges_changed(&mut self, badges: &BadgeBoard);

    fn active_section_changed(&mut self, section: Section);
}

/// Opens application forms and detail views.
pub trait ModalHost: Send {
    /// New-application form; `Some` resumes an existing draft.
    fn open_new_application(&mut self, app_number: Option<&str>) -> Result<()>;

    fn open_application_view(&mut self, detail: &ApplicationDetail) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Transient user-facing messages.
pub trait ToastSink: Send {
    fn toast(&mut self, level: ToastLevel, message: &str);
}

/// Desktop notification capability.
pub trait Notifier: Send {
    fn permission(&self) -> Permission;

    /// Ask the user; returns the resulting permission.
    fn request_permission(&mut self) -> Permission;

    fn show(&mut self, notification: &DesktopNotification) -> Result<NotificationId>;

    /// Close a shown notification. Unknown ids are ignored.
    fn close(&mut self, id: NotificationId);

    /// Bring the desk window to the foreground.
    fn focus_window(&mut self);
}

/// The set of collaborators an engine is composed with.
pub struct Collaborators {
    pub view: Box<dyn ViewSink>,
    pub modals: Option<Box<dyn ModalHost>>,
    pub toasts: Option<Box<dyn ToastSink>>,
    pub notifier: Option<Box<dyn Notifier>>,
}

impl Collaborators {
    #[must_use]
    pub fn new(view: Box<dyn ViewSink>) -> Self {
        Self {
            view,
            modals: None,
            toasts: None,
            notifier: None,
        }
    }

    #[must_use]
    pub fn with_modals(mut self, modals: Box<dyn ModalHost>) -> Self {
        self.modals = Some(modals);
        self
    }

    #[must_use]
    pub fn with_toasts(mut self, toasts: Box<dyn ToastSink>) -> Self {
        self.toasts = Some(toasts);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub(crate) fn toast(&mut self, level: ToastLevel, message: &str) {
        if let Some(toasts) = self.toasts.as_mut() {
            toasts.toast(level, message);
        }
    }
}
