//! Refresh controller: the single owner of every table, timer and counter.
//!
//! The controller is deterministic. It never sleeps, spawns or calls the
//! API; every entry point takes the current `Instant`, and API work leaves as
//! [`FetchJob`]s (see [`Controller::drain_jobs`]) and returns as
//! [`FetchOutcome`]s (see [`Controller::apply`]). The runtime thread owns the
//! clock and the workers; tests drive it by hand.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use crate::api::ApplicationApi;
use crate::core::config::{Config, NotificationConfig, RefreshConfig};
use crate::core::errors::{DeskError, Result};
use crate::engine::alerts::{DesktopNotification, NotificationId, PendingDeltaTracker, Permission};
use crate::engine::badges::BadgeBoard;
use crate::engine::host::{Collaborators, ToastLevel};
use crate::engine::jobs::{
    CountPurpose, FetchDisposition, FetchJob, FetchOptions, FetchOutcome, JobKind, OutcomeKind,
};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::model::application::{ApiResponse, ApplicationDetail, ApplicationRecord};
use crate::model::section::Section;
use crate::model::users::Session;
use crate::sync::sequencer::{FetchToken, Sequencer};
use crate::sync::timers::{DeadlineQueue, Debouncer, IntervalTimer, earliest};
use crate::table::reconcile::{RowId, RowIds, reconcile};
use crate::table::view::{Busy, SectionBody, SectionView};

// ──────────────────── user-facing messages ────────────────────

pub const MSG_INVALID_APP_NUMBER: &str = "Invalid application number";
pub const MSG_FORM_FAILED: &str = "Failed to load form.";
pub const MSG_VIEW_FAILED: &str = "Failed to load view modal. Please refresh the page.";
pub const MSG_NEW_FORM_FAILED: &str = "Failed to load application form. Please refresh the page.";

// ──────────────────── settings ────────────────────

/// Timing and notification knobs, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub highlight: Duration,
    pub notifications_enabled: bool,
    pub check_interval: Duration,
    pub dismiss_after: Duration,
    pub notification_title: String,
    pub notification_icon: Option<String>,
}

impl ControllerSettings {
    #[must_use]
    pub fn new(refresh: &RefreshConfig, notifications: &NotificationConfig) -> Self {
        Self {
            debounce: refresh.debounce(),
            poll_interval: refresh.poll_interval(),
            highlight: refresh.highlight(),
            notifications_enabled: notifications.enabled,
            check_interval: notifications.check_interval(),
            dismiss_after: notifications.dismiss_after(),
            notification_title: notifications.title.clone(),
            notification_icon: notifications.icon.clone(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.refresh, &config.notifications)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::new(&RefreshConfig::default(), &NotificationConfig::default())
    }
}

// ──────────────────── controller ────────────────────

pub struct Controller {
    settings: ControllerSettings,
    host: Collaborators,
    log: ActivityLoggerHandle,

    session: Option<Session>,
    session_active: bool,
    /// Bumped on teardown; completions from an older epoch are inert.
    epoch: u64,
    active: Section,
    visible: bool,

    views: [SectionView; 4],
    ids: RowIds,
    sequencer: Sequencer,
    badges: BadgeBoard,
    tracker: PendingDeltaTracker,

    refresh_debounce: Debouncer<Section>,
    poll: IntervalTimer,
    delta_check: IntervalTimer,
    highlights: DeadlineQueue<(Section, RowId)>,
    dismissals: DeadlineQueue<NotificationId>,

    jobs: Vec<FetchJob>,
}

impl Controller {
    #[must_use]
    pub fn new(settings: ControllerSettings, host: Collaborators, log: ActivityLoggerHandle) -> Self {
        Self {
            refresh_debounce: Debouncer::new(settings.debounce),
            poll: IntervalTimer::new(settings.poll_interval),
            delta_check: IntervalTimer::new(settings.check_interval),
            settings,
            host,
            log,
            session: None,
            session_active: false,
            epoch: 0,
            active: Section::Pending,
            visible: true,
            views: Default::default(),
            ids: RowIds::new(),
            sequencer: Sequencer::new(),
            badges: BadgeBoard::new(),
            tracker: PendingDeltaTracker::new(),
            highlights: DeadlineQueue::new(),
            dismissals: DeadlineQueue::new(),
            jobs: Vec::new(),
        }
    }

    // ──────────────────── accessors ────────────────────

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn is_session_active(&self) -> bool {
        self.session_active
    }

    #[must_use]
    pub const fn active_section(&self) -> Section {
        self.active
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn view(&self, section: Section) -> &SectionView {
        &self.views[section.index()]
    }

    #[must_use]
    pub const fn badges(&self) -> &BadgeBoard {
        &self.badges
    }

    #[must_use]
    pub const fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.poll.is_armed()
    }

    #[must_use]
    pub const fn is_checking_notifications(&self) -> bool {
        self.delta_check.is_armed()
    }

    #[must_use]
    pub const fn notification_baseline(&self) -> u64 {
        self.tracker.baseline()
    }

    /// Earliest timer deadline, if any timer is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.refresh_debounce.deadline(),
            self.poll.deadline(),
            self.delta_check.deadline(),
            self.highlights.deadline(),
            self.dismissals.deadline(),
        ])
    }

    /// Hand the queued API work to the caller.
    pub fn drain_jobs(&mut self) -> Vec<FetchJob> {
        std::mem::take(&mut self.jobs)
    }

    // ──────────────────── operations ────────────────────

    /// Adopt the signed-in user. A different user starts from a zero
    /// notification baseline.
    pub fn set_session(&mut self, session: Session) {
        if self.session.as_ref().is_none_or(|s| s.user != session.user) {
            self.tracker.reset();
        }
        self.session = Some(session);
    }

    /// Debounced manual refresh. A burst of calls loads once, after the
    /// quiet window, for the section of the last call.
    pub fn refresh(&mut self, now: Instant, section: Section) {
        self.refresh_debounce.trigger(now, section);
    }

    /// Activate `section` and load it immediately with the loading placeholder.
    pub fn show_section(&mut self, section: Section) {
        self.activate(section);
        self.load_section(section, FetchOptions::MANUAL);
    }

    /// Start the signed-in desk: load `pending`, fetch badges and the
    /// notification baseline, arm the poll and the notification check.
    /// Calling it again restarts every timer rather than adding one.
    pub fn initialize_and_start_polling(&mut self, now: Instant) -> Result<()> {
        if self.session.is_none() {
            return Err(DeskError::NoSession {
                details: "sign in before starting the desk".to_string(),
            });
        }
        self.session_active = true;
        self.activate(Section::Pending);
        self.load_section(Section::Pending, FetchOptions::MANUAL);
        self.queue_badge_refresh();
        self.queue_user_count(CountPurpose::Baseline);
        self.poll.arm(now);
        self.setup_notifications(now);
        Ok(())
    }

    /// Window visibility changed. Ignored while the session is inactive.
    pub fn set_visibility(&mut self, now: Instant, visible: bool) {
        self.visible = visible;
        if !self.session_active {
            return;
        }
        if visible {
            self.refresh(now, self.active);
            self.queue_user_count(CountPurpose::Badge);
        } else {
            self.queue_user_count(CountPurpose::Baseline);
        }
    }

    /// The user picked an application number in one of the tables.
    pub fn on_application_number_activated(&mut self, app_number: &str) {
        let app_number = app_number.trim();
        if app_number.is_empty() {
            self.host.toast(ToastLevel::Error, MSG_INVALID_APP_NUMBER);
            return;
        }

        let holder = if self.view(self.active).contains_key(app_number) {
            Some(self.active)
        } else {
            Section::ALL
                .into_iter()
                .find(|s| self.view(*s).contains_key(app_number))
        };
        if let Some(section) = holder {
            self.views[section.index()].opening = Some(app_number.to_string());
            self.publish_section(section);
        }

        let user = self
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .unwrap_or_default();
        self.push_job(JobKind::Details {
            app_number: app_number.to_string(),
            user,
        });
    }

    /// Open an empty new-application form.
    pub fn open_new_application(&mut self) {
        let opened = match self.host.modals.as_mut() {
            Some(modals) => modals.open_new_application(None),
            None => Err(missing_modal_host()),
        };
        if let Err(err) = opened {
            self.log_error(&err);
            self.host.toast(ToastLevel::Error, MSG_NEW_FORM_FAILED);
        }
    }

    /// A shown notification was clicked: close it, focus the window and
    /// refresh the active section.
    pub fn notification_clicked(&mut self, now: Instant, id: NotificationId) {
        if let Some(notifier) = self.host.notifier.as_mut() {
            notifier.close(id);
            notifier.focus_window();
        }
        self.dismissals.cancel_where(|pending| *pending == id);
        self.refresh(now, self.active);
    }

    /// Stop every timer, make in-flight work inert and drop opening markers.
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.poll.disarm();
        self.delta_check.disarm();
        self.refresh_debounce.cancel();
        self.highlights.clear();
        self.dismissals.clear();
        self.sequencer.invalidate_all();
        self.jobs.clear();
        self.epoch += 1;
        self.session_active = false;
        self.clear_opening(|_| true);
    }

    /// Fire whatever timers are due at `now`.
    pub fn on_tick(&mut self, now: Instant) {
        if let Some(section) = self.refresh_debounce.fire_if_due(now) {
            self.load_section(section, FetchOptions::MANUAL);
            self.queue_badge_refresh();
        }

        if self.poll.fire_if_due(now) {
            self.load_section(self.active, FetchOptions::AUTO);
            self.queue_badge_refresh();
        }

        if self.delta_check.fire_if_due(now) && !self.visible {
            self.queue_user_count(CountPurpose::DeltaCheck);
        }

        for (section, id) in self.highlights.drain_due(now) {
            if self.views[section.index()].clear_highlight(id) {
                self.publish_section(section);
            }
        }

        let expired = self.dismissals.drain_due(now);
        if let Some(notifier) = self.host.notifier.as_mut() {
            for id in expired {
                notifier.close(id);
            }
        }
    }

    /// Apply a completion. Results from a superseded fetch or an earlier
    /// session epoch change nothing, except that a late details result still
    /// releases its row's opening marker.
    pub fn apply(&mut self, now: Instant, outcome: FetchOutcome) -> FetchDisposition {
        if outcome.epoch != self.epoch {
            match &outcome.kind {
                OutcomeKind::Section { token, .. } => self.log_stale(*token),
                OutcomeKind::Details { app_number, .. } => {
                    self.clear_opening(|opening| *app_number == opening);
                }
                OutcomeKind::Counts(_) | OutcomeKind::UserCount { .. } => {}
            }
            return FetchDisposition::Stale;
        }
        match outcome.kind {
            OutcomeKind::Section {
                token,
                options,
                result,
            } => self.apply_section(now, token, options, result),
            OutcomeKind::Counts(result) => match result {
                Ok(counts) => {
                    self.badges.apply_counts(&counts);
                    self.publish_badges();
                    FetchDisposition::Applied
                }
                Err(err) => {
                    self.log_error(&err);
                    FetchDisposition::Failed
                }
            },
            OutcomeKind::UserCount { purpose, result } => match result {
                Ok(count) => {
                    match purpose {
                        CountPurpose::Badge => {
                            self.badges.apply_user_count(count);
                            self.publish_badges();
                        }
                        CountPurpose::Baseline => self.tracker.set_baseline(count),
                        CountPurpose::DeltaCheck => self.check_new_assignments(now, count),
                    }
                    FetchDisposition::Applied
                }
                Err(err) => {
                    self.log_error(&err);
                    FetchDisposition::Failed
                }
            },
            OutcomeKind::Details { app_number, result } => {
                self.apply_details(&app_number, result)
            }
        }
    }

    /// Execute queued jobs inline until none remain. Blocking; meant for
    /// one-shot commands and tests.
    pub fn run_jobs_inline(&mut self, now: Instant, api: &dyn ApplicationApi) {
        loop {
            let jobs = self.drain_jobs();
            if jobs.is_empty() {
                break;
            }
            for job in jobs {
                let outcome = job.execute(api);
                self.apply(now, outcome);
            }
        }
    }

    // ──────────────────── internals ────────────────────

    fn activate(&mut self, section: Section) {
        self.active = section;
        self.host.view.active_section_changed(section);
    }

    fn push_job(&mut self, kind: JobKind) {
        self.jobs.push(FetchJob {
            epoch: self.epoch,
            kind,
        });
    }

    fn load_section(&mut self, section: Section, options: FetchOptions) {
        let token = self.sequencer.begin_fetch(section);
        self.views[section.index()].begin_fetch(options);
        self.publish_section(section);
        self.push_job(JobKind::Section {
            token,
            stage: section.stage(),
            options,
        });
    }

    fn queue_badge_refresh(&mut self) {
        self.push_job(JobKind::Counts);
        self.queue_user_count(CountPurpose::Badge);
    }

    fn queue_user_count(&mut self, purpose: CountPurpose) {
        if let Some(user) = self.session.as_ref().map(|s| s.user.clone()) {
            self.push_job(JobKind::UserCount { user, purpose });
        }
    }

    fn setup_notifications(&mut self, now: Instant) {
        let granted = self.settings.notifications_enabled
            && self.host.notifier.as_mut().is_some_and(|notifier| {
                let mut permission = notifier.permission();
                if permission == Permission::Default {
                    permission = notifier.request_permission();
                }
                permission == Permission::Granted
            });
        if granted {
            self.delta_check.arm(now);
        } else {
            self.delta_check.disarm();
        }
    }

    fn apply_section(
        &mut self,
        now: Instant,
        token: FetchToken,
        options: FetchOptions,
        result: Result<Vec<ApplicationRecord>>,
    ) -> FetchDisposition {
        let section = token.section;
        if !self.sequencer.settle(token) {
            self.log_stale(token);
            return FetchDisposition::Stale;
        }

        let view = &mut self.views[section.index()];
        view.busy = Busy::Idle;
        view.header_spinner = false;

        let disposition = match result {
            Ok(records) => {
                let pass = reconcile(view.take_rows(), &records, &mut self.ids);
                let expires = now + self.settings.highlight;
                for id in &pass.changed {
                    self.highlights.schedule(expires, (section, *id));
                }
                self.log.send(ActivityEvent::FetchApplied {
                    section,
                    generation: token.generation,
                    auto_refresh: options.auto_refresh,
                    rows: pass.rows.len(),
                    changed: pass.changed.len(),
                    removed: pass.removed,
                });
                view.body = SectionBody::Rows(pass.rows);
                FetchDisposition::Applied
            }
            Err(err) => {
                self.log.send(ActivityEvent::FetchFailed {
                    section,
                    generation: token.generation,
                    auto_refresh: options.auto_refresh,
                    error_code: err.code().to_string(),
                    error_message: err.user_message(),
                });
                if !options.auto_refresh {
                    view.body = SectionBody::Error(err.user_message());
                }
                FetchDisposition::Failed
            }
        };
        self.publish_section(section);
        disposition
    }

    fn apply_details(
        &mut self,
        app_number: &str,
        result: Result<ApiResponse<ApplicationDetail>>,
    ) -> FetchDisposition {
        self.clear_opening(|opening| opening == app_number);

        match result {
            Ok(ApiResponse {
                success: true,
                data: Some(detail),
                ..
            }) => {
                let (opened, failure_message) = if detail.is_new_draft() {
                    let opened = match self.host.modals.as_mut() {
                        Some(modals) => modals.open_new_application(Some(app_number)),
                        None => Err(missing_modal_host()),
                    };
                    (opened, MSG_FORM_FAILED)
                } else {
                    let opened = match self.host.modals.as_mut() {
                        Some(modals) => modals.open_application_view(&detail),
                        None => Err(missing_modal_host()),
                    };
                    (opened, MSG_VIEW_FAILED)
                };
                match opened {
                    Ok(()) => {
                        self.log.send(ActivityEvent::DetailOpened {
                            app_number: app_number.to_string(),
                            ok: true,
                            details: detail.status.as_ref().map(ToString::to_string),
                        });
                        FetchDisposition::Applied
                    }
                    Err(err) => {
                        self.log_error(&err);
                        self.host.toast(ToastLevel::Error, failure_message);
                        FetchDisposition::Failed
                    }
                }
            }
            Ok(response) => {
                let message = response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Not found".to_string());
                self.log.send(ActivityEvent::DetailOpened {
                    app_number: app_number.to_string(),
                    ok: false,
                    details: Some(message.clone()),
                });
                self.host.toast(
                    ToastLevel::Error,
                    &format!("Failed to load application: {message}"),
                );
                FetchDisposition::Failed
            }
            Err(err) => {
                self.log_error(&err);
                self.host.toast(
                    ToastLevel::Error,
                    &format!("Error loading application details: {}", err.user_message()),
                );
                FetchDisposition::Failed
            }
        }
    }

    fn check_new_assignments(&mut self, now: Instant, current: u64) {
        let Some(delta) = self.tracker.observe(current) else {
            return;
        };
        let (Some(session), Some(notifier)) = (self.session.as_ref(), self.host.notifier.as_mut())
        else {
            return;
        };
        if notifier.permission() != Permission::Granted {
            return;
        }

        let notification = DesktopNotification::new_assignments(
            &self.settings.notification_title,
            self.settings.notification_icon.as_deref(),
            &session.user,
            delta,
            session.role.as_deref(),
        );
        match notifier.show(&notification) {
            Ok(id) => {
                self.dismissals
                    .schedule(now + self.settings.dismiss_after, id);
                self.log.send(ActivityEvent::NotificationShown {
                    user: session.user.clone(),
                    count: delta,
                });
            }
            Err(err) => self.log_error(&err),
        }
    }

    /// Drop the inline opening marker from every section whose marker
    /// matches, publishing the sections that changed.
    fn clear_opening(&mut self, matches: impl Fn(&str) -> bool) {
        for section in Section::ALL {
            let view = &mut self.views[section.index()];
            if view.opening.as_deref().is_some_and(&matches) {
                view.opening = None;
                self.publish_section(section);
            }
        }
    }

    fn publish_section(&mut self, section: Section) {
        self.host
            .view
            .section_changed(section, &self.views[section.index()]);
    }

    fn publish_badges(&mut self) {
        self.host.view.badges_changed(&self.badges);
        self.log.send(ActivityEvent::BadgesUpdated {
            details: self.badges.summary(),
        });
    }

    fn log_stale(&self, token: FetchToken) {
        self.log.send(ActivityEvent::FetchStale {
            section: token.section,
            generation: token.generation,
            latest_generation: self.sequencer.state(token.section).generation,
        });
    }

    fn log_error(&self, err: &DeskError) {
        self.log.send(ActivityEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }
}

fn missing_modal_host() -> DeskError {
    DeskError::Collaborator {
        collaborator: "modal host",
        details: "no modal host configured".to_string(),
    }
}
