//! Activity logger: a dedicated thread owns the [`JsonlWriter`].
//!
//! The engine and CLI send `ActivityEvent`s over a bounded crossbeam channel.
//! `try_send()` keeps the engine loop from ever blocking on log back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{DeskError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::model::section::Section;

// ──────────────────── channel capacity ────────────────────

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events recorded in the activity log.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        user: String,
        version: String,
        config_hash: String,
    },
    SessionStopped {
        reason: String,
        uptime_secs: u64,
    },
    /// A current fetch result was reconciled into its table.
    FetchApplied {
        section: Section,
        generation: u64,
        auto_refresh: bool,
        rows: usize,
        changed: usize,
        removed: usize,
    },
    /// A completion arrived after a newer fetch was issued and was ignored.
    FetchStale {
        section: Section,
        generation: u64,
        latest_generation: u64,
    },
    FetchFailed {
        section: Section,
        generation: u64,
        auto_refresh: bool,
        error_code: String,
        error_message: String,
    },
    BadgesUpdated {
        details: String,
    },
    NotificationShown {
        user: String,
        count: u64,
    },
    DetailOpened {
        app_number: String,
        ok: bool,
        details: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Handle whose events go nowhere. One-shot CLI commands use this when
    /// the activity log is not wanted.
    #[must_use]
    pub fn discard() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send an event to the logger thread. Non-blocking; a full channel
    /// drops the event and bumps the dropped counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── configuration ────────────────────

#[derive(Default)]
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    /// Bounded channel capacity; zero means the default.
    pub channel_capacity: usize,
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until `shutdown()` or until every
/// handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let capacity = if config.channel_capacity == 0 {
        CHANNEL_CAPACITY
    } else {
        config.channel_capacity
    };
    let (tx, rx) = bounded::<ActivityEvent>(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let jsonl_config = config.jsonl_config;
    let join = thread::Builder::new()
        .name("ldk-logger".to_string())
        .spawn(move || logger_thread_main(rx, jsonl_config, dropped_clone))
        .map_err(|e| DeskError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

#[allow(clippy::needless_pass_by_value)]
fn logger_thread_main(rx: Receiver<ActivityEvent>, config: JsonlConfig, dropped: Arc<AtomicU64>) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.sync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted {
            user,
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.user = Some(user.clone());
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::SessionStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::SessionStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::FetchApplied {
            section,
            generation,
            auto_refresh,
            rows,
            changed,
            removed,
        } => {
            let mut e = LogEntry::new(EventType::FetchApplied, Severity::Debug);
            e.section = Some(section.id().to_string());
            e.generation = Some(*generation);
            e.auto_refresh = Some(*auto_refresh);
            e.rows = Some(*rows);
            e.changed = Some(*changed);
            e.removed = Some(*removed);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FetchStale {
            section,
            generation,
            latest_generation,
        } => {
            let mut e = LogEntry::new(EventType::FetchStale, Severity::Debug);
            e.section = Some(section.id().to_string());
            e.generation = Some(*generation);
            e.latest_generation = Some(*latest_generation);
            e
        }
        ActivityEvent::FetchFailed {
            section,
            generation,
            auto_refresh,
            error_code,
            error_message,
        } => {
            let severity = if *auto_refresh {
                Severity::Warning
            } else {
                Severity::Error
            };
            let mut e = LogEntry::new(EventType::FetchFailed, severity);
            e.section = Some(section.id().to_string());
            e.generation = Some(*generation);
            e.auto_refresh = Some(*auto_refresh);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::BadgesUpdated { details } => {
            let mut e = LogEntry::new(EventType::BadgesUpdated, Severity::Debug);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::NotificationShown { user, count } => {
            let mut e = LogEntry::new(EventType::Notification, Severity::Info);
            e.user = Some(user.clone());
            e.details = Some(format!("pending={count}"));
            e
        }
        ActivityEvent::DetailOpened {
            app_number,
            ok,
            details,
        } => {
            let severity = if *ok { Severity::Info } else { Severity::Warning };
            let mut e = LogEntry::new(EventType::DetailOpened, severity);
            e.app_number = Some(app_number.clone());
            e.ok = Some(*ok);
            e.details.clone_from(details);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::SessionStop, Severity::Info),
    }
}
