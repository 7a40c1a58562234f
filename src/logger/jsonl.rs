//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object assembled in memory and handed
//! to the file in a single unbuffered `write_all`, so a tailing reader never
//! sees a partial line. When the file exceeds its size cap it is moved to
//! `<path>.1` (replacing any older copy) and a fresh file is started.
//!
//! If the file cannot be opened or written, lines go to stderr with a
//! `[LDK-JSONL]` prefix; if stderr fails too they are dropped.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{DeskError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Log event types of the desk activity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionStop,
    FetchApplied,
    FetchStale,
    FetchFailed,
    BadgesUpdated,
    Notification,
    DetailOpened,
    Error,
}

/// A single JSONL log entry. All fields are optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Section id (`pending`, `pending-approvals`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Fetch generation the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    /// Latest generation issued for the section (stale events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    /// Whether the fetch was a background poll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// LDK error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            section: None,
            generation: None,
            latest_generation: None,
            rows: None,
            changed: None,
            removed: None,
            auto_refresh: None,
            app_number: None,
            user: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Where lines currently go.
#[derive(Debug)]
enum Sink {
    File { file: File, len: u64 },
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Size at which the file is moved to `<path>.1`. Default: 5 MiB.
    pub max_size_bytes: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: crate::core::config::PathsConfig::default().activity_log,
            max_size_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Append-only JSONL writer with one rotated generation.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
}

impl JsonlWriter {
    /// Open (or create) the log file; on failure the writer starts on stderr.
    pub fn open(config: JsonlConfig) -> Self {
        let sink = match open_append(&config.path) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LDK-JSONL] {}; logging to stderr", e.user_message());
                Sink::Stderr
            }
        };
        Self { config, sink }
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LDK-JSONL] serialize error: {e}");
            }
        }
    }

    /// Push written lines to stable storage. Called once at shutdown.
    pub fn sync(&mut self) {
        if let Sink::File { file, .. } = &self.sink {
            let _ = file.sync_data();
        }
    }

    /// `"file"`, `"stderr"` or `"discard"`.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.sink {
            Sink::File { .. } => "file",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        let size = line.len() as u64;
        if let Sink::File { len, .. } = self.sink
            && len > 0
            && len + size > self.config.max_size_bytes
        {
            self.rotate();
        }

        match &mut self.sink {
            Sink::File { file, len } => match file.write_all(line.as_bytes()) {
                Ok(()) => *len += size,
                Err(e) => {
                    let _ = writeln!(io::stderr(), "[LDK-JSONL] write failed ({e}); logging to stderr");
                    self.sink = Sink::Stderr;
                    self.write_line(line);
                }
            },
            Sink::Stderr => {
                if write!(io::stderr(), "[LDK-JSONL] {line}").is_err() {
                    self.sink = Sink::Discard;
                }
            }
            Sink::Discard => {}
        }
    }

    fn rotate(&mut self) {
        self.sink = Sink::Discard;
        let path = &self.config.path;
        let _ = fs::rename(path, rotated_path(path));
        self.sink = open_append(path).unwrap_or_else(|e| {
            let _ = writeln!(io::stderr(), "[LDK-JSONL] {}; logging to stderr", e.user_message());
            Sink::Stderr
        });
    }
}

fn open_append(path: &Path) -> Result<Sink> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DeskError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DeskError::io(path, source))?;
    let len = file.metadata().map_or(0, |m| m.len());
    Ok(Sink::File { file, len })
}

/// `activity.jsonl` becomes `activity.jsonl.1`.
#[must_use]
pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
