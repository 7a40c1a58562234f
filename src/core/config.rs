//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DeskError, Result};

/// Full loan desk configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub refresh: RefreshConfig,
    pub notifications: NotificationConfig,
    pub paths: PathsConfig,
}

/// Remote API endpoint and transport knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every route is joined onto, e.g. `http://localhost:3000/api`.
    pub base_url: String,
    /// Per-request timeout, connect through body.
    pub timeout_secs: u64,
}

/// Who the desk acts as. The `--user` flag takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub user: Option<String>,
}

/// Refresh scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Background poll period for the active section.
    pub poll_interval_ms: u64,
    /// Trailing-edge debounce window for manual refresh.
    pub debounce_ms: u64,
    /// How long a changed row keeps its highlight marker.
    pub highlight_ms: u64,
}

/// Desktop notification settings for newly assigned applications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Pending-count delta check period while the window is hidden.
    pub check_interval_ms: u64,
    /// Auto-dismiss delay for a shown notification.
    pub dismiss_after_ms: u64,
    pub title: String,
    pub icon: Option<String>,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            debounce_ms: 300,
            highlight_ms: 1_400,
        }
    }
}

impl RefreshConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: 30_000,
            dismiss_after_ms: 10_000,
            title: "New Application Assignment".to_string(),
            icon: None,
        }
    }
}

impl NotificationConfig {
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    #[must_use]
    pub const fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.dismiss_after_ms)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[LDK-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir
                .join(".config")
                .join("loan-desk")
                .join("config.toml"),
            activity_log: home_dir
                .join(".local")
                .join("share")
                .join("loan-desk")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path is not an error; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |name| env::var(name).ok())
    }

    /// [`Config::load`] with an injectable environment lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| DeskError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(DeskError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config for the activity log.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|error| DeskError::Serialization {
            context: "toml",
            details: error.to_string(),
        })
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = var("LDK_API_BASE_URL") {
            self.api.base_url = raw;
        }
        if let Some(raw) = var("LDK_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_env_u64("LDK_API_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = var("LDK_USER") {
            self.session.user = Some(raw);
        }
        for (name, slot) in [
            (
                "LDK_REFRESH_POLL_INTERVAL_MS",
                &mut self.refresh.poll_interval_ms,
            ),
            ("LDK_REFRESH_DEBOUNCE_MS", &mut self.refresh.debounce_ms),
            ("LDK_REFRESH_HIGHLIGHT_MS", &mut self.refresh.highlight_ms),
            (
                "LDK_NOTIFICATIONS_CHECK_INTERVAL_MS",
                &mut self.notifications.check_interval_ms,
            ),
            (
                "LDK_NOTIFICATIONS_DISMISS_AFTER_MS",
                &mut self.notifications.dismiss_after_ms,
            ),
        ] {
            if let Some(raw) = var(name) {
                *slot = parse_env_u64(name, &raw)?;
            }
        }
        if let Some(raw) = var("LDK_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_env_bool("LDK_NOTIFICATIONS_ENABLED", &raw)?;
        }
        if let Some(raw) = var("LDK_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }
        Ok(())
    }

    fn normalize(&mut self) {
        while self.api.base_url.len() > 1 && self.api.base_url.ends_with('/') {
            self.api.base_url.pop();
        }
        if let Some(user) = self.session.user.take() {
            let trimmed = user.trim();
            if !trimmed.is_empty() {
                self.session.user = Some(trimmed.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(DeskError::InvalidConfig {
                details: format!(
                    "api.base_url must be an http(s) URL, got {:?}",
                    self.api.base_url
                ),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(DeskError::InvalidConfig {
                details: "api.timeout_secs must be > 0".to_string(),
            });
        }
        if self.refresh.poll_interval_ms < 1_000 {
            return Err(DeskError::InvalidConfig {
                details: format!(
                    "refresh.poll_interval_ms must be >= 1000, got {}",
                    self.refresh.poll_interval_ms
                ),
            });
        }
        if self.refresh.debounce_ms >= self.refresh.poll_interval_ms {
            return Err(DeskError::InvalidConfig {
                details: format!(
                    "refresh.debounce_ms ({}) must be shorter than refresh.poll_interval_ms ({})",
                    self.refresh.debounce_ms, self.refresh.poll_interval_ms
                ),
            });
        }
        if self.refresh.highlight_ms == 0 {
            return Err(DeskError::InvalidConfig {
                details: "refresh.highlight_ms must be > 0".to_string(),
            });
        }
        if self.notifications.check_interval_ms < 1_000 {
            return Err(DeskError::InvalidConfig {
                details: format!(
                    "notifications.check_interval_ms must be >= 1000, got {}",
                    self.notifications.check_interval_ms
                ),
            });
        }
        if self.notifications.dismiss_after_ms == 0 {
            return Err(DeskError::InvalidConfig {
                details: "notifications.dismiss_after_ms must be > 0".to_string(),
            });
        }
        if self.notifications.title.trim().is_empty() {
            return Err(DeskError::InvalidConfig {
                details: "notifications.title must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| DeskError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DeskError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DeskError};
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_desk_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.refresh.poll_interval_ms, 60_000);
        assert_eq!(cfg.refresh.debounce_ms, 300);
        assert_eq!(cfg.refresh.highlight_ms, 1_400);
        assert_eq!(cfg.notifications.check_interval_ms, 30_000);
        assert_eq!(cfg.notifications.dismiss_after_ms, 10_000);
        assert_eq!(cfg.notifications.title, "New Application Assignment");
    }

    #[test]
    fn load_reads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://loans.example.com/api/\"\n\n[session]\nuser = \" alice \"\n",
        )
        .unwrap();

        let cfg = Config::load_with(Some(&path), no_env).unwrap();
        assert_eq!(cfg.api.base_url, "https://loans.example.com/api");
        assert_eq!(cfg.session.user.as_deref(), Some("alice"));
        assert_eq!(cfg.refresh.poll_interval_ms, 60_000);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[refresh]\npoll_interval_ms = 5000\n").unwrap();
        let env = vars(&[
            ("LDK_REFRESH_POLL_INTERVAL_MS", "20000"),
            ("LDK_USER", "bob"),
            ("LDK_NOTIFICATIONS_ENABLED", "off"),
            ("LDK_API_TIMEOUT_SECS", "  "),
        ]);

        let cfg = Config::load_with(Some(&path), |name| env.get(name).cloned()).unwrap();
        assert_eq!(cfg.refresh.poll_interval_ms, 20_000);
        assert_eq!(cfg.session.user.as_deref(), Some("bob"));
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.api.timeout_secs, 15, "blank env values are ignored");
    }

    #[test]
    fn env_invalid_number_rejected() {
        let env = vars(&[("LDK_REFRESH_DEBOUNCE_MS", "soon")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let err = Config::load_with(Some(&path), |name| env.get(name).cloned()).unwrap_err();
        assert!(matches!(err, DeskError::ConfigParse { context: "env", .. }));
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = Config::load_with(Some(Path::new("/nonexistent/ldk/config.toml")), no_env)
            .unwrap_err();
        assert!(matches!(err, DeskError::MissingConfig { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[refresh\npoll = ").unwrap();
        let err = Config::load_with(Some(&path), no_env).unwrap_err();
        assert_eq!(err.code(), "LDK-1003");
    }

    #[test]
    fn non_http_base_url_rejected() {
        let mut cfg = Config::default();
        cfg.api.base_url = "ftp://example.com".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn debounce_must_be_shorter_than_poll() {
        let mut cfg = Config::default();
        cfg.refresh.poll_interval_ms = 1_000;
        cfg.refresh.debounce_ms = 1_000;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("debounce_ms"));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let mut modified = Config::default();
        modified.refresh.highlight_ms += 1;
        assert_ne!(cfg.stable_hash().unwrap(), modified.stable_hash().unwrap());
        assert_eq!(cfg.stable_hash().unwrap(), cfg.stable_hash().unwrap());
    }

    #[test]
    fn toml_rendering_round_trips() {
        let cfg = Config::default();
        let rendered = cfg.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, cfg);
    }
}
