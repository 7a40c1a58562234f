//! LDK-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DeskError>;

/// Top-level error type for the loan desk client.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("[LDK-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LDK-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LDK-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LDK-1101] unknown section: {section:?}")]
    UnknownSection { section: String },

    #[error("[LDK-1102] no active session: {details}")]
    NoSession { details: String },

    #[error("[LDK-2001] transport failure calling {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("[LDK-2002] server rejected {endpoint}: {message}")]
    Server { endpoint: String, message: String },

    #[error("[LDK-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LDK-2201] missing view target {target}")]
    Integrity { target: String },

    #[error("[LDK-2301] collaborator {collaborator} failed: {details}")]
    Collaborator {
        collaborator: &'static str,
        details: String,
    },

    #[error("[LDK-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LDK-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[LDK-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl DeskError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LDK-1001",
            Self::MissingConfig { .. } => "LDK-1002",
            Self::ConfigParse { .. } => "LDK-1003",
            Self::UnknownSection { .. } => "LDK-1101",
            Self::NoSession { .. } => "LDK-1102",
            Self::Transport { .. } => "LDK-2001",
            Self::Server { .. } => "LDK-2002",
            Self::Serialization { .. } => "LDK-2101",
            Self::Integrity { .. } => "LDK-2201",
            Self::Collaborator { .. } => "LDK-2301",
            Self::Io { .. } => "LDK-3002",
            Self::ChannelClosed { .. } => "LDK-3003",
            Self::Runtime { .. } => "LDK-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Message suitable for an inline error row or toast. Server rejections
    /// surface the server's own text without the code prefix.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Server { message, .. } => message.clone(),
            Self::Transport { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DeskError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
