//! Server snapshots of loan applications and the envelopes they arrive in.

#![allow(missing_docs)]

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::{DeskError, Result};
use crate::model::section::{Section, Stage};

/// One loan application as listed by the server. Immutable snapshot; the
/// client never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Unique key, stable across refreshes.
    #[serde(default)]
    pub app_number: String,
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub current_stage: Option<Stage>,
    /// Role expected to act next.
    #[serde(default, alias = "actionByRole")]
    pub action_by: Option<String>,
}

impl ApplicationRecord {
    /// Minimal record for tests and fixtures.
    #[must_use]
    pub fn new(app_number: impl Into<String>) -> Self {
        Self {
            app_number: app_number.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn with_applicant(mut self, name: impl Into<String>) -> Self {
        self.applicant_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    #[must_use]
    pub fn with_action_by(mut self, role: impl Into<String>) -> Self {
        self.action_by = Some(role.into());
        self
    }
}

/// Amounts arrive either as JSON numbers or numeric strings.
fn de_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    })
}

/// Per-category totals shown on the section badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationCounts {
    pub new: u64,
    pub pending: u64,
    pub pending_approvals: u64,
    pub approved: u64,
}

impl ApplicationCounts {
    /// Count for one section.
    #[must_use]
    pub const fn for_section(&self, section: Section) -> u64 {
        match section {
            Section::New => self.new,
            Section::Pending => self.pending,
            Section::PendingApprovals => self.pending_approvals,
            Section::Approved => self.approved,
        }
    }
}

/// Full application as returned by the detail endpoint. Only the fields the
/// client branches on are typed; the rest is carried through to the modal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(default)]
    pub app_number: String,
    #[serde(default)]
    pub status: Option<Stage>,
    #[serde(default)]
    pub completion_status: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ApplicationDetail {
    /// A draft in the NEW stage reopens the application form instead of the
    /// read-only view.
    #[must_use]
    pub fn is_new_draft(&self) -> bool {
        self.status == Some(Stage::New)
            && self
                .completion_status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("draft"))
    }
}

/// Standard `{success, data, message}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Split the envelope: `success:false` becomes a `Server` error carrying
    /// the server message, or `fallback` when the server sent none.
    pub fn into_result(self, endpoint: &str, fallback: &str) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(DeskError::Server {
                endpoint: endpoint.to_string(),
                message: self
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            })
        }
    }
}

/// Applications awaiting the given user's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserPendingCount {
    #[serde(default)]
    pub count: u64,
}
