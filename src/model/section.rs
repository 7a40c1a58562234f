//! Workflow stages and the four application list sections that mirror them.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::DeskError;

/// Approval workflow stage as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    New,
    Pending,
    PendingApproval,
    Approved,
    /// A stage label this client does not know about. Preserved verbatim.
    Other(String),
}

impl Stage {
    /// Wire label, e.g. `PENDING_APPROVAL`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Other(raw) => raw,
        }
    }

    /// Parse a wire label. Unknown labels map to [`Stage::Other`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "NEW" => Self::New,
            "PENDING" => Self::Pending,
            "PENDING_APPROVAL" => Self::PendingApproval,
            "APPROVED" => Self::Approved,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// One of the four application lists shown on the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    New,
    Pending,
    PendingApprovals,
    Approved,
}

impl Section {
    /// All sections in display order.
    pub const ALL: [Self; 4] = [
        Self::New,
        Self::Pending,
        Self::PendingApprovals,
        Self::Approved,
    ];

    /// Section identifier used by hosts (`pending-approvals`, ...).
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::PendingApprovals => "pending-approvals",
            Self::Approved => "approved",
        }
    }

    /// Human label for headers.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Pending => "Pending",
            Self::PendingApprovals => "Pending Approvals",
            Self::Approved => "Approved",
        }
    }

    /// Stage whose applications this section lists.
    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::New => Stage::New,
            Self::Pending => Stage::Pending,
            Self::PendingApprovals => Stage::PendingApproval,
            Self::Approved => Stage::Approved,
        }
    }

    /// Section listing the given stage, if any.
    #[must_use]
    pub fn for_stage(stage: &Stage) -> Option<Self> {
        match stage {
            Stage::New => Some(Self::New),
            Stage::Pending => Some(Self::Pending),
            Stage::PendingApproval => Some(Self::PendingApprovals),
            Stage::Approved => Some(Self::Approved),
            Stage::Other(_) => None,
        }
    }

    /// Zero-based position in [`Section::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::New => 0,
            Self::Pending => 1,
            Self::PendingApprovals => 2,
            Self::Approved => 3,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Section {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.id() == s)
            .ok_or_else(|| DeskError::UnknownSection {
                section: s.to_string(),
            })
    }
}
