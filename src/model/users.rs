//! Desk users, roles and the login session.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DeskError, Result};

/// Known desk roles. Each carries the approval level it is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    HeadOfCredit,
    CreditOfficer,
    Amlro,
    BranchManagerApprover,
    Approver,
}

impl Role {
    pub const ALL: [Self; 6] = [
        Self::Admin,
        Self::HeadOfCredit,
        Self::CreditOfficer,
        Self::Amlro,
        Self::BranchManagerApprover,
        Self::Approver,
    ];

    /// Display label, identical to the server's role string.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::HeadOfCredit => "Head of Credit",
            Self::CreditOfficer => "Credit Officer",
            Self::Amlro => "AMLRO",
            Self::BranchManagerApprover => "Branch Manager/Approver",
            Self::Approver => "Approver",
        }
    }

    /// Level assigned to a new user with this role.
    #[must_use]
    pub const fn default_level(self) -> u8 {
        match self {
            Self::Admin => 5,
            Self::HeadOfCredit | Self::Amlro => 2,
            Self::CreditOfficer => 1,
            Self::BranchManagerApprover => 3,
            Self::Approver => 4,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DeskError::InvalidConfig {
                details: format!("unknown role {wanted:?}"),
            })
    }
}

/// A user account as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_level")]
    pub level: Option<u8>,
    #[serde(default)]
    pub role: String,
}

fn de_level<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u8>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Payload for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub level: u8,
    pub role: String,
}

impl NewUser {
    /// Build a new-user request. The level defaults to the role's level.
    pub fn new(name: &str, role: Role, level: Option<u8>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DeskError::InvalidConfig {
                details: "user name must not be empty".to_string(),
            });
        }
        let level = level.unwrap_or_else(|| role.default_level());
        if level == 0 {
            return Err(DeskError::InvalidConfig {
                details: "user level must be at least 1".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            level,
            role: role.label().to_string(),
        })
    }
}

/// Role and level returned on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoginUser {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "de_level")]
    pub level: Option<u8>,
}

/// Login envelope: `{success, user, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Signed-in desk user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub role: Option<String>,
    pub level: Option<u8>,
}

impl Session {
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: None,
            level: None,
        }
    }

    /// Session from a successful login response.
    pub fn from_login(user: &str, response: LoginResponse) -> Result<Self> {
        if !response.success {
            return Err(DeskError::Server {
                endpoint: "login".to_string(),
                message: response
                    .message
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            });
        }
        let details = response.user.unwrap_or_default();
        Ok(Self {
            user: user.to_string(),
            role: details.role.filter(|r| !r.is_empty()),
            level: details.level,
        })
    }

    /// `name (role)` when the role is known.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.role {
            Some(role) => format!("{} ({role})", self.user),
            None => self.user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_levels_match_desk_policy() {
        let levels: Vec<(&str, u8)> = Role::ALL
            .iter()
            .map(|r| (r.label(), r.default_level()))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("Admin", 5),
                ("Head of Credit", 2),
                ("Credit Officer", 1),
                ("AMLRO", 2),
                ("Branch Manager/Approver", 3),
                ("Approver", 4),
            ]
        );
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("head of credit".parse::<Role>().unwrap(), Role::HeadOfCredit);
        assert!("Janitor".parse::<Role>().is_err());
    }

    #[test]
    fn new_user_defaults_level_from_role() {
        let user = NewUser::new(" Grace ", Role::Approver, None).unwrap();
        assert_eq!(user.name, "Grace");
        assert_eq!(user.level, 4);
        assert_eq!(user.role, "Approver");
        assert!(NewUser::new("  ", Role::Admin, None).is_err());
        assert!(NewUser::new("x", Role::Admin, Some(0)).is_err());
    }

    #[test]
    fn session_from_failed_login_carries_server_message() {
        let err = Session::from_login(
            "ada",
            LoginResponse {
                success: false,
                user: None,
                message: Some("Unknown user".into()),
            },
        )
        .unwrap_err();
        assert_eq!(err.user_message(), "Unknown user");
    }

    #[test]
    fn session_display_includes_role() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"success":true,"user":{"role":"Approver","level":"4"}}"#)
                .unwrap();
        let session = Session::from_login("ada", resp).unwrap();
        assert_eq!(session.level, Some(4));
        assert_eq!(session.display_name(), "ada (Approver)");
        assert_eq!(Session::new("bob").display_name(), "bob");
    }
}
