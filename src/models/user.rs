//! User records, roles and account DTOs.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Staff role gating permitted operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    LabNurse,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Doctor, Role::LabNurse];

    /// Code stored in the `users.role` column.
    pub fn code(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::LabNurse => "lab",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Doctor => "Doctor",
            Role::LabNurse => "Lab / Nurse",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "lab" | "nurse" => Ok(Role::LabNurse),
            other => Err(AppError::parse(format!("Unknown role: {other}"))),
        }
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
}

impl UserStatus {
    pub fn code(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Blocked => "Blocked",
        }
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "blocked" => Ok(UserStatus::Blocked),
            other => Err(AppError::parse(format!("Unknown user status: {other}"))),
        }
    }
}

/// A staff account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Database id, `None` until stored.
    pub id: Option<i32>,
    pub username: String,
    /// Encoded PBKDF2 hash, see [`crate::auth::password`].
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    /// Doctors only.
    pub specialization: Option<String>,
    pub status: UserStatus,
    pub last_login: Option<NaiveDate>,
}

/// DTO for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub specialization: Option<String>,
}

/// DTO for updating a user. The username is never changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    /// New password; `None` or empty keeps the current one.
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<Option<String>>,
    pub role: Option<Role>,
    pub specialization: Option<Option<String>>,
    pub status: Option<UserStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.code().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_status_default_is_active() {
        assert_eq!(UserStatus::default(), UserStatus::Active);
        assert_eq!("blocked".parse::<UserStatus>().unwrap(), UserStatus::Blocked);
    }
}
