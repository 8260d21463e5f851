//! Staff roles and account statuses.

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Name of the enum being parsed (e.g. "role").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Staff role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Business owner. Full access.
    Owner,
    /// Full access including user management.
    Admin,
    /// Manages a team's tasks and attendance.
    Manager,
    /// Regular staff member.
    #[default]
    Employee,
    /// Packing station staff.
    Packer,
}

impl UserRole {
    /// All roles, in descending privilege order.
    pub const ALL: [Self; 5] = [
        Self::Owner,
        Self::Admin,
        Self::Manager,
        Self::Employee,
        Self::Packer,
    ];

    /// Lowercase wire/database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
            Self::Packer => "packer",
        }
    }

    /// Whether this role may create, edit and delete staff accounts and
    /// store-level settings.
    #[must_use]
    pub const fn can_manage_users(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Whether this role supervises other staff (team task views,
    /// other people's attendance, order workflow overrides).
    #[must_use]
    pub const fn is_supervisor(self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Manager)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}

/// Account status of a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    /// All statuses.
    pub const ALL: [Self; 3] = [Self::Active, Self::Inactive, Self::Suspended];

    /// Lowercase wire/database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Manager".parse::<UserRole>().unwrap(), UserRole::Manager);
        assert_eq!(" packer ".parse::<UserRole>().unwrap(), UserRole::Packer);
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        let err = "superuser".parse::<UserRole>().unwrap_err();
        assert_eq!(err.to_string(), "invalid role: superuser");
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Owner.can_manage_users());
        assert!(UserRole::Admin.can_manage_users());
        assert!(!UserRole::Manager.can_manage_users());

        assert!(UserRole::Manager.is_supervisor());
        assert!(!UserRole::Employee.is_supervisor());
        assert!(!UserRole::Packer.is_supervisor());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(UserRole::default(), UserRole::Employee);
        assert_eq!(UserStatus::default(), UserStatus::Active);
    }

    #[test]
    fn test_serde_names_match_display() {
        for role in UserRole::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
        for status in UserStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
