//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of principal an ACL entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    User,
    Org,
}

impl AuthType {
    pub const ALL: [AuthType; 2] = [AuthType::User, AuthType::Org];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::User => "user",
            AuthType::Org => "org",
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AuthType::User),
            "org" => Ok(AuthType::Org),
            _ => Err(format!("Invalid auth_type {}", s)),
        }
    }
}

/// Permission level granted by an ACL entry.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `None < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    None,
    Read,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::None, Permission::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::None => "none",
            Permission::Read => "read",
        }
    }

    /// Whether this level satisfies a required level
    pub fn allows(&self, required: Permission) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Permission::None),
            "read" => Ok(Permission::Read),
            _ => Err(format!("Invalid permission {}", s)),
        }
    }
}

/// A single permission record binding a resource to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub id: String,
    pub resource_id: String,
    pub auth_type: AuthType,
    pub auth_id: String,
    pub permission: Permission,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub creator_user_id: String,
    pub modifier_user_id: String,
}

impl AclEntry {
    /// Whether this entry names the given principal
    pub fn is_for(&self, auth_type: AuthType, auth_id: &str) -> bool {
        self.auth_type == auth_type && self.auth_id == auth_id
    }
}

/// Resource as seen by the host system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub package_id: String,
}

/// Package (dataset) owning one or more resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub id: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub owner_org: Option<String>,
    #[serde(default)]
    pub creator_user_id: Option<String>,
}

/// User known to the host system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sysadmin: bool,
}

/// Organization known to the host system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub id: String,
    pub name: String,
}

/// Explicit per-call context: who is acting and whether checks are skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Acting principal (user id or name), `None` for anonymous callers
    pub user: Option<String>,
    /// Skip capability checks (site user / command-line usage)
    pub ignore_auth: bool,
}

impl CallerContext {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ignore_auth: false,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Site-user context used by command-line tooling
    pub fn site(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ignore_auth: true,
        }
    }

    /// Identifier stamped into audit columns
    pub fn actor_id(&self) -> &str {
        self.user.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_ordering() {
        assert!(Permission::None < Permission::Read);
        assert!(Permission::Read.allows(Permission::Read));
        assert!(Permission::Read.allows(Permission::None));
        assert!(!Permission::None.allows(Permission::Read));
    }

    #[test]
    fn test_enum_parsing_is_exact() {
        assert_eq!("user".parse::<AuthType>(), Ok(AuthType::User));
        assert_eq!("org".parse::<AuthType>(), Ok(AuthType::Org));
        assert!("USER".parse::<AuthType>().is_err());
        assert!("group".parse::<AuthType>().is_err());

        assert_eq!("read".parse::<Permission>(), Ok(Permission::Read));
        assert_eq!("none".parse::<Permission>(), Ok(Permission::None));
        assert!("write".parse::<Permission>().is_err());
        assert!("".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&(AuthType::Org, Permission::Read)).unwrap();
        assert_eq!(json, r#"["org","read"]"#);
    }

    #[test]
    fn test_caller_context_actor() {
        assert_eq!(CallerContext::anonymous().actor_id(), "");
        assert_eq!(CallerContext::user("alice").actor_id(), "alice");
        assert!(CallerContext::site("site_user").ignore_auth);
    }
}
