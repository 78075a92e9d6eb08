//! The signed-in principal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a signed-in principal
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Portal roles as the backend names them
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Lecturer,
    /// Institutions
    School,
    /// Partners
    Organization,
    Admin,
    SubAdmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Lecturer,
        Role::School,
        Role::Organization,
        Role::Admin,
        Role::SubAdmin,
    ];

    /// Wire spelling, e.g. `SUB_ADMIN`
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Lecturer => "LECTURER",
            Role::School => "SCHOOL",
            Role::Organization => "ORGANIZATION",
            Role::Admin => "ADMIN",
            Role::SubAdmin => "SUB_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one of the portal roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == upper)
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// Who is signed in. Immutable for the lifetime of a session: a different
/// principal is a different `Identity`, never a mutation of this one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Opaque id assigned by the authentication backend
    pub id: IdentityId,
    /// Role the principal currently holds
    pub role: Role,
}

impl Identity {
    pub fn new(id: impl Into<IdentityId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Whether `other` names the same principal, regardless of role
    pub fn same_principal(&self, other: &Identity) -> bool {
        self.id == other.id
    }
}
