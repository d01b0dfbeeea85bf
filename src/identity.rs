//! Requester identity: roles, org-hierarchy attributes, clearance.
//!
//! An [`IdentityContext`] is built once per request by the caller (typically
//! from token claims) and consumed read-only by the engine for RBAC, ABAC,
//! and CBAC decisions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Ordered security clearance of a subject, compared against a record's
/// sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearanceLevel {
    Public,
    Internal,
    Confidential,
    Secret,
    TopSecret,
}

impl ClearanceLevel {
    /// Explicit total order. Comparisons go through this table rather than
    /// declaration order so reordering variants cannot change semantics.
    pub fn rank(self) -> u8 {
        match self {
            Self::Public => 0,
            Self::Internal => 1,
            Self::Confidential => 2,
            Self::Secret => 3,
            Self::TopSecret => 4,
        }
    }

    /// Whether this clearance satisfies the required one.
    pub fn satisfies(self, required: ClearanceLevel) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Internal => "INTERNAL",
            Self::Confidential => "CONFIDENTIAL",
            Self::Secret => "SECRET",
            Self::TopSecret => "TOP_SECRET",
        }
    }

    /// Strict parse for stored rule data. Unlike [`FromStr`], an unknown
    /// value is an error so a malformed rule can be skipped instead of
    /// silently matching at the lowest level.
    pub fn parse_strict(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Self::Public),
            "INTERNAL" => Some(Self::Internal),
            "CONFIDENTIAL" => Some(Self::Confidential),
            "SECRET" => Some(Self::Secret),
            "TOP_SECRET" => Some(Self::TopSecret),
            _ => None,
        }
    }
}

impl FromStr for ClearanceLevel {
    type Err = ();

    /// Unknown values map to the lowest clearance, never a higher one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(Self::Public),
            "INTERNAL" => Ok(Self::Internal),
            "CONFIDENTIAL" => Ok(Self::Confidential),
            "SECRET" => Ok(Self::Secret),
            "TOP_SECRET" => Ok(Self::TopSecret),
            other => {
                tracing::warn!(value = other, "unknown clearance level, treating as PUBLIC");
                Ok(Self::Public)
            }
        }
    }
}

impl std::fmt::Display for ClearanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in the organization hierarchy. For a record this governs who may
/// see the row by default; for an identity it describes the requester's own
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationLevel {
    Executive,
    Department,
    Team,
    Individual,
}

impl OrganizationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executive => "EXECUTIVE",
            Self::Department => "DEPARTMENT",
            Self::Team => "TEAM",
            Self::Individual => "INDIVIDUAL",
        }
    }
}

impl FromStr for OrganizationLevel {
    type Err = ();

    /// Unknown values map to EXECUTIVE, the smallest grantee set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXECUTIVE" => Ok(Self::Executive),
            "DEPARTMENT" => Ok(Self::Department),
            "TEAM" => Ok(Self::Team),
            "INDIVIDUAL" => Ok(Self::Individual),
            other => {
                tracing::warn!(
                    value = other,
                    "unknown organization level, treating as EXECUTIVE"
                );
                Ok(Self::Executive)
            }
        }
    }
}

impl std::fmt::Display for OrganizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved requester identity used for access decisions.
///
/// Immutable once constructed for the duration of a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityContext {
    pub user_id: String,
    pub username: String,
    pub roles: HashSet<String>,
    pub department_id: Option<String>,
    pub team_id: Option<String>,
    pub organization_level: OrganizationLevel,
    pub clearance_level: ClearanceLevel,
    pub manager_id: Option<String>,
    pub is_manager: bool,
    pub is_department_head: bool,
    pub is_executive: bool,
}

impl IdentityContext {
    /// Create an identity with the most restrictive defaults.
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            roles: HashSet::new(),
            department_id: None,
            team_id: None,
            organization_level: OrganizationLevel::Individual,
            clearance_level: ClearanceLevel::Public,
            manager_id: None,
            is_manager: false,
            is_department_head: false,
            is_executive: false,
        }
    }

    /// Add a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Replace the role set.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = Some(department_id.into());
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_organization_level(mut self, level: OrganizationLevel) -> Self {
        self.organization_level = level;
        self
    }

    pub fn with_clearance(mut self, level: ClearanceLevel) -> Self {
        self.clearance_level = level;
        self
    }

    pub fn with_manager(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = Some(manager_id.into());
        self
    }

    pub fn as_manager(mut self) -> Self {
        self.is_manager = true;
        self
    }

    pub fn as_department_head(mut self) -> Self {
        self.is_department_head = true;
        self
    }

    pub fn as_executive(mut self) -> Self {
        self.is_executive = true;
        self
    }

    /// Check if the identity holds a specific role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Check if the identity holds any of the given roles.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.roles.contains(*r))
    }

    /// Check department membership.
    pub fn belongs_to_department(&self, department_id: &str) -> bool {
        self.department_id.as_deref() == Some(department_id)
    }

    /// Check team membership.
    pub fn belongs_to_team(&self, team_id: &str) -> bool {
        self.team_id.as_deref() == Some(team_id)
    }

    /// Check if the identity meets the required clearance.
    pub fn has_clearance(&self, required: ClearanceLevel) -> bool {
        self.clearance_level.satisfies(required)
    }

    /// Comma-joined role list, used in audit output.
    pub fn joined_roles(&self) -> String {
        let mut roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        roles.sort_unstable();
        roles.join(",")
    }
}
