//! Access-control rules: row grants, column allow-lists, attribute conditions.
//!
//! Rules are created by administrators and read by the engine through a
//! [`RuleStore`](crate::store::RuleStore); the engine never mutates them.
//! Condition maps and column allow-lists are kept in their stored JSON form
//! and parsed at evaluation time so a malformed rule can be skipped without
//! failing the whole decision.

use crate::errors::RuleError;
use crate::identity::{ClearanceLevel, IdentityContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four record operations a rule can grant or withhold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    /// Specific user, matched by user id
    User,
    /// Role name (RBAC)
    Role,
    /// Department membership (ABAC)
    Department,
    /// Team membership (ABAC)
    Team,
    /// Organization-wide
    Organization,
    /// Minimum clearance level (ABAC)
    Clearance,
    /// Everyone (conditions still apply)
    All,
}

/// A single typed attribute condition.
///
/// The original stored these as free-form JSON keys; the closed set gains
/// exhaustiveness checking while preserving the stored wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCondition {
    DepartmentEquals(String),
    TeamEquals(String),
    ClearanceAtLeast(ClearanceLevel),
    RoleEquals(String),
    IsManager(bool),
    IsExecutive(bool),
}

impl AttributeCondition {
    /// Evaluate the condition against an identity.
    pub fn holds(&self, identity: &IdentityContext) -> bool {
        match self {
            Self::DepartmentEquals(dept) => identity.belongs_to_department(dept),
            Self::TeamEquals(team) => identity.belongs_to_team(team),
            Self::ClearanceAtLeast(level) => identity.has_clearance(*level),
            Self::RoleEquals(role) => identity.has_role(role),
            Self::IsManager(expected) => identity.is_manager == *expected,
            Self::IsExecutive(expected) => identity.is_executive == *expected,
        }
    }

    /// Stored map key for this condition kind.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DepartmentEquals(_) => "department",
            Self::TeamEquals(_) => "team",
            Self::ClearanceAtLeast(_) => "clearance",
            Self::RoleEquals(_) => "role",
            Self::IsManager(_) => "is_manager",
            Self::IsExecutive(_) => "is_executive",
        }
    }

    /// Stored map value for this condition kind.
    pub fn value_string(&self) -> String {
        match self {
            Self::DepartmentEquals(v) | Self::TeamEquals(v) | Self::RoleEquals(v) => v.clone(),
            Self::ClearanceAtLeast(level) => level.as_str().to_string(),
            Self::IsManager(v) | Self::IsExecutive(v) => v.to_string(),
        }
    }

    /// Parse one stored `key: value` pair into a typed condition.
    pub fn from_entry(key: &str, value: &serde_json::Value) -> Result<Self, RuleError> {
        let as_text = || -> Result<String, RuleError> {
            match value {
                serde_json::Value::String(s) => Ok(s.clone()),
                serde_json::Value::Bool(b) => Ok(b.to_string()),
                other => Err(RuleError::invalid_condition(
                    key,
                    format!("expected a string value, got {other}"),
                )),
            }
        };

        match key.to_ascii_lowercase().replace('_', "").as_str() {
            "department" => Ok(Self::DepartmentEquals(as_text()?)),
            "team" => Ok(Self::TeamEquals(as_text()?)),
            "clearance" => {
                let text = as_text()?;
                let level = ClearanceLevel::parse_strict(&text)
                    .ok_or(RuleError::UnknownClearance { value: text })?;
                Ok(Self::ClearanceAtLeast(level))
            }
            "role" => Ok(Self::RoleEquals(as_text()?)),
            "ismanager" => Ok(Self::IsManager(parse_bool(key, value)?)),
            "isexecutive" => Ok(Self::IsExecutive(parse_bool(key, value)?)),
            _ => Err(RuleError::invalid_condition(
                key,
                "unknown condition kind".to_string(),
            )),
        }
    }

    /// Parse a stored JSON object into the full typed condition list.
    pub fn parse_map(raw: &str) -> Result<Vec<Self>, RuleError> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
            .map_err(|e| RuleError::invalid_condition("<map>", e.to_string()))?;
        map.iter()
            .map(|(key, value)| Self::from_entry(key, value))
            .collect()
    }
}

fn parse_bool(key: &str, value: &serde_json::Value) -> Result<bool, RuleError> {
    match value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(RuleError::invalid_condition(
                key,
                format!("expected a boolean, got '{other}'"),
            )),
        },
        other => Err(RuleError::invalid_condition(
            key,
            format!("expected a boolean, got {other}"),
        )),
    }
}

/// A stored access-control rule.
///
/// Priority orders evaluation only; it never resolves conflicts. Every
/// applicable rule must grant the requested operation (AND semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: String,
    pub rule_name: String,
    pub description: Option<String>,

    /// Record this rule is scoped to; `None` means table-wide.
    pub record_id: Option<String>,

    pub principal_type: PrincipalType,
    pub principal_value: String,

    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,

    /// Column allow-list as stored JSON array text, e.g. `["id","name"]`.
    pub visible_columns: Option<String>,

    /// Attribute conditions as stored JSON object text,
    /// e.g. `{"department":"ENG","clearance":"CONFIDENTIAL"}`.
    pub attribute_conditions: Option<String>,

    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,

    pub priority: i32,
    pub active: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl AccessRule {
    /// Create an inactive-by-grant rule: all four operation grants start
    /// false, matching the stored defaults.
    pub fn new(
        id: impl Into<String>,
        rule_name: impl Into<String>,
        principal_type: PrincipalType,
        principal_value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            rule_name: rule_name.into(),
            description: None,
            record_id: None,
            principal_type,
            principal_value: principal_value.into(),
            can_read: false,
            can_create: false,
            can_update: false,
            can_delete: false,
            visible_columns: None,
            attribute_conditions: None,
            valid_from: None,
            valid_until: None,
            priority: 0,
            active: true,
            created_at: None,
            created_by: None,
        }
    }

    pub fn for_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Grant one operation.
    pub fn grant(mut self, operation: Operation) -> Self {
        match operation {
            Operation::Create => self.can_create = true,
            Operation::Read => self.can_read = true,
            Operation::Update => self.can_update = true,
            Operation::Delete => self.can_delete = true,
        }
        self
    }

    /// Grant all four operations.
    pub fn grant_all(self) -> Self {
        self.grant(Operation::Create)
            .grant(Operation::Read)
            .grant(Operation::Update)
            .grant(Operation::Delete)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Attach a column allow-list, serialized to the stored form.
    pub fn with_visible_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        // Serializing a Vec<String> cannot fail.
        self.visible_columns = serde_json::to_string(&columns).ok();
        self
    }

    /// Attach typed attribute conditions, serialized to the stored form.
    pub fn with_conditions<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = AttributeCondition>,
    {
        let map: serde_json::Map<String, serde_json::Value> = conditions
            .into_iter()
            .map(|c| (c.key().to_string(), c.value_string().into()))
            .collect();
        self.attribute_conditions = serde_json::to_string(&map).ok();
        self
    }

    /// Whether the rule grants the given operation.
    pub fn grants(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create => self.can_create,
            Operation::Read => self.can_read,
            Operation::Update => self.can_update,
            Operation::Delete => self.can_delete,
        }
    }

    /// Active and inside the validity window (unbounded ends always pass).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now > until {
                return false;
            }
        }
        true
    }

    /// Whether the rule is scoped to this record or table-wide.
    pub fn covers_record(&self, record_id: &str) -> bool {
        match &self.record_id {
            Some(scoped) => scoped == record_id,
            None => true,
        }
    }

    /// Whether the rule's principal matches the identity.
    ///
    /// A CLEARANCE principal with an unknown level is malformed data and
    /// surfaces as an error so the caller can skip the rule.
    pub fn principal_matches(&self, identity: &IdentityContext) -> Result<bool, RuleError> {
        Ok(match self.principal_type {
            PrincipalType::User => self.principal_value == identity.user_id,
            PrincipalType::Role => identity.has_role(&self.principal_value),
            PrincipalType::Department => identity.belongs_to_department(&self.principal_value),
            PrincipalType::Team => identity.belongs_to_team(&self.principal_value),
            PrincipalType::Clearance => {
                let level = ClearanceLevel::parse_strict(&self.principal_value).ok_or(
                    RuleError::UnknownClearance {
                        value: self.principal_value.clone(),
                    },
                )?;
                identity.has_clearance(level)
            }
            PrincipalType::Organization | PrincipalType::All => true,
        })
    }

    /// Parse the stored attribute conditions, if any.
    pub fn parsed_conditions(&self) -> Result<Vec<AttributeCondition>, RuleError> {
        match &self.attribute_conditions {
            Some(raw) => AttributeCondition::parse_map(raw),
            None => Ok(Vec::new()),
        }
    }

    /// Parse the stored column allow-list, if any.
    pub fn parsed_visible_columns(&self) -> Result<Option<Vec<String>>, RuleError> {
        match &self.visible_columns {
            Some(raw) => {
                let columns: Vec<String> = serde_json::from_str(raw)
                    .map_err(|e| RuleError::invalid_column_list(e.to_string()))?;
                Ok(Some(columns))
            }
            None => Ok(None),
        }
    }
}
