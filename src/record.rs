//! Protected business records subject to access control.

use crate::identity::OrganizationLevel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sensitivity classification of a record; governs which columns require
/// elevated clearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl SensitivityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Internal => "INTERNAL",
            Self::Confidential => "CONFIDENTIAL",
            Self::Restricted => "RESTRICTED",
        }
    }
}

impl FromStr for SensitivityLevel {
    type Err = ();

    /// Unknown values map to RESTRICTED, the most protective classification.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(Self::Public),
            "INTERNAL" => Ok(Self::Internal),
            "CONFIDENTIAL" => Ok(Self::Confidential),
            "RESTRICTED" => Ok(Self::Restricted),
            other => {
                tracing::warn!(
                    value = other,
                    "unknown sensitivity level, treating as RESTRICTED"
                );
                Ok(Self::Restricted)
            }
        }
    }
}

impl std::fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A business record under row- and column-level protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedRecord {
    pub id: String,
    pub name: String,
    pub data_date: Option<NaiveDate>,
    pub data: Option<String>,
    pub sensitivity_level: SensitivityLevel,
    pub organization_level: OrganizationLevel,
    pub department_id: Option<String>,
    pub team_id: Option<String>,
    pub owner_id: String,
    pub confidential_notes: Option<String>,
    pub financial_data: Option<String>,

    // Audit fields maintained by the repository collaborator.
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,

    /// Soft-delete marker; deleted records are filtered out by the
    /// repository, the flag is carried for audit only.
    #[serde(default)]
    pub is_deleted: bool,
}

impl ProtectedRecord {
    /// Create a record with INTERNAL sensitivity, the repository default.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        organization_level: OrganizationLevel,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_date: None,
            data: None,
            sensitivity_level: SensitivityLevel::Internal,
            organization_level,
            department_id: None,
            team_id: None,
            owner_id: owner_id.into(),
            confidential_notes: None,
            financial_data: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
            is_deleted: false,
        }
    }

    pub fn with_sensitivity(mut self, level: SensitivityLevel) -> Self {
        self.sensitivity_level = level;
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

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_confidential_notes(mut self, notes: impl Into<String>) -> Self {
        self.confidential_notes = Some(notes.into());
        self
    }

    pub fn with_financial_data(mut self, data: impl Into<String>) -> Self {
        self.financial_data = Some(data.into());
        self
    }

    /// Whether the given user owns this record.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}
