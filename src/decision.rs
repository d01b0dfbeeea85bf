//! The access verdict and its audit-ready explanation.

use crate::rules::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Which model denied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// RBAC: role or hierarchy position insufficient
    RoleInsufficient,
    /// ABAC: clearance or rule attribute check failed
    AttributeInsufficient,
    /// CBAC: request context (time, network origin) outside policy
    ContextViolation,
    /// A record-scoped rule vetoed the operation
    RowLevelDenied,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoleInsufficient => "DENIED_ROLE",
            Self::AttributeInsufficient => "DENIED_ATTRIBUTE",
            Self::ContextViolation => "DENIED_CONTEXT",
            Self::RowLevelDenied => "DENIED_ROW_LEVEL",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RBAC evaluation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacResult {
    pub allowed: bool,
    /// Comma-joined role list on success
    pub matched_role: Option<String>,
    /// Role that would have been needed, on failure
    pub required_role: Option<String>,
    pub reason: Option<String>,
}

/// ABAC evaluation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbacResult {
    pub allowed: bool,
    /// Name of the rule that vetoed, on failure
    pub matched_rule: Option<String>,
    /// Attribute key/value pairs consulted, for audit
    pub evaluated_attributes: BTreeMap<String, String>,
    pub reason: Option<String>,
}

/// CBAC evaluation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CbacResult {
    pub allowed: bool,
    /// Context key/value pairs consulted (ip, user agent, business hours),
    /// recorded even on the allow path
    pub evaluated_context: BTreeMap<String, String>,
    pub reason: Option<String>,
}

/// Row-level security result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowLevelResult {
    pub allowed: bool,
    pub matched_rule: Option<String>,
    pub reason: Option<String>,
}

/// The outcome of one evaluation stage, tagged by model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubResult {
    Rbac(RbacResult),
    Abac(AbacResult),
    Cbac(CbacResult),
    RowLevel(RowLevelResult),
}

impl SubResult {
    pub fn allowed(&self) -> bool {
        match self {
            Self::Rbac(r) => r.allowed,
            Self::Abac(r) => r.allowed,
            Self::Cbac(r) => r.allowed,
            Self::RowLevel(r) => r.allowed,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rbac(r) => r.reason.as_deref(),
            Self::Abac(r) => r.reason.as_deref(),
            Self::Cbac(r) => r.reason.as_deref(),
            Self::RowLevel(r) => r.reason.as_deref(),
        }
    }

    /// Which model a denial from this stage is attributed to.
    pub fn denial_reason(&self) -> DenialReason {
        match self {
            Self::Rbac(_) => DenialReason::RoleInsufficient,
            Self::Abac(_) => DenialReason::AttributeInsufficient,
            Self::Cbac(_) => DenialReason::ContextViolation,
            Self::RowLevel(_) => DenialReason::RowLevelDenied,
        }
    }
}

/// A full access decision with per-model sub-results.
///
/// Constructed fresh per call and never persisted by the engine; callers are
/// expected to store it verbatim as the audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Correlation id for audit trails
    pub decision_id: Uuid,
    pub user_id: String,
    pub record_id: String,
    pub operation: Operation,
    pub decided_at: DateTime<Utc>,

    pub allowed: bool,
    /// True iff visible columns < full column set
    pub partial_access: bool,

    pub denial_reason: Option<DenialReason>,
    pub denial_details: Option<String>,

    pub rbac: Option<RbacResult>,
    pub abac: Option<AbacResult>,
    pub cbac: Option<CbacResult>,
    pub row_level: Option<RowLevelResult>,

    /// Final visible-column set; only computed on the allow path.
    pub visible_columns: Option<BTreeSet<String>>,
}

impl AccessDecision {
    /// Start a denied-by-default decision for the given request tuple.
    pub(crate) fn start(
        user_id: impl Into<String>,
        record_id: impl Into<String>,
        operation: Operation,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            user_id: user_id.into(),
            record_id: record_id.into(),
            operation,
            decided_at,
            allowed: false,
            partial_access: false,
            denial_reason: None,
            denial_details: None,
            rbac: None,
            abac: None,
            cbac: None,
            row_level: None,
            visible_columns: None,
        }
    }

    /// Record a stage outcome in its per-model slot.
    pub(crate) fn record_stage(&mut self, result: SubResult) {
        match result {
            SubResult::Rbac(r) => self.rbac = Some(r),
            SubResult::Abac(r) => self.abac = Some(r),
            SubResult::Cbac(r) => self.cbac = Some(r),
            SubResult::RowLevel(r) => self.row_level = Some(r),
        }
    }

    /// One-line human-readable summary for audit logs.
    pub fn audit_summary(&self) -> String {
        let mut summary = format!(
            "Access Decision: {}",
            if self.allowed { "GRANTED" } else { "DENIED" }
        );
        if !self.allowed {
            if let Some(reason) = self.denial_reason {
                summary.push_str(&format!(" | Reason: {reason}"));
                if let Some(details) = &self.denial_details {
                    summary.push_str(&format!(" - {details}"));
                }
            }
        }
        if self.partial_access {
            summary.push_str(" | Partial Access: columns filtered");
        }
        summary
    }
}
