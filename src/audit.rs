//! Audit trail for access decisions.
//!
//! The engine computes decisions; persisting them is the caller's concern.
//! [`AuditSink`] is the seam: production deployments typically write to a
//! database table, tests and small deployments can use the tracing sink.

use crate::columns::FieldChange;
use crate::decision::AccessDecision;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One persisted audit record, derived from a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub user_id: String,
    pub record_id: String,
    pub operation: String,
    pub allowed: bool,
    pub partial_access: bool,
    pub denial_reason: Option<String>,
    pub denial_details: Option<String>,
    /// One-line human-readable verdict.
    pub summary: String,
    /// Attribute key/value pairs the ABAC stage consulted.
    pub evaluated_attributes: BTreeMap<String, String>,
    /// Context key/value pairs the CBAC stage consulted.
    pub evaluated_context: BTreeMap<String, String>,
    /// Field diffs from a masked update, when the decision led to one.
    pub field_changes: Vec<FieldChange>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_decision(decision: &AccessDecision) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_id: decision.decision_id,
            user_id: decision.user_id.clone(),
            record_id: decision.record_id.clone(),
            operation: decision.operation.to_string(),
            allowed: decision.allowed,
            partial_access: decision.partial_access,
            denial_reason: decision.denial_reason.map(|r| r.to_string()),
            denial_details: decision.denial_details.clone(),
            summary: decision.audit_summary(),
            evaluated_attributes: decision
                .abac
                .as_ref()
                .map(|r| r.evaluated_attributes.clone())
                .unwrap_or_default(),
            evaluated_context: decision
                .cbac
                .as_ref()
                .map(|r| r.evaluated_context.clone())
                .unwrap_or_default(),
            field_changes: Vec::new(),
            recorded_at: decision.decided_at,
        }
    }

    /// Attach the field diffs of the update this decision authorized.
    pub fn with_field_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.field_changes = changes;
        self
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Sink that emits each entry as a structured tracing event.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        tracing::info!(
            audit_id = %entry.id,
            decision_id = %entry.decision_id,
            user = %entry.user_id,
            record = %entry.record_id,
            operation = %entry.operation,
            allowed = entry.allowed,
            partial = entry.partial_access,
            summary = %entry.summary,
            "access audit"
        );
        Ok(())
    }
}
