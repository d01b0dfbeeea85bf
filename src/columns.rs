//! Column-level security: visibility resolution and masked updates.

use crate::errors::Result;
use crate::identity::{ClearanceLevel, IdentityContext, OrganizationLevel};
use crate::record::{ProtectedRecord, SensitivityLevel};
use crate::rules::PrincipalType;
use crate::store::RuleStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The full column set of a protected record.
pub const ALL_COLUMNS: [&str; 15] = [
    "id",
    "name",
    "data_date",
    "data",
    "sensitivity_level",
    "organization_level",
    "department_id",
    "team_id",
    "owner_id",
    "confidential_notes",
    "financial_data",
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
];

/// Column hidden below CONFIDENTIAL clearance.
pub const CONFIDENTIAL_NOTES_COLUMN: &str = "confidential_notes";
/// Column hidden below SECRET clearance.
pub const FINANCIAL_DATA_COLUMN: &str = "financial_data";

/// The full column set as an owned set.
pub fn full_column_set() -> BTreeSet<String> {
    ALL_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Computes the visible-column set for an identity and record.
///
/// Clearance-derived redactions are intersected with every applicable
/// rule-store allow-list: a column must survive each of them.
pub struct ColumnResolver {
    rule_store: Arc<dyn RuleStore>,
}

impl ColumnResolver {
    pub fn new(rule_store: Arc<dyn RuleStore>) -> Self {
        Self { rule_store }
    }

    pub async fn resolve(
        &self,
        identity: &IdentityContext,
        record: &ProtectedRecord,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<String>> {
        let mut visible = full_column_set();

        if !identity.has_clearance(ClearanceLevel::Confidential) {
            visible.remove(CONFIDENTIAL_NOTES_COLUMN);
        }
        if !identity.has_clearance(ClearanceLevel::Secret) {
            visible.remove(FINANCIAL_DATA_COLUMN);
        }

        // Allow-lists from rules targeting the requester directly or
        // everyone. A malformed list skips its rule; it never widens or
        // fails the result.
        let mut rules = self
            .rule_store
            .rules_for(PrincipalType::User, &identity.user_id)
            .await?;
        rules.extend(self.rule_store.rules_for(PrincipalType::All, "*").await?);
        rules.sort_by_key(|r| r.priority);

        for rule in &rules {
            if !rule.is_active_at(now) || !rule.covers_record(&record.id) {
                continue;
            }
            match rule.parsed_visible_columns() {
                Ok(Some(allowed)) => {
                    visible.retain(|column| allowed.iter().any(|a| a == column));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        rule = %rule.rule_name,
                        error = %err,
                        "skipping rule with malformed column list"
                    );
                }
            }
        }

        Ok(visible)
    }
}

/// One applied field change, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub column: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// A partial update to a record.
///
/// Fields outside the caller's visible-column set are silently dropped, not
/// rejected. Auditable fields are diffed and reported only when they
/// actually change; the two clearance-gated fields are applied without
/// their values entering the change list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub data_date: Option<NaiveDate>,
    pub data: Option<String>,
    pub organization_level: Option<OrganizationLevel>,
    pub sensitivity_level: Option<SensitivityLevel>,
    pub confidential_notes: Option<String>,
    pub financial_data: Option<String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn set_data_date(mut self, date: NaiveDate) -> Self {
        self.data_date = Some(date);
        self
    }

    pub fn set_organization_level(mut self, level: OrganizationLevel) -> Self {
        self.organization_level = Some(level);
        self
    }

    pub fn set_sensitivity_level(mut self, level: SensitivityLevel) -> Self {
        self.sensitivity_level = Some(level);
        self
    }

    pub fn set_confidential_notes(mut self, notes: impl Into<String>) -> Self {
        self.confidential_notes = Some(notes.into());
        self
    }

    pub fn set_financial_data(mut self, data: impl Into<String>) -> Self {
        self.financial_data = Some(data.into());
        self
    }

    /// Apply the patch to a record, honoring the visible-column set.
    ///
    /// Returns the changes actually made to auditable fields.
    pub fn apply(&self, record: &mut ProtectedRecord, visible: &BTreeSet<String>) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if let Some(name) = &self.name {
            if visible.contains("name") && record.name != *name {
                changes.push(FieldChange {
                    column: "name".to_string(),
                    old: Some(record.name.clone()),
                    new: Some(name.clone()),
                });
                record.name = name.clone();
            }
        }

        if let Some(date) = self.data_date {
            if visible.contains("data_date") && record.data_date != Some(date) {
                changes.push(FieldChange {
                    column: "data_date".to_string(),
                    old: record.data_date.map(|d| d.to_string()),
                    new: Some(date.to_string()),
                });
                record.data_date = Some(date);
            }
        }

        if let Some(data) = &self.data {
            if visible.contains("data") && record.data.as_deref() != Some(data.as_str()) {
                changes.push(FieldChange {
                    column: "data".to_string(),
                    old: record.data.clone(),
                    new: Some(data.clone()),
                });
                record.data = Some(data.clone());
            }
        }

        if let Some(level) = self.organization_level {
            if visible.contains("organization_level") && record.organization_level != level {
                changes.push(FieldChange {
                    column: "organization_level".to_string(),
                    old: Some(record.organization_level.to_string()),
                    new: Some(level.to_string()),
                });
                record.organization_level = level;
            }
        }

        if let Some(level) = self.sensitivity_level {
            if visible.contains("sensitivity_level") && record.sensitivity_level != level {
                changes.push(FieldChange {
                    column: "sensitivity_level".to_string(),
                    old: Some(record.sensitivity_level.to_string()),
                    new: Some(level.to_string()),
                });
                record.sensitivity_level = level;
            }
        }

        // Sensitive fields: applied when visible, values never diffed into
        // the change list.
        if let Some(notes) = &self.confidential_notes {
            if visible.contains(CONFIDENTIAL_NOTES_COLUMN) {
                record.confidential_notes = Some(notes.clone());
            }
        }
        if let Some(data) = &self.financial_data {
            if visible.contains(FINANCIAL_DATA_COLUMN) {
                record.financial_data = Some(data.clone());
            }
        }

        for change in &changes {
            tracing::debug!(
                record = %record.id,
                column = %change.column,
                "field changed by masked update"
            );
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::AccessRule;
    use crate::store::InMemoryRuleStore;

    fn record() -> ProtectedRecord {
        ProtectedRecord::new("r1", "report", OrganizationLevel::Team, "alice")
    }

    #[tokio::test]
    async fn clearance_redactions() {
        let store = Arc::new(InMemoryRuleStore::new());
        let resolver = ColumnResolver::new(store);

        let public = IdentityContext::new("alice", "Alice");
        let visible = resolver.resolve(&public, &record(), Utc::now()).await.unwrap();
        assert!(!visible.contains(CONFIDENTIAL_NOTES_COLUMN));
        assert!(!visible.contains(FINANCIAL_DATA_COLUMN));
        assert_eq!(visible.len(), ALL_COLUMNS.len() - 2);

        let confidential = IdentityContext::new("bob", "Bob")
            .with_clearance(ClearanceLevel::Confidential);
        let visible = resolver
            .resolve(&confidential, &record(), Utc::now())
            .await
            .unwrap();
        assert!(visible.contains(CONFIDENTIAL_NOTES_COLUMN));
        assert!(!visible.contains(FINANCIAL_DATA_COLUMN));

        let secret =
            IdentityContext::new("carla", "Carla").with_clearance(ClearanceLevel::Secret);
        let visible = resolver.resolve(&secret, &record(), Utc::now()).await.unwrap();
        assert_eq!(visible, full_column_set());
    }

    #[tokio::test]
    async fn allow_lists_intersect_not_union() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.upsert(
            AccessRule::new("1", "narrow", PrincipalType::User, "alice")
                .with_visible_columns(["id", "name", "data"]),
        );
        store.upsert(
            AccessRule::new("2", "narrower", PrincipalType::All, "*")
                .with_visible_columns(["id", "name", "owner_id"]),
        );

        let resolver = ColumnResolver::new(store);
        let identity =
            IdentityContext::new("alice", "Alice").with_clearance(ClearanceLevel::TopSecret);
        let visible = resolver.resolve(&identity, &record(), Utc::now()).await.unwrap();

        // Only columns surviving every applicable allow-list remain.
        let expected: BTreeSet<String> = ["id", "name"].iter().map(|s| s.to_string()).collect();
        assert_eq!(visible, expected);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_and_a_subset() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.upsert(
            AccessRule::new("1", "narrow", PrincipalType::User, "alice")
                .with_visible_columns(["id", "name", "confidential_notes"]),
        );
        let resolver = ColumnResolver::new(store);
        let identity = IdentityContext::new("alice", "Alice")
            .with_clearance(ClearanceLevel::Internal);

        let now = Utc::now();
        let first = resolver.resolve(&identity, &record(), now).await.unwrap();
        let second = resolver.resolve(&identity, &record(), now).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_subset(&full_column_set()));
        // Allow-listing confidential_notes cannot defeat the clearance
        // redaction.
        assert!(!first.contains(CONFIDENTIAL_NOTES_COLUMN));
    }

    #[tokio::test]
    async fn rules_scoped_to_other_records_do_not_apply() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.upsert(
            AccessRule::new("1", "other-record", PrincipalType::User, "alice")
                .for_record("r2")
                .with_visible_columns(["id"]),
        );
        let resolver = ColumnResolver::new(store);
        let identity =
            IdentityContext::new("alice", "Alice").with_clearance(ClearanceLevel::TopSecret);
        let visible = resolver.resolve(&identity, &record(), Utc::now()).await.unwrap();
        assert_eq!(visible, full_column_set());
    }

    #[tokio::test]
    async fn malformed_allow_list_is_skipped() {
        let store = Arc::new(InMemoryRuleStore::new());
        let mut broken = AccessRule::new("1", "broken", PrincipalType::User, "alice");
        broken.visible_columns = Some("id,name".to_string()); // not JSON
        store.upsert(broken);

        let resolver = ColumnResolver::new(store);
        let identity =
            IdentityContext::new("alice", "Alice").with_clearance(ClearanceLevel::TopSecret);
        let visible = resolver.resolve(&identity, &record(), Utc::now()).await.unwrap();
        assert_eq!(visible, full_column_set());
    }

    #[test]
    fn patch_respects_visibility_and_diffs_changes() {
        let mut target = record().with_data("old-data");
        let mut visible = full_column_set();
        visible.remove("data");
        visible.remove(FINANCIAL_DATA_COLUMN);

        let patch = RecordPatch::new()
            .set_name("renamed")
            .set_data("new-data")
            .set_financial_data("Q3 numbers");

        let changes = patch.apply(&mut target, &visible);

        // Visible field updated and diffed.
        assert_eq!(target.name, "renamed");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].column, "name");
        assert_eq!(changes[0].old.as_deref(), Some("report"));
        assert_eq!(changes[0].new.as_deref(), Some("renamed"));

        // Non-visible fields silently dropped.
        assert_eq!(target.data.as_deref(), Some("old-data"));
        assert_eq!(target.financial_data, None);
    }

    #[test]
    fn patch_skips_unchanged_values() {
        let mut target = record();
        let patch = RecordPatch::new().set_name("report"); // same value
        let changes = patch.apply(&mut target, &full_column_set());
        assert!(changes.is_empty());
    }

    #[test]
    fn sensitive_fields_apply_without_diffing() {
        let mut target = record();
        let patch = RecordPatch::new().set_confidential_notes("board discussion");
        let changes = patch.apply(&mut target, &full_column_set());
        assert!(changes.is_empty());
        assert_eq!(target.confidential_notes.as_deref(), Some("board discussion"));
    }
}
