//! Row-level security: per-record grant overrides from the rule store.

use super::{AccessRequest, Evaluator, Stage};
use crate::decision::{RowLevelResult, SubResult};
use crate::errors::Result;
use crate::rules::{AccessRule, PrincipalType};
use crate::store::RuleStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Enforces record-scoped overrides for the exact requester or everyone.
///
/// Row-level rules are exceptions layered on top of RBAC/ABAC, not a
/// whitelist: no matching rule means implicit allow, and any matching active
/// rule whose grant for the operation is false is a hard veto. Liveness is
/// the store's contract, evaluated at the decision timestamp.
pub struct RowLevelEvaluator {
    rule_store: Arc<dyn RuleStore>,
}

impl RowLevelEvaluator {
    pub fn new(rule_store: Arc<dyn RuleStore>) -> Self {
        Self { rule_store }
    }

    fn rule_targets_requester(rule: &AccessRule, user_id: &str) -> bool {
        match rule.principal_type {
            PrincipalType::User => rule.principal_value == user_id,
            PrincipalType::All => true,
            _ => false,
        }
    }
}

#[async_trait]
impl Evaluator for RowLevelEvaluator {
    fn stage(&self) -> Stage {
        Stage::RowLevel
    }

    async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<SubResult> {
        let rules = self
            .rule_store
            .active_rules_for(&request.record.id, request.now)
            .await?;

        for rule in &rules {
            // Only rules scoped to this exact record participate; table-wide
            // rules belong to ABAC.
            let record_scoped = rule.record_id.as_deref() == Some(request.record.id.as_str());
            if !record_scoped
                || !Self::rule_targets_requester(rule, &request.identity.user_id)
            {
                continue;
            }

            if !rule.grants(request.operation) {
                return Ok(SubResult::RowLevel(RowLevelResult {
                    allowed: false,
                    matched_rule: Some(rule.rule_name.clone()),
                    reason: Some(format!(
                        "Row-level access denied by rule: {}",
                        rule.rule_name
                    )),
                }));
            }
        }

        Ok(SubResult::RowLevel(RowLevelResult {
            allowed: true,
            matched_rule: None,
            reason: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ClientContext;
    use crate::identity::{IdentityContext, OrganizationLevel};
    use crate::record::ProtectedRecord;
    use crate::rules::Operation;
    use crate::store::InMemoryRuleStore;
    use chrono::Utc;

    async fn run(
        store: Arc<InMemoryRuleStore>,
        identity: &IdentityContext,
        operation: Operation,
    ) -> SubResult {
        let record = ProtectedRecord::new("r1", "x", OrganizationLevel::Team, "carol");
        let client = ClientContext::default();
        let request = AccessRequest {
            identity,
            record: &record,
            operation,
            client: &client,
            now: Utc::now(),
        };
        RowLevelEvaluator::new(store).evaluate(&request).await.unwrap()
    }

    #[tokio::test]
    async fn no_matching_rule_is_implicit_allow() {
        let store = Arc::new(InMemoryRuleStore::new());
        let identity = IdentityContext::new("alice", "Alice");
        assert!(run(store, &identity, Operation::Read).await.allowed());
    }

    #[tokio::test]
    async fn user_specific_veto_denies_update() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.upsert(
            AccessRule::new("1", "alice-frozen", PrincipalType::User, "alice")
                .for_record("r1")
                .grant(Operation::Read),
        );

        let identity = IdentityContext::new("alice", "Alice");
        assert!(run(store.clone(), &identity, Operation::Read).await.allowed());

        let denied = run(store, &identity, Operation::Update).await;
        assert!(!denied.allowed());
        match denied {
            SubResult::RowLevel(r) => {
                assert_eq!(r.matched_rule.as_deref(), Some("alice-frozen"));
            }
            _ => panic!("expected row-level result"),
        }
    }

    #[tokio::test]
    async fn permissive_all_rule_does_not_override_user_veto() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.upsert(
            AccessRule::new("1", "alice-frozen", PrincipalType::User, "alice")
                .for_record("r1")
                .grant(Operation::Read),
        );
        store.upsert(
            AccessRule::new("2", "everyone-open", PrincipalType::All, "*")
                .for_record("r1")
                .grant_all()
                .with_priority(100),
        );

        let identity = IdentityContext::new("alice", "Alice");
        assert!(!run(store, &identity, Operation::Update).await.allowed());
    }

    #[tokio::test]
    async fn rules_for_other_users_or_records_are_ignored() {
        let store = Arc::new(InMemoryRuleStore::new());
        // Different user.
        store.upsert(
            AccessRule::new("1", "bob-frozen", PrincipalType::User, "bob").for_record("r1"),
        );
        // Different record.
        store.upsert(
            AccessRule::new("2", "r2-frozen", PrincipalType::User, "alice").for_record("r2"),
        );
        // Table-wide rules belong to ABAC, not row-level.
        store.upsert(AccessRule::new("3", "global", PrincipalType::User, "alice"));
        // Role principals are out of row-level scope.
        store.upsert(
            AccessRule::new("4", "editors", PrincipalType::Role, "EDITOR").for_record("r1"),
        );

        let identity = IdentityContext::new("alice", "Alice").with_role("EDITOR");
        assert!(run(store, &identity, Operation::Update).await.allowed());
    }
}
