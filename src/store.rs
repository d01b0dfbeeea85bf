//! Collaborator interfaces: rule storage and directory lookup.
//!
//! The engine performs no I/O of its own; both traits are synchronous from
//! its point of view and any timeout is enforced by the caller. A failed
//! read surfaces as a [`StoreError`] so callers can fail closed.

use crate::errors::StoreError;
use crate::rules::{AccessRule, PrincipalType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to stored access-control rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules in scope for a record: record-specific plus table-wide,
    /// active, inside their validity window at `now`, ordered by ascending
    /// priority. Callers pass the decision timestamp so every stage of one
    /// decision sees the same liveness.
    async fn active_rules_for(
        &self,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccessRule>, StoreError>;

    /// All rules declared for a principal, regardless of activity or
    /// validity window; the engine filters.
    async fn rules_for(
        &self,
        principal_type: PrincipalType,
        principal_value: &str,
    ) -> Result<Vec<AccessRule>, StoreError>;
}

/// Manager-chain lookup for INDIVIDUAL-level records.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// The stored manager of a user, if any.
    async fn manager_of(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// In-memory rule store. Useful for tests and single-process deployments;
/// production deployments typically wrap a database.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<AccessRule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rule by id.
    pub fn upsert(&self, rule: AccessRule) {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = rules.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule;
        } else {
            rules.push(rule);
        }
    }

    /// Remove a rule by id.
    pub fn remove(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        rules.len() < before
    }

    /// Rules whose validity window has passed but are still flagged active,
    /// for administrative cleanup.
    pub fn expired_rules(&self, now: DateTime<Utc>) -> Vec<AccessRule> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules
            .iter()
            .filter(|r| r.active && r.valid_until.is_some_and(|until| until < now))
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Vec<AccessRule> {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn active_rules_for(
        &self,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccessRule>, StoreError> {
        let mut rules: Vec<AccessRule> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.covers_record(record_id) && r.is_active_at(now))
            .collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    async fn rules_for(
        &self,
        principal_type: PrincipalType,
        principal_value: &str,
    ) -> Result<Vec<AccessRule>, StoreError> {
        let mut rules: Vec<AccessRule> = self
            .snapshot()
            .into_iter()
            .filter(|r| {
                r.principal_type == principal_type
                    && (principal_type == PrincipalType::All || r.principal_value == principal_value)
            })
            .collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }
}

/// In-memory manager directory keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    managers: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_manager(&self, user_id: impl Into<String>, manager_id: impl Into<String>) {
        self.managers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.into(), manager_id.into());
    }
}

#[async_trait]
impl DirectoryLookup for InMemoryDirectory {
    async fn manager_of(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .managers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned())
    }
}
