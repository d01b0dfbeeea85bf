//! Attribute-based access: clearance vs sensitivity, plus stored rules.

use super::{AccessRequest, Evaluator, Stage};
use crate::decision::{AbacResult, SubResult};
use crate::errors::Result;
use crate::identity::ClearanceLevel;
use crate::record::SensitivityLevel;
use crate::rules::AccessRule;
use crate::store::RuleStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Clearance required to access a record of the given sensitivity.
pub fn required_clearance(sensitivity: SensitivityLevel) -> ClearanceLevel {
    match sensitivity {
        SensitivityLevel::Public => ClearanceLevel::Public,
        SensitivityLevel::Internal => ClearanceLevel::Internal,
        SensitivityLevel::Confidential => ClearanceLevel::Confidential,
        SensitivityLevel::Restricted => ClearanceLevel::Secret,
    }
}

/// Enforces clearance-vs-sensitivity and rule-store attribute conditions.
pub struct AbacEvaluator {
    rule_store: Arc<dyn RuleStore>,
}

impl AbacEvaluator {
    pub fn new(rule_store: Arc<dyn RuleStore>) -> Self {
        Self { rule_store }
    }

    /// Whether a rule applies to this request at all.
    ///
    /// A rule whose principal does not match, or one of whose declared
    /// conditions fails, is not applicable and never blocks. Malformed rule
    /// data also makes the rule non-applicable: logged and skipped, never a
    /// decision failure, never a silent grant.
    fn rule_applies(rule: &AccessRule, request: &AccessRequest<'_>) -> bool {
        match rule.principal_matches(request.identity) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                tracing::warn!(
                    rule = %rule.rule_name,
                    error = %err,
                    "skipping rule with malformed principal"
                );
                return false;
            }
        }

        let conditions = match rule.parsed_conditions() {
            Ok(conditions) => conditions,
            Err(err) => {
                tracing::warn!(
                    rule = %rule.rule_name,
                    error = %err,
                    "skipping rule with malformed attribute conditions"
                );
                return false;
            }
        };

        conditions.iter().all(|c| c.holds(request.identity))
    }
}

#[async_trait]
impl Evaluator for AbacEvaluator {
    fn stage(&self) -> Stage {
        Stage::Abac
    }

    async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<SubResult> {
        let mut evaluated_attributes = BTreeMap::new();

        // Clearance vs sensitivity.
        let required = required_clearance(request.record.sensitivity_level);
        evaluated_attributes.insert("required_clearance".to_string(), required.to_string());
        evaluated_attributes.insert(
            "user_clearance".to_string(),
            request.identity.clearance_level.to_string(),
        );

        if !request.identity.has_clearance(required) {
            return Ok(SubResult::Abac(AbacResult {
                allowed: false,
                matched_rule: None,
                reason: Some(format!(
                    "Insufficient clearance level. Required: {required}, User has: {}",
                    request.identity.clearance_level
                )),
                evaluated_attributes,
            }));
        }

        // Stored rules, table-wide plus record-specific, in priority order.
        // Any applicable rule that does not grant the operation is a hard
        // veto; priority never resolves conflicts.
        let rules = self
            .rule_store
            .active_rules_for(&request.record.id, request.now)
            .await?;
        for rule in &rules {
            if !Self::rule_applies(rule, request) {
                continue;
            }
            if !rule.grants(request.operation) {
                return Ok(SubResult::Abac(AbacResult {
                    allowed: false,
                    matched_rule: Some(rule.rule_name.clone()),
                    reason: Some(format!("Access denied by rule: {}", rule.rule_name)),
                    evaluated_attributes,
                }));
            }
        }

        Ok(SubResult::Abac(AbacResult {
            allowed: true,
            matched_rule: None,
            reason: None,
            evaluated_attributes,
        }))
    }
}
