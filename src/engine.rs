//! The decision engine: runs the evaluation pipeline and assembles the
//! final [`AccessDecision`].

use crate::columns::{full_column_set, ColumnResolver};
use crate::config::EngineConfig;
use crate::context::ClientContext;
use crate::decision::AccessDecision;
use crate::errors::Result;
use crate::evaluators::{
    AbacEvaluator, AccessRequest, CbacEvaluator, Evaluator, RbacEvaluator, RowLevelEvaluator,
};
use crate::identity::IdentityContext;
use crate::record::ProtectedRecord;
use crate::rules::Operation;
use crate::store::{DirectoryLookup, RuleStore};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Evaluates access requests against the fixed RBAC → ABAC → CBAC →
/// row-level pipeline and resolves column visibility on the allow path.
///
/// The engine is stateless between calls: every decision is computed fresh
/// from its inputs and the rule store, with one timestamp fixed at entry so
/// all stages agree on "now".
pub struct AccessEngine {
    config: EngineConfig,
    pipeline: Vec<Box<dyn Evaluator>>,
    columns: ColumnResolver,
}

impl AccessEngine {
    pub fn new(
        config: EngineConfig,
        rule_store: Arc<dyn RuleStore>,
        directory: Arc<dyn DirectoryLookup>,
    ) -> Self {
        let mut pipeline: Vec<Box<dyn Evaluator>> = vec![
            Box::new(RbacEvaluator::new(directory)),
            Box::new(AbacEvaluator::new(rule_store.clone())),
            Box::new(CbacEvaluator::new(config.clone())),
        ];
        if config.row_level_enabled {
            pipeline.push(Box::new(RowLevelEvaluator::new(rule_store.clone())));
        }
        Self {
            config,
            pipeline,
            columns: ColumnResolver::new(rule_store),
        }
    }

    /// Replace the evaluation pipeline. Intended for tests that need to
    /// instrument or reorder stages.
    pub fn with_pipeline(mut self, pipeline: Vec<Box<dyn Evaluator>>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Evaluate one access request and return the full decision.
    ///
    /// Stages run in order and the first denial short-circuits: later stages
    /// are never consulted and their slots stay `None`. Column visibility is
    /// only resolved when every stage allowed.
    pub async fn evaluate(
        &self,
        identity: &IdentityContext,
        record: &ProtectedRecord,
        operation: Operation,
        client: &ClientContext,
    ) -> Result<AccessDecision> {
        let now = Utc::now();
        let mut decision =
            AccessDecision::start(&identity.user_id, &record.id, operation, now);
        let request = AccessRequest {
            identity,
            record,
            operation,
            client,
            now,
        };

        for evaluator in &self.pipeline {
            let stage = evaluator.stage();
            let result = evaluator.evaluate(&request).await?;
            let allowed = result.allowed();
            tracing::debug!(
                stage = stage.as_str(),
                user = %identity.user_id,
                record = %record.id,
                allowed,
                "pipeline stage evaluated"
            );
            if !allowed {
                decision.denial_reason = Some(result.denial_reason());
                decision.denial_details = result.reason().map(str::to_string);
                decision.record_stage(result);
                tracing::info!(
                    decision_id = %decision.decision_id,
                    user = %identity.user_id,
                    record = %record.id,
                    operation = %operation,
                    stage = stage.as_str(),
                    "access denied"
                );
                return Ok(decision);
            }
            decision.record_stage(result);
        }

        decision.allowed = true;
        let visible = if self.config.column_level_enabled {
            self.columns.resolve(identity, record, now).await?
        } else {
            full_column_set()
        };
        decision.partial_access = visible != full_column_set();
        decision.visible_columns = Some(visible);

        tracing::info!(
            decision_id = %decision.decision_id,
            user = %identity.user_id,
            record = %record.id,
            operation = %operation,
            partial = decision.partial_access,
            "access granted"
        );
        Ok(decision)
    }

    /// Resolve the visible-column set for an identity and record without
    /// running the full pipeline.
    pub async fn visible_columns(
        &self,
        identity: &IdentityContext,
        record: &ProtectedRecord,
    ) -> Result<BTreeSet<String>> {
        if !self.config.column_level_enabled {
            return Ok(full_column_set());
        }
        self.columns.resolve(identity, record, Utc::now()).await
    }
}
