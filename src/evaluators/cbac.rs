//! Context-based access: network origin and business hours.
//!
//! The only stage with no record argument; for a given request it is
//! identical across records.

use super::{AccessRequest, Evaluator, Stage};
use crate::config::EngineConfig;
use crate::decision::{CbacResult, SubResult};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Enforces ambient constraints from [`EngineConfig`].
pub struct CbacEvaluator {
    config: EngineConfig,
}

impl CbacEvaluator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Evaluator for CbacEvaluator {
    fn stage(&self) -> Stage {
        Stage::Cbac
    }

    async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<SubResult> {
        let hours = &self.config.business_hours;
        let local_time = request.now.with_timezone(&hours.timezone).time();
        let within_business_hours = hours.contains(local_time);

        // Context is recorded for audit even when the request is allowed.
        let mut evaluated_context = BTreeMap::new();
        evaluated_context.insert(
            "client_ip".to_string(),
            request
                .client
                .ip_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );
        if let Some(user_agent) = &request.client.user_agent {
            evaluated_context.insert("user_agent".to_string(), user_agent.clone());
        }
        evaluated_context.insert(
            "business_hours".to_string(),
            within_business_hours.to_string(),
        );

        if self.config.require_allowed_ip {
            // Fail-closed: an unresolvable address is treated as outside
            // every range.
            let allowed = request
                .client
                .ip_address
                .is_some_and(|ip| self.config.ip_allowed(ip));
            if !allowed {
                return Ok(SubResult::Cbac(CbacResult {
                    allowed: false,
                    reason: Some(
                        "Access denied: IP address not in allowed ranges".to_string(),
                    ),
                    evaluated_context,
                }));
            }
        }

        if self.config.require_business_hours && !within_business_hours {
            return Ok(SubResult::Cbac(CbacResult {
                allowed: false,
                reason: Some(format!(
                    "Access denied: Outside business hours ({} - {} {})",
                    hours.start.format("%H:%M"),
                    hours.end.format("%H:%M"),
                    hours.timezone
                )),
                evaluated_context,
            }));
        }

        Ok(SubResult::Cbac(CbacResult {
            allowed: true,
            reason: None,
            evaluated_context,
        }))
    }
}
