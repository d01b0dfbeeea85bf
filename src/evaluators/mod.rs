//! The ordered evaluation pipeline.
//!
//! The fixed RBAC → ABAC → CBAC → row-level order is expressed as a list of
//! polymorphic evaluators sharing one interface, so each stage can be unit
//! tested in isolation and the order changed in one place if policy ever
//! does.

pub mod abac;
pub mod cbac;
pub mod rbac;
pub mod row_level;

use crate::context::ClientContext;
use crate::decision::SubResult;
use crate::errors::Result;
use crate::identity::IdentityContext;
use crate::record::ProtectedRecord;
use crate::rules::Operation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use abac::AbacEvaluator;
pub use cbac::CbacEvaluator;
pub use rbac::RbacEvaluator;
pub use row_level::RowLevelEvaluator;

/// Pipeline stage identifier, used for logging and test instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rbac,
    Abac,
    Cbac,
    RowLevel,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rbac => "rbac",
            Self::Abac => "abac",
            Self::Cbac => "cbac",
            Self::RowLevel => "row_level",
        }
    }
}

/// Everything one decision call carries through the pipeline. Borrowed from
/// the caller; nothing here is shared with any other in-flight call.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub identity: &'a IdentityContext,
    pub record: &'a ProtectedRecord,
    pub operation: Operation,
    pub client: &'a ClientContext,
    /// Decision timestamp, fixed once per call.
    pub now: DateTime<Utc>,
}

/// One stage of the decision pipeline.
///
/// A stage returns its sub-result; a denial is a normal result, an `Err`
/// means a collaborator failed and no decision can be made.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn stage(&self) -> Stage;

    async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<SubResult>;
}
