//! Access decision engine combining role-based, attribute-based,
//! context-based, row-level, and column-level security.
//!
//! Every request for a protected record flows through a fixed pipeline
//! (RBAC, then ABAC, then CBAC, then row-level rules) and yields a single
//! auditable [`AccessDecision`] explaining which model allowed or denied it.
//! On the allow path the engine also resolves the visible-column set, so a
//! grant can be partial.
//!
//! # Example
//!
//! ```no_run
//! use record_access::{
//!     AccessEngine, ClientContext, EngineConfig, IdentityContext, Operation,
//!     OrganizationLevel, ProtectedRecord,
//! };
//! use record_access::store::{InMemoryDirectory, InMemoryRuleStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> record_access::Result<()> {
//! let engine = AccessEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryRuleStore::new()),
//!     Arc::new(InMemoryDirectory::new()),
//! );
//!
//! let identity = IdentityContext::new("alice", "Alice").with_team("PLATFORM");
//! let record = ProtectedRecord::new("r1", "Q3 report", OrganizationLevel::Team, "alice")
//!     .with_team("PLATFORM");
//!
//! let decision = engine
//!     .evaluate(&identity, &record, Operation::Read, &ClientContext::default())
//!     .await?;
//! println!("{}", decision.audit_summary());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod columns;
pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod errors;
pub mod evaluators;
pub mod identity;
pub mod record;
pub mod rules;
pub mod store;

pub use audit::{AuditEntry, AuditSink, TracingAuditSink};
pub use columns::{full_column_set, ColumnResolver, FieldChange, RecordPatch, ALL_COLUMNS};
pub use config::{BusinessHours, EngineConfig};
pub use context::ClientContext;
pub use decision::{
    AbacResult, AccessDecision, CbacResult, DenialReason, RbacResult, RowLevelResult, SubResult,
};
pub use engine::AccessEngine;
pub use errors::{AccessError, Result, RuleError, StoreError};
pub use evaluators::{AccessRequest, Evaluator, Stage};
pub use identity::{ClearanceLevel, IdentityContext, OrganizationLevel};
pub use record::{ProtectedRecord, SensitivityLevel};
pub use rules::{AccessRule, AttributeCondition, Operation, PrincipalType};
pub use store::{DirectoryLookup, RuleStore};
