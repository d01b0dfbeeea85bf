//! Role-based access: organization hierarchy plus operation-specific gates.

use super::{AccessRequest, Evaluator, Stage};
use crate::decision::{RbacResult, SubResult};
use crate::errors::Result;
use crate::identity::OrganizationLevel;
use crate::rules::Operation;
use crate::store::DirectoryLookup;
use async_trait::async_trait;
use std::sync::Arc;

/// Role that bypasses the rest of RBAC (not ABAC/CBAC/row-level).
pub const ADMIN_ROLE: &str = "ADMIN";
pub const EXECUTIVE_ROLE: &str = "EXECUTIVE";
pub const DEPARTMENT_MANAGER_ROLE: &str = "DEPARTMENT_MANAGER";
pub const DATA_MANAGER_ROLE: &str = "DATA_MANAGER";
pub const EDITOR_ROLE: &str = "EDITOR";

/// Enforces organization-hierarchy and role-operation constraints.
pub struct RbacEvaluator {
    directory: Arc<dyn DirectoryLookup>,
}

impl RbacEvaluator {
    pub fn new(directory: Arc<dyn DirectoryLookup>) -> Self {
        Self { directory }
    }

    fn deny(reason: String, required_role: Option<&str>) -> SubResult {
        SubResult::Rbac(RbacResult {
            allowed: false,
            matched_role: None,
            required_role: required_role.map(str::to_owned),
            reason: Some(reason),
        })
    }

    /// The organization-level gate: who may see this row at all.
    async fn check_organization_level(
        &self,
        request: &AccessRequest<'_>,
    ) -> Result<Option<SubResult>> {
        let identity = request.identity;
        let record = request.record;

        match record.organization_level {
            OrganizationLevel::Executive => {
                if !identity.is_executive && !identity.has_role(EXECUTIVE_ROLE) {
                    return Ok(Some(Self::deny(
                        "Executive level data requires EXECUTIVE role".to_string(),
                        Some(EXECUTIVE_ROLE),
                    )));
                }
            }
            OrganizationLevel::Department => {
                if !identity.is_executive
                    && !identity.is_department_head
                    && !identity.has_any_role(&[EXECUTIVE_ROLE, DEPARTMENT_MANAGER_ROLE])
                {
                    let in_department = record
                        .department_id
                        .as_deref()
                        .is_some_and(|dept| identity.belongs_to_department(dept));
                    if !in_department {
                        return Ok(Some(Self::deny(
                            format!(
                                "Department level data requires membership in department: {}",
                                record.department_id.as_deref().unwrap_or("<none>")
                            ),
                            None,
                        )));
                    }
                }
            }
            OrganizationLevel::Team => {
                if !identity.is_executive && !identity.is_department_head {
                    let in_team = record
                        .team_id
                        .as_deref()
                        .is_some_and(|team| identity.belongs_to_team(team));
                    if !in_team {
                        return Ok(Some(Self::deny(
                            format!(
                                "Team level data requires membership in team: {}",
                                record.team_id.as_deref().unwrap_or("<none>")
                            ),
                            None,
                        )));
                    }
                }
            }
            OrganizationLevel::Individual => {
                let direct_access = record.is_owned_by(&identity.user_id)
                    || identity.is_executive
                    || identity.is_department_head;
                if !direct_access {
                    // Directory read only happens when it can change the
                    // outcome.
                    let owner_manager = self.directory.manager_of(&record.owner_id).await?;
                    if owner_manager.as_deref() != Some(identity.user_id.as_str()) {
                        return Ok(Some(Self::deny(
                            "Individual level data can only be accessed by owner or their \
                             management chain"
                                .to_string(),
                            None,
                        )));
                    }
                }
            }
        }

        Ok(None)
    }

    /// Operation-specific gates layered on top of the organization-level
    /// check; failing these denies even when the level check passed.
    fn check_operation_roles(request: &AccessRequest<'_>) -> Option<SubResult> {
        let identity = request.identity;
        let is_owner = request.record.is_owned_by(&identity.user_id);

        match request.operation {
            Operation::Delete => {
                if !identity.has_any_role(&[ADMIN_ROLE, DATA_MANAGER_ROLE]) && !is_owner {
                    return Some(Self::deny(
                        "DELETE operation requires ADMIN, DATA_MANAGER role, or data ownership"
                            .to_string(),
                        Some(DATA_MANAGER_ROLE),
                    ));
                }
            }
            Operation::Update => {
                if !identity.has_any_role(&[ADMIN_ROLE, DATA_MANAGER_ROLE, EDITOR_ROLE])
                    && !is_owner
                {
                    return Some(Self::deny(
                        "UPDATE operation requires appropriate role or data ownership".to_string(),
                        Some(EDITOR_ROLE),
                    ));
                }
            }
            Operation::Create | Operation::Read => {}
        }

        None
    }
}

#[async_trait]
impl Evaluator for RbacEvaluator {
    fn stage(&self) -> Stage {
        Stage::Rbac
    }

    async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<SubResult> {
        // Admin bypasses the rest of RBAC entirely.
        if request.identity.has_role(ADMIN_ROLE) {
            return Ok(SubResult::Rbac(RbacResult {
                allowed: true,
                matched_role: Some(ADMIN_ROLE.to_string()),
                ..Default::default()
            }));
        }

        if let Some(denial) = self.check_organization_level(request).await? {
            return Ok(denial);
        }

        if let Some(denial) = Self::check_operation_roles(request) {
            return Ok(denial);
        }

        Ok(SubResult::Rbac(RbacResult {
            allowed: true,
            matched_role: Some(request.identity.joined_roles()),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ClientContext;
    use crate::identity::IdentityContext;
    use crate::record::ProtectedRecord;
    use crate::store::InMemoryDirectory;
    use chrono::Utc;

    fn evaluator() -> (RbacEvaluator, Arc<InMemoryDirectory>) {
        let directory = Arc::new(InMemoryDirectory::new());
        (RbacEvaluator::new(directory.clone()), directory)
    }

    async fn run(
        evaluator: &RbacEvaluator,
        identity: &IdentityContext,
        record: &ProtectedRecord,
        operation: Operation,
    ) -> SubResult {
        let client = ClientContext::default();
        let request = AccessRequest {
            identity,
            record,
            operation,
            client: &client,
            now: Utc::now(),
        };
        evaluator.evaluate(&request).await.unwrap()
    }

    #[tokio::test]
    async fn admin_bypasses_every_organization_level() {
        let (evaluator, _) = evaluator();
        let admin = IdentityContext::new("root", "Root").with_role(ADMIN_ROLE);
        for level in [
            OrganizationLevel::Executive,
            OrganizationLevel::Department,
            OrganizationLevel::Team,
            OrganizationLevel::Individual,
        ] {
            let record = ProtectedRecord::new("r1", "x", level, "someone-else");
            for operation in [
                Operation::Create,
                Operation::Read,
                Operation::Update,
                Operation::Delete,
            ] {
                let result = run(&evaluator, &admin, &record, operation).await;
                assert!(result.allowed(), "{level} {operation} should pass");
            }
        }
    }

    #[tokio::test]
    async fn executive_record_requires_executive() {
        let (evaluator, _) = evaluator();
        let record = ProtectedRecord::new("r1", "x", OrganizationLevel::Executive, "ceo");

        let analyst = IdentityContext::new("bob", "Bob").with_role("ANALYST");
        let result = run(&evaluator, &analyst, &record, Operation::Read).await;
        assert!(!result.allowed());
        assert!(result.reason().unwrap().contains("EXECUTIVE"));

        let exec = IdentityContext::new("eve", "Eve").as_executive();
        assert!(run(&evaluator, &exec, &record, Operation::Read).await.allowed());

        let exec_role = IdentityContext::new("erin", "Erin").with_role(EXECUTIVE_ROLE);
        assert!(
            run(&evaluator, &exec_role, &record, Operation::Read)
                .await
                .allowed()
        );
    }

    #[tokio::test]
    async fn department_record_requires_membership_or_standing() {
        let (evaluator, _) = evaluator();
        let record = ProtectedRecord::new("r1", "x", OrganizationLevel::Department, "carol")
            .with_department("ENG");

        let member = IdentityContext::new("dave", "Dave").with_department("ENG");
        assert!(run(&evaluator, &member, &record, Operation::Read).await.allowed());

        let outsider = IdentityContext::new("oscar", "Oscar").with_department("SALES");
        let denied = run(&evaluator, &outsider, &record, Operation::Read).await;
        assert!(!denied.allowed());
        assert!(denied.reason().unwrap().contains("ENG"));

        let dept_manager =
            IdentityContext::new("mike", "Mike").with_role(DEPARTMENT_MANAGER_ROLE);
        assert!(
            run(&evaluator, &dept_manager, &record, Operation::Read)
                .await
                .allowed()
        );
    }

    #[tokio::test]
    async fn team_record_requires_membership_or_standing() {
        let (evaluator, _) = evaluator();
        let record =
            ProtectedRecord::new("r1", "x", OrganizationLevel::Team, "carol").with_team("CORE");

        let teammate = IdentityContext::new("tess", "Tess").with_team("CORE");
        assert!(run(&evaluator, &teammate, &record, Operation::Read).await.allowed());

        let outsider = IdentityContext::new("oscar", "Oscar").with_team("OTHER");
        assert!(!run(&evaluator, &outsider, &record, Operation::Read).await.allowed());

        let dept_head = IdentityContext::new("harry", "Harry").as_department_head();
        assert!(run(&evaluator, &dept_head, &record, Operation::Read).await.allowed());
    }

    #[tokio::test]
    async fn individual_record_allows_owner_and_their_manager() {
        let (evaluator, directory) = evaluator();
        directory.set_manager("owen", "mallory");
        let record = ProtectedRecord::new("r1", "x", OrganizationLevel::Individual, "owen");

        let owner = IdentityContext::new("owen", "Owen");
        assert!(run(&evaluator, &owner, &record, Operation::Read).await.allowed());

        let manager = IdentityContext::new("mallory", "Mallory");
        assert!(run(&evaluator, &manager, &record, Operation::Read).await.allowed());

        let unrelated = IdentityContext::new("uma", "Uma");
        let denied = run(&evaluator, &unrelated, &record, Operation::Read).await;
        assert!(!denied.allowed());
        assert!(denied.reason().unwrap().contains("management chain"));
    }

    #[tokio::test]
    async fn delete_and_update_have_extra_gates() {
        let (evaluator, _) = evaluator();
        let record =
            ProtectedRecord::new("r1", "x", OrganizationLevel::Team, "carol").with_team("CORE");

        // Team membership alone is not enough for DELETE/UPDATE.
        let teammate = IdentityContext::new("tess", "Tess").with_team("CORE");
        assert!(run(&evaluator, &teammate, &record, Operation::Read).await.allowed());
        assert!(!run(&evaluator, &teammate, &record, Operation::Update).await.allowed());
        assert!(!run(&evaluator, &teammate, &record, Operation::Delete).await.allowed());

        let editor = IdentityContext::new("ed", "Ed").with_team("CORE").with_role(EDITOR_ROLE);
        assert!(run(&evaluator, &editor, &record, Operation::Update).await.allowed());
        // EDITOR does not unlock DELETE.
        assert!(!run(&evaluator, &editor, &record, Operation::Delete).await.allowed());

        let data_manager = IdentityContext::new("dm", "DM")
            .with_team("CORE")
            .with_role(DATA_MANAGER_ROLE);
        assert!(run(&evaluator, &data_manager, &record, Operation::Delete).await.allowed());

        // Ownership unlocks both.
        let owner = IdentityContext::new("carol", "Carol").with_team("CORE");
        assert!(run(&evaluator, &owner, &record, Operation::Update).await.allowed());
        assert!(run(&evaluator, &owner, &record, Operation::Delete).await.allowed());
    }

    #[tokio::test]
    async fn success_reports_joined_roles() {
        let (evaluator, _) = evaluator();
        let record =
            ProtectedRecord::new("r1", "x", OrganizationLevel::Team, "carol").with_team("CORE");
        let identity = IdentityContext::new("tess", "Tess")
            .with_team("CORE")
            .with_roles(["ANALYST", "VIEWER"]);
        let result = run(&evaluator, &identity, &record, Operation::Read).await;
        match result {
            SubResult::Rbac(r) => {
                assert!(r.allowed);
                assert_eq!(r.matched_role.as_deref(), Some("ANALYST,VIEWER"));
            }
            _ => panic!("expected RBAC result"),
        }
    }
}
