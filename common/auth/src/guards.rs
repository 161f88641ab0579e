use tracing::warn;

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// A single authorization check evaluated against a non-super-admin context.
#[derive(Debug, Clone, Copy)]
pub enum Requirement<'a> {
    Role(Role),
    AnyRole(&'a [Role]),
    Tenant(&'a str),
}

impl Requirement<'_> {
    fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        match self {
            Requirement::Role(role) => ctx.has_role(*role),
            Requirement::AnyRole(roles) => roles.iter().any(|role| ctx.has_role(*role)),
            Requirement::Tenant(tenant_id) => ctx
                .tenant_id()
                .is_some_and(|own| own == *tenant_id),
        }
    }

    fn denial(&self) -> String {
        match self {
            Requirement::Role(role) => format!("Missing required role: {role}"),
            Requirement::AnyRole(roles) if roles.is_empty() => {
                "Missing required role, expected one of: none".to_string()
            }
            Requirement::AnyRole(roles) => format!(
                "Missing required role, expected one of: {}",
                roles
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Requirement::Tenant(tenant_id) => format!("Access denied to tenant {tenant_id}"),
        }
    }
}

/// Evaluate a requirement. Absent context is `Unauthorized`; super-admins
/// pass every requirement.
pub fn authorize(ctx: Option<&AuthContext>, requirement: Requirement<'_>) -> AuthResult<()> {
    let ctx = ctx.ok_or(AuthError::Unauthorized)?;
    if ctx.is_super_admin() || requirement.is_satisfied_by(ctx) {
        return Ok(());
    }

    warn!(
        user_id = %ctx.user_id(),
        tenant_id = ?ctx.tenant_id(),
        required = ?requirement,
        roles = ?ctx.roles(),
        "authorization_denied"
    );
    Err(AuthError::Forbidden(requirement.denial()))
}

pub fn require_role(ctx: Option<&AuthContext>, role: Role) -> AuthResult<()> {
    authorize(ctx, Requirement::Role(role))
}

/// An empty `roles` slice can only be satisfied by a super-admin.
pub fn require_any_role(ctx: Option<&AuthContext>, roles: &[Role]) -> AuthResult<()> {
    authorize(ctx, Requirement::AnyRole(roles))
}

pub fn require_tenant_access(ctx: Option<&AuthContext>, tenant_id: &str) -> AuthResult<()> {
    authorize(ctx, Requirement::Tenant(tenant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::ALL_ROLES;
    use uuid::Uuid;

    fn ctx(roles: &[Role]) -> AuthContext {
        AuthContext::new(Uuid::new_v4().to_string(), "u@example.com", "u", roles.iter().copied())
    }

    fn assert_forbidden(result: AuthResult<()>, expected: &str) {
        match result {
            Err(AuthError::Forbidden(message)) => assert_eq!(message, expected),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn missing_context_is_unauthorized() {
        assert!(matches!(
            require_role(None, Role::Student),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            require_any_role(None, &[Role::Student]),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            require_tenant_access(None, "tenant"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn require_role_checks_membership() {
        let student = ctx(&[Role::Student]);
        assert!(require_role(Some(&student), Role::Student).is_ok());
        assert_forbidden(
            require_role(Some(&student), Role::Instructor),
            "Missing required role: INSTRUCTOR",
        );
    }

    #[test]
    fn super_admin_passes_every_role_check() {
        let admin = ctx(&[Role::SuperAdmin]);
        for role in ALL_ROLES {
            assert!(require_role(Some(&admin), *role).is_ok());
        }
        assert!(require_any_role(Some(&admin), &[]).is_ok());
        assert!(require_any_role(Some(&admin), &[Role::Researcher]).is_ok());
    }

    #[test]
    fn require_any_role_needs_overlap() {
        let instructor = ctx(&[Role::Instructor, Role::Researcher]);
        assert!(require_any_role(Some(&instructor), &[Role::OrgAdmin, Role::Researcher]).is_ok());
        assert_forbidden(
            require_any_role(Some(&instructor), &[Role::Student, Role::OrgAdmin]),
            "Missing required role, expected one of: STUDENT, ORG_ADMIN",
        );
    }

    #[test]
    fn require_any_role_with_empty_list_is_forbidden() {
        let org_admin = ctx(&[Role::OrgAdmin]);
        assert_forbidden(
            require_any_role(Some(&org_admin), &[]),
            "Missing required role, expected one of: none",
        );
    }

    #[test]
    fn tenant_access_requires_exact_match() {
        let tenant = Uuid::new_v4().to_string();
        let member = ctx(&[Role::Student]).with_tenant(tenant.as_str());

        assert!(require_tenant_access(Some(&member), &tenant).is_ok());

        let other = Uuid::new_v4().to_string();
        assert_forbidden(
            require_tenant_access(Some(&member), &other),
            &format!("Access denied to tenant {other}"),
        );
        assert!(require_tenant_access(Some(&member), &tenant.to_uppercase()).is_err());
    }

    #[test]
    fn tenant_access_compares_the_claim_as_written() {
        let tenant = Uuid::new_v4().to_string().to_uppercase();
        let member = ctx(&[Role::Student]).with_tenant(tenant.as_str());

        assert!(require_tenant_access(Some(&member), &tenant).is_ok());
        assert!(require_tenant_access(Some(&member), &tenant.to_lowercase()).is_err());
    }

    #[test]
    fn context_without_tenant_never_matches() {
        let floating = ctx(&[Role::OrgAdmin]);
        assert!(require_tenant_access(Some(&floating), "").is_err());
        assert!(require_tenant_access(Some(&floating), &Uuid::nil().to_string()).is_err());
    }

    #[test]
    fn super_admin_crosses_tenants() {
        let admin = ctx(&[Role::SuperAdmin]).with_tenant(Uuid::new_v4().to_string());
        assert!(require_tenant_access(Some(&admin), "any-other-tenant").is_ok());

        let floating_admin = ctx(&[Role::SuperAdmin]);
        assert!(require_tenant_access(Some(&floating_admin), "").is_ok());
    }
}
