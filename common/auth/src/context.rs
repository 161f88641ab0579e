use std::collections::BTreeSet;

use serde::Serialize;

use crate::claims::Claims;
use crate::roles::Role;

/// Trusted, request-scoped identity derived from a validated token.
///
/// Fields are read-only so `is_super_admin` always agrees with `roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    user_id: String,
    email: String,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    roles: BTreeSet<Role>,
    scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    is_super_admin: bool,
}

impl AuthContext {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        let is_super_admin = roles.contains(&Role::SuperAdmin);
        Self {
            user_id: user_id.into(),
            email: email.into(),
            username: username.into(),
            first_name: None,
            last_name: None,
            roles,
            // Scope-based authorization is not wired up; no scope claim is read.
            scopes: Vec::new(),
            tenant_id: None,
            is_super_admin,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    /// Project validated claims, silently dropping roles outside the vocabulary.
    pub fn from_claims(claims: Claims) -> Self {
        let roles = claims
            .roles
            .iter()
            .filter_map(|raw| raw.parse::<Role>().ok());

        let context = Self::new(claims.subject, claims.email, claims.username, roles)
            .with_names(claims.first_name, claims.last_name);
        match claims.tenant_id {
            Some(tenant_id) => context.with_tenant(tenant_id),
            None => context,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn is_super_admin(&self) -> bool {
        self.is_super_admin
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self::from_claims(claims)
    }
}
