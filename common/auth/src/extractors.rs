use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::validator::AuthValidator;

/// Rejects requests without a valid bearer token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

/// Anonymous requests yield `None`; a presented but invalid token still rejects.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<AuthContext>);

async fn authenticate_parts<S>(parts: &Parts, state: &S) -> Result<Option<AuthContext>, AuthError>
where
    Arc<AuthValidator>: FromRef<S>,
{
    let validator = Arc::<AuthValidator>::from_ref(state);
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    validator.authenticate(header).await
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Arc<AuthValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(Self(ctx.clone()));
        }

        let ctx = authenticate_parts(parts, state)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        parts.extensions.insert(ctx.clone());
        Ok(Self(ctx))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    Arc<AuthValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(Self(Some(ctx.clone())));
        }

        let ctx = authenticate_parts(parts, state).await?;
        if let Some(ctx) = &ctx {
            parts.extensions.insert(ctx.clone());
        }
        Ok(Self(ctx))
    }
}
