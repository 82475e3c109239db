//! Bearer token gate for protected handlers.
//!
//! Handlers that take a `CurrentUser` argument only run for requests carrying
//! a valid `Authorization: Bearer` token that still resolves to a live
//! account. The account may have disappeared after token issuance, so the
//! lookup is part of the gate.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{error::ApiError, AppState};

/// Minimal identity resolved from an inbound bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| {
                ApiError::Configuration("application state is not attached".to_string())
            })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Validation("Token is missing or malformed".to_string()))?;

        let claims = state.tokens.verify(token)?;

        // The account may have been removed since issuance; only a live
        // account passes the gate. Project the username, nothing more.
        let account = state
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

        Ok(Self {
            id: account.id,
            username: account.username,
        })
    }
}
