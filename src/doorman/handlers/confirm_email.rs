//! Verification flow, reached from the mailed confirmation link.
//!
//! The transition is one-way: a second visit for an already verified
//! account is rejected with a conflict, never silently accepted.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use utoipa::IntoParams;

use crate::doorman::{error::ApiError, response::ApiResponse, AppState};

use super::{non_blank, normalize};

#[derive(Deserialize, IntoParams, Debug)]
pub struct ConfirmEmailQuery {
    email: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/confirm-email",
    params(ConfirmEmailQuery),
    responses(
        (status = 202, description = "Email verified, account can now log in"),
        (status = 403, description = "Unknown or missing email"),
        (status = 409, description = "Already verified"),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn confirm_email(
    state: Extension<Arc<AppState>>,
    Query(query): Query<ConfirmEmailQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let email = non_blank(query.email.as_ref())
        .map(|email| normalize(&email))
        .ok_or_else(|| ApiError::Forbidden("Invalid verification link".to_string()))?;

    let account = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Invalid verification link".to_string()))?;

    if account.is_verified {
        return Err(ApiError::Conflict("Already verified!".to_string()));
    }

    state.store.mark_verified(account.id).await?;

    Ok(ApiResponse::empty(
        StatusCode::ACCEPTED,
        "Your email has been successfully verified. You can now log in.",
    ))
}
