//! Authentication flow: credential lookup, verification gate, password
//! check, token issuance. Unverified accounts never authenticate, even with
//! the correct password.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::doorman::{error::ApiError, password, response::ApiResponse, AppState};

use super::{non_blank, normalize};

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginData {
    username: String,
    email: String,
    token: String,
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginData, content_type = "application/json"),
        (status = 400, description = "Missing identifier/password or wrong password"),
        (status = 403, description = "Account not verified yet"),
        (status = 404, description = "No account for the given identifier"),
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<ApiResponse<LoginData>, ApiError> {
    let request = payload.map(|Json(payload)| payload).ok_or_else(|| {
        ApiError::Validation("Username or email is required to sign in!".to_string())
    })?;

    let username = non_blank(request.username.as_ref()).map(|u| normalize(&u));
    let email = non_blank(request.email.as_ref()).map(|e| normalize(&e));

    if username.is_none() && email.is_none() {
        return Err(ApiError::Validation(
            "Username or email is required to sign in!".to_string(),
        ));
    }

    let Some(plain) = non_blank(request.password.as_ref()) else {
        return Err(ApiError::Validation("Please provide password!".to_string()));
    };

    // The one read path that includes the password hash.
    let account = state
        .store
        .find_credentials_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid username or email".to_string()))?;

    if !account.is_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email to login!".to_string(),
        ));
    }

    let hashed = account.password.as_deref().ok_or_else(|| {
        ApiError::Internal("credential lookup returned no password hash".to_string())
    })?;

    let matches = password::verify(&plain, hashed)
        .map_err(|err| ApiError::Internal(format!("Error comparing password: {err}")))?;

    if !matches {
        return Err(ApiError::Validation("Invalid credentials".to_string()));
    }

    let token = state
        .tokens
        .issue(account.id, &account.username)
        .map_err(|err| ApiError::Internal(format!("Failed to sign access token: {err}")))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        LoginData {
            username: account.username,
            email: account.email,
            token,
        },
        "User logged in successfully!",
    ))
}
