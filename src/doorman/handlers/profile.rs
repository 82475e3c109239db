//! Protected profile read and update.
//!
//! Both handlers sit behind the `CurrentUser` gate. On update, a uniqueness
//! check only runs for a username/email that actually changes; keeping the
//! current value is never a self-conflict.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::doorman::{
    error::ApiError, extract::CurrentUser, password, response::ApiResponse, store::Account,
    AppState,
};

use super::{non_blank, normalize, valid_email};

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct UpdateProfileData {
    username: String,
    email: String,
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Authenticated account, password never included", content_type = "application/json"),
        (status = 400, description = "Token is missing or malformed"),
        (status = 401, description = "Invalid or expired token"),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
#[instrument(skip(state))]
pub async fn get_profile(
    user: CurrentUser,
    state: Extension<Arc<AppState>>,
) -> Result<ApiResponse<Account>, ApiError> {
    let account = state
        .store
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        account,
        "User details found!",
    ))
}

#[utoipa::path(
    put,
    path = "/api/update-profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileData, content_type = "application/json"),
        (status = 400, description = "Token missing or invalid email"),
        (status = 401, description = "Invalid or expired token"),
        (status = 409, description = "Username or email already held by another account"),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
#[instrument(skip(state, payload))]
pub async fn update_profile(
    user: CurrentUser,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> Result<ApiResponse<UpdateProfileData>, ApiError> {
    let request = payload.map_or_else(UpdateProfileRequest::default, |Json(payload)| payload);

    let mut account = state
        .store
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))?;

    if let Some(username) = non_blank(request.username.as_ref()) {
        let username = normalize(&username);

        // Unchanged value short-circuits the uniqueness check.
        if username != account.username {
            if state.store.find_by_username(&username).await?.is_some() {
                return Err(ApiError::Conflict("Username already taken!".to_string()));
            }
            account.username = username;
        }
    }

    if let Some(email) = non_blank(request.email.as_ref()) {
        let email = normalize(&email);

        if !valid_email(&email) {
            return Err(ApiError::Validation("Invalid email".to_string()));
        }

        if email != account.email {
            if state.store.find_by_email(&email).await?.is_some() {
                return Err(ApiError::Conflict("Email already in use!".to_string()));
            }
            account.email = email;
        }
    }

    if let Some(plain) = non_blank(request.password.as_ref()) {
        let hashed = password::hash(&plain)
            .map_err(|err| ApiError::Internal(format!("Error while hashing password: {err}")))?;
        account.password = Some(hashed);
    }

    let saved = state.store.save(&account).await?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        UpdateProfileData {
            username: saved.username,
            email: saved.email,
        },
        "User updated successfully!",
    ))
}
