//! Registration flow.
//!
//! The lookup before `create` is a fast-fail courtesy; two concurrent
//! signups for the same name can both pass it, and the store's unique
//! constraint decides the winner. Mail dispatch never delays or fails
//! the response.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::doorman::{
    email, error::ApiError, password, response::ApiResponse, store::NewAccount, AppState,
};

use super::{non_blank, normalize, valid_email};

#[derive(ToSchema, Deserialize, Debug)]
pub struct SignupRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SignupData {
    id: Uuid,
    username: String,
    email: String,
}

#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registration successful", body = SignupData, content_type = "application/json"),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Username or email already exists"),
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn signup(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<ApiResponse<SignupData>, ApiError> {
    let request = payload
        .map(|Json(payload)| payload)
        .ok_or_else(|| ApiError::Validation("Missing required fields..!".to_string()))?;

    let (Some(username), Some(email), Some(password)) = (
        non_blank(request.username.as_ref()),
        non_blank(request.email.as_ref()),
        non_blank(request.password.as_ref()),
    ) else {
        return Err(ApiError::Validation("Missing required fields..!".to_string()));
    };

    let username = normalize(&username);
    let email = normalize(&email);

    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    debug!(username, email, "registering user");

    // Advisory check only; the store constraint is authoritative.
    if state
        .store
        .find_by_username_or_email(Some(&username), Some(&email))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "Username or Email already exists!".to_string(),
        ));
    }

    let hashed = password::hash(&password)
        .map_err(|err| ApiError::Internal(format!("Error while hashing password: {err}")))?;

    let account = state
        .store
        .create(NewAccount {
            username,
            email,
            password: hashed,
        })
        .await?;

    email::spawn_confirmation(
        Arc::clone(&state.mailer),
        account.username.clone(),
        account.email.clone(),
    );

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        SignupData {
            id: account.id,
            username: account.username,
            email: account.email,
        },
        "User has been registered successfully!",
    ))
}
