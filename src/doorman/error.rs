//! API error taxonomy.
//!
//! Every flow surfaces one of these variants; the `IntoResponse` impl is the
//! single boundary that turns them into the wire envelope
//! `{statusCode, message, success: false}`. Server-side faults keep their
//! detail in the logs and reach the client as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::store::StoreError;
use super::token::TokenError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            // Detail stays in the logs, the client gets a generic message.
            Self::Configuration(detail) | Self::Internal(detail) => {
                error!("server fault: {detail}");
                "Server Error".to_string()
            }
        };

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": message,
            "success": false,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Database(err) => Self::Internal(format!("database error: {err}")),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::Unauthorized("Token expired".to_string()),
            TokenError::Invalid => Self::Unauthorized("Invalid token".to_string()),
            TokenError::MissingSecret => {
                Self::Configuration("access token secret is not configured".to_string())
            }
        }
    }
}
