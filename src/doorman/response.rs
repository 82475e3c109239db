//! Success response envelope shared by all endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// `{statusCode, data, message, success: true}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    data: Option<T>,
    message: String,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn new(status: StatusCode, data: T, message: &str) -> Self {
        Self {
            status,
            data: Some(data),
            message: message.to_string(),
        }
    }

    /// Envelope with `data: null`, used by acknowledgement-only endpoints.
    #[must_use]
    pub fn empty(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            data: None,
            message: message.to_string(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "statusCode": self.status.as_u16(),
            "data": self.data,
            "message": self.message,
            "success": true,
        }));

        (self.status, body).into_response()
    }
}
