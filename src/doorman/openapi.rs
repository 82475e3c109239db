//! OpenAPI document for the HTTP surface, served at `/openapi.json`.

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::handlers;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "doorman",
        description = "User registration, email verification and token-based authentication"
    ),
    paths(
        handlers::health::health,
        handlers::signup::signup,
        handlers::login::login,
        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::confirm_email::confirm_email,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and email verification"),
        (name = "profile", description = "Protected account resource"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
