use crate::cli::globals::GlobalArgs;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub mod email;
pub mod error;
pub mod extract;
pub mod handlers;
mod openapi;
pub mod password;
pub mod response;
pub mod store;
pub mod token;

use email::Mailer;
use store::{AccountStore, PgAccountStore};
use token::TokenService;

/// Shared per-request context: the store, the token service and the mailer.
/// Read-only after startup; all mutable state lives behind the store.
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
}

/// Build the full application router around the given state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/profile", get(handlers::get_profile))
        .route("/update-profile", put(handlers::update_profile))
        .route("/confirm-email", get(handlers::confirm_email));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: GlobalArgs) -> Result<()> {
    // A missing signing secret is a startup fault; there is no default key.
    let tokens = TokenService::new(&globals.secret)
        .map_err(|err| anyhow!("Refusing to start: {err}"))?;

    let pool = connect(&dsn).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mailer = email::from_globals(&globals)?;

    let state = Arc::new(AppState {
        store: Arc::new(PgAccountStore::new(pool)),
        tokens,
        mailer,
    });

    let app = router(state).layer(cors(globals.cors_origin.as_deref())?);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_secs(5);

async fn connect(dsn: &str) -> Result<PgPool> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match PgPoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .test_before_acquire(true)
            .connect(dsn)
            .await
        {
            Ok(pool) => {
                info!("Database connected");
                return Ok(pool);
            }
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                error!("DB connection attempt {attempt} failed: {err}");
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
            Err(err) => {
                return Err(err).context(
                    "Unable to connect to the database after multiple attempts",
                );
            }
        }
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors(origin: Option<&str>) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    match origin {
        Some(origin) => Ok(layer
            .allow_origin(AllowOrigin::exact(exact_origin(origin)?))
            .allow_credentials(true)),
        None => Ok(layer.allow_origin(Any)),
    }
}

fn exact_origin(origin: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(origin).with_context(|| format!("Invalid CORS origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);

    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!("Failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_origin() {
        let origin = exact_origin("https://app.tld").expect("origin");
        assert_eq!(origin, HeaderValue::from_static("https://app.tld"));

        let origin = exact_origin("https://app.tld:8443/ignored/path").expect("origin");
        assert_eq!(origin, HeaderValue::from_static("https://app.tld:8443"));

        assert!(exact_origin("not a url").is_err());
    }
}
