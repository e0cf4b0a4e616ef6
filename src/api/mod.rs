use crate::cli::globals::GlobalArgs;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
pub mod report;
pub mod storage;

pub use openapi::ApiDoc;

use handlers::auth::utils::{hash_password, normalize_email};
use handlers::{auth, health, users};

/// Build the application router; state is injected via `Extension` layers,
/// never referenced as module-level singletons.
pub fn app(pool: PgPool, globals: GlobalArgs, cors_origin: Option<&str>) -> Result<Router> {
    let cors = cors_layer(cors_origin)?;

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health))
        .route("/signin", post(auth::signin))
        .route("/logout", post(auth::logout))
        .route("/signup", post(auth::signup))
        .route("/signin_token", get(auth::signin_token))
        .route("/available", get(users::available))
        .route(
            "/",
            post(users::create_user)
                .get(users::list_users)
                .put(users::update_me),
        )
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
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
                .layer(cors)
                .layer(Extension(globals))
                .layer(Extension(pool)),
        );

    Ok(router)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    cors_origin: Option<String>,
    globals: &GlobalArgs,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    bootstrap_admin(&pool, globals).await?;

    let app = app(pool, globals.clone(), cors_origin.as_deref())?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Seed the bootstrap admin so the gate is passable on a fresh database.
async fn bootstrap_admin(pool: &PgPool, globals: &GlobalArgs) -> Result<()> {
    let Some(email) = &globals.admin_email else {
        return Ok(());
    };

    let password = globals.admin_password.expose_secret();
    if password.is_empty() {
        return Err(anyhow!("bootstrap admin requires a non-empty password"));
    }

    let email = normalize_email(email);
    let seeded = storage::ensure_admin(pool, &email, &hash_password(password))
        .await
        .context("Failed to seed bootstrap admin")?;

    if seeded {
        info!(email = %email, "seeded bootstrap admin");
    }

    Ok(())
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

/// Exact-origin CORS with credentials when configured, permissive otherwise.
fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    let headers = [CONTENT_TYPE, AUTHORIZATION];

    let Some(origin) = origin else {
        return Ok(CorsLayer::new()
            .allow_headers(headers)
            .allow_methods(methods)
            .allow_origin(Any));
    };

    Ok(CorsLayer::new()
        .allow_headers(headers)
        .allow_methods(methods)
        .allow_origin(AllowOrigin::exact(parse_origin(origin)?))
        .allow_credentials(true))
}

fn parse_origin(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid CORS origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let value = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&value).context("Failed to build CORS origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origin_strips_path_and_keeps_port() {
        let value = parse_origin("https://app.roster.fyi:8443/ignored").unwrap();
        assert_eq!(value, "https://app.roster.fyi:8443");

        let value = parse_origin("http://localhost:3000").unwrap();
        assert_eq!(value, "http://localhost:3000");
    }

    #[test]
    fn parse_origin_rejects_garbage() {
        assert!(parse_origin("not a url").is_err());
    }

    #[test]
    fn cors_layer_accepts_both_modes() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://app.roster.fyi")).is_ok());
    }
}
