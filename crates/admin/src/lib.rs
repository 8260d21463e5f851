//! Lumen Orders admin server library.
//!
//! Internal back office for the Eraya store: order management and the
//! packing workflow on top of orders synced from Shopify, plus staff
//! attendance, kanban tasks and user administration.
//!
//! The binary in `main.rs` wires configuration, tracing and background
//! jobs around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the full application: routes, CORS, request tracing and Sentry.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);

    routes::routes()
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the configured browser origins. Unparseable origins are
/// skipped; an empty list allows same-origin requests only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::USER_ID_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::IpAddr;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AppConfig, ShopifySettings};
    use crate::crypto::TokenCipher;

    // 32 zero bytes
    const TEST_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
    // Nothing listens on port 1; the pool never connects in these tests.
    const UNREACHABLE_DB: &str = "postgres://lumen@127.0.0.1:1/lumen";

    fn test_app() -> Router {
        let config = AppConfig {
            database_url: SecretString::from(UNREACHABLE_DB),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            encryption_key: SecretString::from(TEST_KEY),
            shopify: ShopifySettings::default(),
            recurring_interval: Duration::from_secs(60),
            cors_allowed_origins: vec!["https://ops.example.com".to_string()],
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new().connect_lazy(UNREACHABLE_DB).unwrap();
        let cipher = TokenCipher::from_base64_key(&config.encryption_key).unwrap();
        app(AppState::new(config, pool, cipher))
    }

    async fn detail(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_api_requires_identity_header() {
        let response = test_app()
            .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(detail(response).await, "Missing user identity");
    }

    #[tokio::test]
    async fn test_malformed_identity_header() {
        let request = Request::get("/api/orders")
            .header(middleware::USER_ID_HEADER, "not-a-number")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(detail(response).await, "Invalid user identity");
    }

    #[tokio::test]
    async fn test_cors_preflight_for_configured_origin() {
        let request = Request::options("/api/orders")
            .header("origin", "https://ops.example.com")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", middleware::USER_ID_HEADER)
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://ops.example.com"
        );
    }

    #[tokio::test]
    async fn test_unknown_origin_not_allowed() {
        let request = Request::options("/api/orders")
            .header("origin", "https://evil.example.net")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert!(
            !response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }
}
