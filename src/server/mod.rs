//! HTTP server for the assistant API.
//!
//! Provides REST endpoints for:
//! - Chat turns and autocomplete
//! - Conversation listing, creation and switching
//! - Bulk deletion and facts inspection
//!
//! The chat endpoint reaches local tools, so browser callers are limited to
//! the configured origins. Requests carrying any other `Origin` are refused.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::memory::core::config::ServerConfig;

/// Build the full application: routes, origin policy and request tracing.
pub fn create_app(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let allowed: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.clone()))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(routes::SESSION_HEADER),
        ]);

    create_router(state)
        .layer(middleware::from_fn_with_state(
            Arc::new(allowed),
            reject_foreign_origin,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn reject_foreign_origin(
    State(allowed): State<Arc<Vec<HeaderValue>>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        if !allowed.contains(origin) {
            tracing::warn!("Refused request from origin {origin:?}");
            return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
        }
    }
    next.run(request).await
}

/// Start the HTTP server on loopback and stop accepting new connections when
/// `shutdown_signal` completes.
///
/// # Errors
/// Returns an error if the listener cannot be bound or serving fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    config: &ServerConfig,
    shutdown_signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state, &config.allowed_origins);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Assistant server listening on http://{}", addr);
    if config.allowed_origins.is_empty() {
        tracing::info!("No browser origins allowed; cross-origin requests are refused");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    use crate::memory::core::config::AssistantConfig;
    use crate::memory::storage::chat_store::SqliteChatStore;
    use crate::test_support::ScriptedGenerator;

    const FRONTEND: &str = "http://localhost:5173";

    async fn app(generator: Arc<ScriptedGenerator>) -> Router {
        let store = SqliteChatStore::open_in_memory().await.unwrap();
        let state = AppState::from_parts(Arc::new(store), generator, &AssistantConfig::default());
        create_app(Arc::new(state), &[FRONTEND.to_string()])
    }

    fn preflight(origin: &str) -> Request {
        axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    }

    fn chat(origin: Option<&str>, message: &str) -> Request {
        let mut builder = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder
            .body(Body::from(serde_json::json!({ "message": message }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_foreign_origin_preflight_is_not_allowed() {
        let app = app(Arc::new(ScriptedGenerator::replying(&[]))).await;

        let response = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_foreign_origin_request_is_refused() {
        let generator = Arc::new(ScriptedGenerator::replying(&[]));
        let app = app(generator.clone()).await;

        let response = app
            .clone()
            .oneshot(chat(Some("https://evil.example"), "read /etc/passwd"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );

        let response = app
            .oneshot(chat(Some("https://evil.example"), "hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_configured_origin_is_allowed() {
        let app = app(Arc::new(ScriptedGenerator::replying(&[]))).await;

        let response = app.clone().oneshot(preflight(FRONTEND)).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            FRONTEND
        );

        let response = app.oneshot(chat(Some(FRONTEND), "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            FRONTEND
        );
    }

    #[tokio::test]
    async fn test_requests_without_origin_pass() {
        let app = app(Arc::new(ScriptedGenerator::replying(&[]))).await;
        let response = app.oneshot(chat(None, "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_configured_origins_refuses_every_origin() {
        let store = SqliteChatStore::open_in_memory().await.unwrap();
        let generator = Arc::new(ScriptedGenerator::replying(&[]));
        let state = AppState::from_parts(Arc::new(store), generator, &AssistantConfig::default());
        let app = create_app(Arc::new(state), &[]);

        let response = app.clone().oneshot(chat(Some(FRONTEND), "hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(preflight(FRONTEND)).await.unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
