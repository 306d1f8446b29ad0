//! Axum server setup
//!
//! - `POST /graphql` runs queries and multipart uploads, `GET /graphql` serves GraphiQL
//! - `GET /health` checks the database
//! - `/storage/*` serves uploaded images
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core::auth::AuthService;
use crate::core::db::health_check;
use crate::core::graphql::{AppSchema, Viewer, bearer_token};
use crate::core::storage::{ImageStore, STORAGE_PREFIX};

/// Largest accepted request body; a unit upload carries several images
pub const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// Allow any origin instead of localhost only
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            cors_permissive: false,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub schema: AppSchema,
    pub auth: AuthService,
    pub pool: PgPool,
    pub images: ImageStore,
}

/// Build the application router
pub fn router(state: AppState, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:4000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:4000"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let storage = ServeDir::new(state.images.storage_dir());

    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/health", get(health))
        .nest_service(&format!("/{STORAGE_PREFIX}"), storage)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn run_server(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    let app = router(state, config.cors_permissive);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    tracing::info!("GraphiQL: http://{}/graphql", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    let viewer = Viewer::from_token(&state.auth, token);

    state.schema.execute(req.into_inner().data(viewer)).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graphql::tests::{TestApp, test_app};
    use crate::core::validation::MAX_IMAGE_BYTES;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_router(app: &TestApp) -> Router {
        let state = AppState {
            schema: app.schema.clone(),
            auth: app.auth.clone(),
            pool: app.pool.clone(),
            images: app.images.clone(),
        };
        router(state, false)
    }

    async fn post_graphql(router: Router, token: Option<&str>, query: &str) -> serde_json::Value {
        let mut request = Request::builder()
            .method("POST")
            .uri("/graphql")
            .header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let body = json!({ "query": query }).to_string();

        let response = router
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const BOUNDARY: &str = "realtors-test-boundary";

    /// Multipart signUp request carrying one profile image
    fn sign_up_multipart(filename: &str, content: &[u8]) -> Request<Body> {
        let operations = json!({
            "query": "mutation($img: Upload!) { signUp(name: \"Ann\", email: \"ann@example.com\", \
                profileImage: $img, phoneNumber: \"0700\", password: \"secret\", accountState: true) \
                { ... on ApplicationErrors { errorMessage code } } }",
            "variables": { "img": null }
        });
        let map = json!({ "0": ["variables.img"] });

        let mut body = Vec::new();
        for (name, value) in [("operations", operations), ("map", map)] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"0\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/graphql")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn sign_up_errors(app: &TestApp, filename: &str, content: &[u8]) -> serde_json::Value {
        let response = app_router(app)
            .oneshot(sign_up_multipart(filename, content))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["data"]["signUp"].clone()
    }

    #[tokio::test]
    async fn test_sign_up_rejects_non_image_upload() {
        let app = test_app();

        let result = sign_up_errors(&app, "notes.txt", b"plain text").await;

        assert_eq!(result["code"], "BAD_USER_INPUT");
        assert!(result["errorMessage"].as_str().unwrap().contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_oversized_image() {
        let app = test_app();
        let content = vec![0u8; MAX_IMAGE_BYTES as usize + 1];

        let result = sign_up_errors(&app, "big.png", &content).await;

        assert_eq!(result["code"], "BAD_USER_INPUT");
        assert!(result["errorMessage"].as_str().unwrap().contains("too large"));
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 4000);
        assert!(!config.cors_permissive);
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let app = test_app();

        let response = app_router(&app)
            .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("graphiql"));
    }

    #[tokio::test]
    async fn test_bearer_token_reaches_guards() {
        let app = test_app();
        let query = "{ fetchProfile { ... on User { id } } }";

        let body = post_graphql(app_router(&app), None, query).await;
        assert_eq!(body["errors"][0]["message"], "Not authenticated");

        let body = post_graphql(app_router(&app), Some("garbage"), query).await;
        assert_eq!(body["errors"][0]["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_storage_serves_uploaded_files() {
        let app = test_app();
        let stored = app
            .images
            .store("front.png", std::io::Cursor::new(b"png-bytes".to_vec()))
            .await
            .unwrap();

        let response = app_router(&app)
            .oneshot(
                Request::builder()
                    .uri(&stored.file_path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");
    }
}
