//! HTTP server wiring for Prostream.
//!
//! Streaming routes are mounted under the configured base path so the
//! service can sit behind an existing reverse-proxy prefix.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use prostream_core::config::ProstreamConfig;
use prostream_core::hls::{FfprobeProber, ProcessRegistry, SessionManager, SessionReaper};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{create_session, serve_direct_file, serve_session_file, stop_session};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub config: ProstreamConfig,
}

/// Builds the application router with all streaming routes.
pub fn build_router(state: AppState) -> Router {
    let base_path = state.config.server.base_path.clone();

    let routes = Router::new()
        .route("/session", post(create_session))
        .route("/session/{session_id}", delete(stop_session))
        .route("/session/{session_id}/{*path}", get(serve_session_file))
        .route("/file/{*path}", get(serve_direct_file))
        .with_state(state);

    Router::new()
        .nest(&base_path, routes)
        .layer(CorsLayer::permissive())
}

/// Runs the HTTP server until a shutdown signal arrives, then tears down
/// every live session before returning.
pub async fn run_server(config: ProstreamConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(ProcessRegistry::new());
    let prober = Arc::new(FfprobeProber::new(config.hls.ffprobe_path.clone()));
    let session_manager = SessionManager::new(config.clone(), registry, prober);
    let reaper = SessionReaper::spawn(Arc::clone(&session_manager), config.reaper.clone());

    let state = AppState {
        session_manager,
        config: config.clone(),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Prostream server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Leaving transcoders running after exit would orphan ffmpeg processes
    reaper.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use prostream_core::hls::{HlsResult, MediaProber, TrackDescriptor};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    struct NoopProber;

    #[async_trait]
    impl MediaProber for NoopProber {
        async fn probe(&self, _source_url: &str) -> HlsResult<Vec<TrackDescriptor>> {
            Ok(vec![])
        }
    }

    fn test_state(dir: &TempDir) -> AppState {
        let config = ProstreamConfig::for_testing(dir.path().join("sessions"));
        let session_manager = SessionManager::new(
            config.clone(),
            Arc::new(ProcessRegistry::new()),
            Arc::new(NoopProber),
        );
        AppState {
            session_manager,
            config,
        }
    }

    #[tokio::test]
    async fn test_routes_mounted_under_base_path() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let app = build_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri("/streaming/session/abc123")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let app = build_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/nope")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_start_without_video_is_422() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let app = build_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/streaming/session")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(
                        serde_json::json!({ "url": "http://example.com/a.mkv" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
