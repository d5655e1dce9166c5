//! Server lifecycle management - router, startup, shutdown and signal handling

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use tenantbase_core::VERSION;
use tenantbase_orm::DatabasePool;

use crate::error::{HttpError, HttpResult};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<dyn DatabasePool>,
}

impl AppState {
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Health endpoint; 503 when the database does not answer
pub async fn health_check_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.pool.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version: VERSION,
                database: "up",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    version: VERSION,
                    database: "down",
                }),
            )
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Fail before binding when the database does not answer
pub async fn check_database(pool: &dyn DatabasePool) -> HttpResult<Duration> {
    let latency = pool
        .health_check()
        .await
        .map_err(|e| HttpError::database(e.to_string()))?;
    info!(latency_ms = latency.as_millis() as u64, "Database reachable");
    Ok(latency)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM
pub async fn start_server<A>(addr: A, router: Router) -> HttpResult<()>
where
    A: ToSocketAddrs + std::fmt::Display,
{
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| HttpError::startup(format!("Failed to bind to {}: {}", addr, e)))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| HttpError::startup(format!("Failed to read local address: {}", e)))?;
    info!(addr = %local_addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HttpError::serve(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            warn!("Received terminate signal, shutting down gracefully");
        },
    }
}
