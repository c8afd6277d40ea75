mod controller;
pub mod error;
pub mod pagination;
pub mod query;
pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use error::AppError;
use query::QueryAdapter;
use serde::Serialize;
use std::sync::Arc;
use store_sync::{BlockProgress, CaughtUp};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub chain_id: u64,
    pub schema_version: String,
    pub query: Arc<dyn QueryAdapter>,
    pub progress: BlockProgress,
    pub caught_up: CaughtUp,
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize, P: Serialize> {
    pub success: bool,
    pub items: T,
    pub next_page_params: Option<P>,
}

impl<T: Serialize, P: Serialize> IntoResponse for ApiResponse<T, P> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

type ApiResult<T, P> = Result<ApiResponse<T, P>, AppError>;

pub fn make_server(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(controller::healthz))
        .route("/readyz", get(controller::readyz))
        .route("/api/logs", get(controller::get_logs))
        .route("/api/status", get(controller::get_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until `shutdown` flips to `true`.
pub async fn start_api(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("API Server running on {}", listener.local_addr()?);

    axum::serve(listener, make_server(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("API Server stopped");
    Ok(())
}
