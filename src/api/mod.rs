//! REST API for the collected metrics
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Query service** shared through the router state; handlers never write
//!
//! ## Endpoints
//!
//! - `GET /api/current_metrics` - Newest record of every host
//! - `POST /api/historical_data` - Time series of one metric for one host
//! - `GET /api/health` - Storage health and statistics

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for browser dashboards on other origins
    pub enable_cors: bool,
}

/// Build the router with all routes and middleware
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/current_metrics", get(routes::metrics::current_metrics))
        .route("/api/historical_data", post(routes::metrics::historical_data))
        .route("/api/health", get(routes::health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
