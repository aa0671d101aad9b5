//! HTTP server for the lineage query API.

pub mod api;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::{AppState, ServerConfig};

/// Run the HTTP server. Blocks until shut down via Ctrl+C.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::new(config).await?);

    let app = build_router(state, port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    println!("lineagelens: serving lineage API on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("\nlineagelens: server stopped");
    Ok(())
}

/// Build the main router with all routes.
///
/// CORS is restricted to localhost origins: the server only binds to
/// loopback, but without the restriction any website could read the cache
/// through the browser.
pub fn build_router(state: Arc<AppState>, port: u16) -> Router {
    let allowed_origins = [
        format!("http://localhost:{port}").parse().unwrap(),
        format!("http://127.0.0.1:{port}").parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", api::api_routes())
        .with_state(state)
        .layer(cors)
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
}
