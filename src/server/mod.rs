mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::io;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Settings;
use crate::site::SiteDirectory;

pub fn build_router(settings: Settings, directory: Arc<dyn SiteDirectory>) -> Router {
    let state = Arc::new(AppState { settings, directory });

    Router::new()
        .route("/api/sites", get(handlers::sites))
        .route("/api/selection", get(handlers::selection))
        .route("/api/check", post(handlers::check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, settings: Settings, directory: Arc<dyn SiteDirectory>) -> io::Result<()> {
    let app = build_router(settings, directory);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "sitefence server listening");
    axum::serve(listener, app).await
}
