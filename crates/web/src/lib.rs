//! bommerge web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Status and health endpoints
//! - Source registration and management API
//! - Merge and conflict-detection API
//! - Edit-commit API
//! - Merged-snapshot API (save, list, load, delete, export)
//! - Audit log API
//!
//! Authentication and access control are the hosting deployment's concern;
//! this API trusts its callers.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use bommerge_core::config::AppConfig;
use bommerge_core::db::Database;
use bommerge_core::snapshot::SnapshotExporter;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: std::sync::Mutex<Database>,
    pub config: AppConfig,
    /// External spreadsheet-writer collaborator, when one is wired in.
    pub exporter: Option<Arc<dyn SnapshotExporter>>,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server with the given dependencies.
    pub fn new(config: AppConfig, db: Database, exporter: Option<Arc<dyn SnapshotExporter>>) -> Self {
        let state = Arc::new(AppState {
            db: std::sync::Mutex::new(db),
            config,
            exporter,
        });
        Self { state }
    }

    /// Build the application router (exposed separately for tests).
    pub fn router(&self) -> Router {
        // CORS: allow the bundled web-ui (same origin) and localhost dev.
        // In production, restrict to the actual frontend origin.
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .merge(api::status::routes())
            .merge(api::sources::routes())
            .merge(api::merge::routes())
            .merge(api::snapshots::routes())
            .merge(api::audit::routes())
            // A parsed BOM upload is bigger than the usual JSON payload.
            .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the web server, listening on the given address.
    pub async fn start(self, listen_addr: &str) -> anyhow::Result<()> {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
