//! Web server module.

mod exposition;
mod handlers;

pub use exposition::*;
pub use handlers::*;

use crate::state::MetricState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricState>,
    pub exporter: Arc<Exporter>,
}

/// Scrape endpoint for dbprobe.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(metrics: Arc<MetricState>) -> Self {
        Self {
            state: AppState {
                metrics,
                exporter: Arc::new(Exporter::new()),
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        Router::new()
            .route("/metrics", get(handlers::handle_metrics))
            .route("/api/status", get(handlers::handle_get_status))
            .route("/api/status/{host}", get(handlers::handle_get_target_status))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let router = self.routes();

        tracing::info!("Web server listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}
