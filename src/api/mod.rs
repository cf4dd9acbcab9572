pub mod handlers;
pub mod models;
pub mod router;

use crate::cache::RatesCache;
use crate::refresh::StatusBoard;
use axum::Router;
use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Everything the handlers read from. Both halves are cheap shared handles.
#[derive(Clone)]
pub struct AppState {
    pub cache: RatesCache,
    pub status: StatusBoard,
}

pub struct ApiServer {
    state: AppState,
    prometheus_layer: PrometheusMetricLayer<'static>,
    metrics_route: Router,
}

impl ApiServer {
    /// Installs the global Prometheus recorder. Build the server before
    /// anything emits metrics, or those samples are lost. The recorder can
    /// only be installed once per process.
    pub fn new(cache: RatesCache, status: StatusBoard) -> Self {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        let metrics_route = Router::new().route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        );
        Self {
            state: AppState { cache, status },
            prometheus_layer,
            metrics_route,
        }
    }

    /// The full served stack: data routes, `/metrics` and middleware.
    pub fn app(&self) -> Router {
        // prometheus stays outermost: Cors needs a `Default` inner body
        router::build(self.state.clone())
            .merge(self.metrics_route.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(self.prometheus_layer.clone())
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
    }

    /// Binds the server to the configured port and serves until Ctrl+C.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let app = self.app();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("API server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
