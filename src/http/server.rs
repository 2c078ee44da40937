//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app around the dispatcher
//! - Wire up middleware (request ID, tracing, timeout)
//! - Swap in a rebuilt router when the configuration changes
//! - Serve until the shutdown signal, then drain
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{body::Body, extract::State, http::Request, response::Response};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{self, Outcome};
use crate::http::router::{BuildError, Router};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    router: Arc<ArcSwap<Router>>,
}

impl AppState {
    fn new(router: Router) -> Self {
        Self {
            router: Arc::new(ArcSwap::from_pointee(router)),
        }
    }

    /// The router requests are currently dispatched to.
    pub fn router(&self) -> Arc<Router> {
        self.router.load_full()
    }

    /// Make `router` the one new requests are dispatched to. Requests
    /// already running finish on the old one.
    pub fn replace_router(&self, router: Router) {
        metrics::record_routes(router.tree().route_count());
        self.router.store(Arc::new(router));
    }
}

/// HTTP server for the router.
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server whose routes come from `config`.
    pub fn new(config: ServerConfig) -> Result<Self, BuildError> {
        let router = Router::from_config(&config)?;
        Ok(Self::with_router(config, router))
    }

    /// Create a server around a router built in code.
    ///
    /// Configuration updates received by [`run`](Self::run) still replace it
    /// with the router built from the new configuration.
    pub fn with_router(config: ServerConfig, router: Router) -> Self {
        metrics::record_routes(router.tree().route_count());
        Self {
            config,
            state: AppState::new(router),
        }
    }

    /// Shared state, for swapping the router from outside.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(&self) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch_handler)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Every configuration received on `config_updates` rebuilds the router;
    /// a configuration that fails to build is logged and the current router
    /// stays in place. Returns once `shutdown` fires and in-flight requests
    /// have completed.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.router().tree().route_count(),
            "HTTP server starting"
        );

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match Router::from_config(&config) {
                    Ok(router) => {
                        tracing::info!(routes = router.tree().route_count(), "Routes reloaded");
                        state.replace_router(router);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to rebuild router, keeping current routes");
                    }
                }
            }
        });

        let app = self.build_app();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Every request lands here and goes through the current router.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let router = state.router();
    let response = router.dispatch(request).await;

    let outcome = response::outcome_of(&response).unwrap_or(Outcome::Handled);
    let status = response.status();
    metrics::record_request(&method, status.as_u16(), outcome.as_str(), start);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        outcome = outcome.as_str(),
        "Request dispatched"
    );
    response
}
