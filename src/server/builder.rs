//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::AppConfig;
use crate::payments::gateway::PaymentGateway;
use crate::storage::Storage;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the campus HTTP server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(config)
///     .with_storage(Storage::in_memory())
///     .with_gateway(InMemoryGateway::new("rzp_test_key"))
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    storage: Option<Storage>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            storage: None,
            gateway: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage backend (required)
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the payment gateway (required)
    pub fn with_gateway(mut self, gateway: impl PaymentGateway + 'static) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    /// Same as [`with_gateway`](Self::with_gateway) for an already shared gateway
    pub fn with_shared_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Add routes that are not part of the built-in API
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the host holding all application state
    pub fn build_host(&mut self) -> Result<ServerHost> {
        let storage = self
            .storage
            .take()
            .ok_or_else(|| anyhow::anyhow!("Storage is required. Call .with_storage()"))?;
        let gateway = self
            .gateway
            .take()
            .ok_or_else(|| anyhow::anyhow!("PaymentGateway is required. Call .with_gateway()"))?;

        Ok(ServerHost::from_builder_components(
            self.config.clone(),
            storage,
            gateway,
        ))
    }

    /// Build the final router with tracing and CORS layers
    pub fn build(mut self) -> Result<Router> {
        let host = Arc::new(self.build_host()?);
        let router = RestExposure::build_router(host, std::mem::take(&mut self.custom_routes))?;

        Ok(router
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()))
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::gateway::InMemoryGateway;

    #[test]
    fn test_build_requires_storage() {
        let result = ServerBuilder::new()
            .with_gateway(InMemoryGateway::new("rzp_test"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_requires_gateway() {
        let result = ServerBuilder::new()
            .with_storage(Storage::in_memory())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_all_components() {
        let result = ServerBuilder::new()
            .with_storage(Storage::in_memory())
            .with_gateway(InMemoryGateway::new("rzp_test"))
            .with_custom_routes(Router::new())
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_custom_routes_are_served() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::routing::get;
        use tower::ServiceExt;

        let app = ServerBuilder::new()
            .with_storage(Storage::in_memory())
            .with_gateway(InMemoryGateway::new("rzp_test"))
            .with_custom_routes(Router::new().route("/api/ping", get(|| async { "pong" })))
            .build()
            .unwrap();

        let response = tokio_test::block_on(
            app.oneshot(Request::get("/api/ping").body(Body::empty()).unwrap()),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
