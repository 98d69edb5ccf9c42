//! REST API exposure
//!
//! Consumes a `ServerHost` and produces the Axum `Router` serving health
//! checks, the directory CRUD routes and every domain endpoint.

use super::super::host::ServerHost;
use crate::{attendance, ledger, notifications, payments};
use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// Name reported by the health endpoints
pub const SERVICE_NAME: &str = "campus-api";

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - Directory entity CRUD routes
    /// - Fee, payment, attendance and notification routes
    /// - Custom routes
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let domain_routes = Router::new()
            .merge(ledger::routes())
            .merge(payments::routes())
            .merge(attendance::routes())
            .merge(notifications::routes())
            .with_state(host.clone());

        let mut app = Self::health_routes()
            .merge(host.entity_registry.build_routes())
            .merge(domain_routes);

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": SERVICE_NAME
        }))
    }
}
