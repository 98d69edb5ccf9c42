//! campus-api server binary
//!
//! Reads `campus.yaml` (or the file named by `CAMPUS_CONFIG`), applies
//! environment overrides and serves the REST API until Ctrl+C or SIGTERM.

use anyhow::Result;
use campus::config::AppConfig;
use campus::payments::{InMemoryGateway, PaymentGateway};
use campus::server::ServerBuilder;
use campus::storage::Storage;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campus=info,campus_api=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let addr = config.bind_address();

    let storage = storage(&config).await?;
    let gateway = gateway(&config)?;

    tracing::info!(
        school = %config.school.name,
        gateway = gateway.key_id(),
        "Starting campus-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    ServerBuilder::new()
        .with_config(config)
        .with_storage(storage)
        .with_shared_gateway(gateway)
        .serve(&addr)
        .await
}

#[cfg(feature = "postgres")]
async fn storage(config: &AppConfig) -> Result<Storage> {
    match &config.database.url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await?;
            campus::storage::postgres::migrate(&pool).await?;
            tracing::info!("Using PostgreSQL storage");
            Ok(Storage::postgres(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            Ok(Storage::in_memory())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn storage(config: &AppConfig) -> Result<Storage> {
    if config.database.url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory storage");
    } else {
        tracing::info!("Using in-memory storage");
    }
    Ok(Storage::in_memory())
}

#[cfg(feature = "razorpay")]
fn gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
    if config.payments.gateway_configured() {
        tracing::info!("Using Razorpay gateway");
        return Ok(Arc::new(campus::payments::RazorpayGateway::new(
            &config.payments,
        )?));
    }
    Ok(local_gateway(config))
}

#[cfg(not(feature = "razorpay"))]
fn gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
    Ok(local_gateway(config))
}

fn local_gateway(config: &AppConfig) -> Arc<dyn PaymentGateway> {
    tracing::warn!("Payment gateway not configured, using the in-memory gateway");
    let key_id = if config.payments.key_id.is_empty() {
        "rzp_test_local"
    } else {
        config.payments.key_id.as_str()
    };
    Arc::new(InMemoryGateway::new(key_id))
}
