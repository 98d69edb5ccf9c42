//! Server module for building the HTTP server
//!
//! The `ServerBuilder` assembles a [`ServerHost`] from a storage backend and
//! a payment gateway, then exposes it over REST:
//! - CRUD routes for every directory entity
//! - Fee ledger, payment, attendance and notification routes
//! - Health checks

pub mod builder;
pub mod entity_registry;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use entity_registry::{EntityRegistry, FetcherMap};
pub use exposure::RestExposure;
pub use host::{AppState, ServerHost};
