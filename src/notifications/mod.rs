//! In-app notifications and the outbound WhatsApp message log

pub mod handlers;
pub mod model;

pub use model::{MessageStatus, Notification, WhatsAppMessage};

use crate::server::host::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications/{id}/read", patch(handlers::mark_read))
        .route("/api/notifications/read-all", post(handlers::mark_all_read))
}
