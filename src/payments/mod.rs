//! Payment gateway bridge
//!
//! Turns invoices into gateway orders and QR codes, and gateway callbacks
//! (checkout verification and webhooks) back into ledger postings.

pub mod bridge;
pub mod gateway;
pub mod handlers;
#[cfg(feature = "razorpay")]
pub mod razorpay;
pub mod signature;

pub use gateway::{InMemoryGateway, PaymentGateway, PaymentNotes};
#[cfg(feature = "razorpay")]
pub use razorpay::RazorpayGateway;

use crate::server::host::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/create-order", post(handlers::create_order))
        .route("/api/payments/setup-emi", post(handlers::setup_emi))
        .route("/api/payments/verify", post(handlers::verify_payment))
        .route("/api/payments/webhook", post(handlers::webhook))
        .route("/api/payments/qr-code", post(handlers::create_qr_code))
        .route("/api/payments/qr-code/{id}", get(handlers::get_qr_code))
}
