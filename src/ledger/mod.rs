//! Fee ledger: invoices, EMI installments and payments
//!
//! The rules live in [`model`] as pure functions over the records; the
//! [`store::LedgerStore`] backends persist their results atomically.

pub mod handlers;
pub mod model;
pub mod store;

pub use model::{
    FeeInvoice, FeePayment, InstallmentStatus, InvoiceStatus, PaymentInstallment, PaymentSource,
    PaymentStatus, PaymentType,
};
pub use store::LedgerStore;

use crate::server::host::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/fees/invoices",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route(
            "/api/fees/invoices/mark-overdue",
            post(handlers::mark_overdue),
        )
        .route("/api/fees/invoices/{id}", get(handlers::get_invoice))
        .route("/api/fees/payments", get(handlers::list_payments))
        .route("/api/fees/summary", get(handlers::fee_summary))
}
