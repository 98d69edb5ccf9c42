//! Storage trait for the fee ledger

use super::model::{
    FailedPosting, FeeInvoice, FeePayment, OverdueReport, PaymentInstallment, Posting,
    PostingOutcome,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// Persistence for invoices, installments and payments
///
/// Every mutating method is atomic: the in-memory backend holds one lock for
/// the whole operation and the PostgreSQL backend runs one transaction.
/// Business-rule failures are returned as `LedgerError` inside the
/// `anyhow::Error`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new invoice; fails with `DUPLICATE_INVOICE_NUMBER`
    async fn create_invoice(&self, invoice: FeeInvoice) -> Result<FeeInvoice>;

    async fn get_invoice(&self, id: &Uuid) -> Result<Option<FeeInvoice>>;

    /// All invoices, oldest first
    async fn list_invoices(&self) -> Result<Vec<FeeInvoice>>;

    /// Installments of an invoice ordered by installment number
    async fn installments(&self, invoice_id: &Uuid) -> Result<Vec<PaymentInstallment>>;

    /// All payments, oldest first
    async fn list_payments(&self) -> Result<Vec<FeePayment>>;

    async fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<FeePayment>>;

    /// Create the two-part plan for an invoice
    async fn create_emi_plan(
        &self,
        invoice_id: &Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PaymentInstallment>>;

    /// Apply a captured amount; replays of a gateway payment id are reported
    /// as duplicates without being re-applied
    async fn apply_payment(&self, posting: Posting) -> Result<PostingOutcome>;

    /// Record a failed attempt without touching the invoice
    async fn record_failed_payment(&self, failure: FailedPosting) -> Result<FeePayment>;

    /// Flag unpaid invoices and pending installments whose due date passed
    async fn mark_overdue(&self, today: NaiveDate) -> Result<OverdueReport>;
}
