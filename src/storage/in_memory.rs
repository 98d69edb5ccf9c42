//! In-memory storage backends for testing and development
//!
//! Each store keeps its rows behind a single `RwLock`. Multi-row operations
//! run entirely under one write guard, which is what makes the ledger and
//! attendance operations atomic here. Guards are never held across an
//! `.await`.

use crate::attendance::model::{Attendance, MarkOutcome, StaffAttendance};
use crate::attendance::store::AttendanceStore;
use crate::core::error::{EntityError, LedgerError};
use crate::core::{Data, DataService, Entity};
use crate::ledger::model::{
    FailedPosting, FeeInvoice, FeePayment, InvoiceStatus, OverdueReport, PaymentInstallment,
    PaymentStatus, Posting, PostingOutcome, apply_posting, ensure_plan_allowed, failed_payment,
    mark_overdue_installments, plan_installments,
};
use crate::ledger::store::LedgerStore;
use crate::notifications::model::Notification;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// InMemoryDataService<T>
// ---------------------------------------------------------------------------

/// In-memory data service implementation
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
pub struct InMemoryDataService<T> {
    entities: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Clone for InMemoryDataService<T> {
    fn clone(&self) -> Self {
        Self {
            entities: self.entities.clone(),
        }
    }
}

impl<T: Data> InMemoryDataService<T> {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Synchronous insert, usable while another store holds its own lock
    pub fn insert(&self, entity: T) -> Result<T> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        entities.insert(entity.id(), entity.clone());
        Ok(entity)
    }
}

impl<T: Data> Default for InMemoryDataService<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Data> DataService<T> for InMemoryDataService<T> {
    async fn create(&self, entity: T) -> Result<T> {
        self.insert(entity)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(entities.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut all: Vec<T> = entities.values().cloned().collect();
        all.sort_by_key(|e| (e.created_at(), e.id()));
        Ok(all)
    }

    async fn update(&self, id: &Uuid, entity: T) -> Result<T> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let slot = entities
            .get_mut(id)
            .ok_or_else(|| EntityError::not_found(T::resource_name_singular(), *id))?;
        *slot = entity.clone();

        Ok(entity)
    }

    async fn delete(&self, id: &Uuid) -> Result<Option<T>> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(entities.remove(id))
    }

    async fn search(&self, field: &str, value: &str) -> Result<Vec<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut found: Vec<T> = entities
            .values()
            .filter(|entity| {
                entity
                    .field_value(field)
                    .is_some_and(|v| v.matches_query(value))
            })
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.created_at(), e.id()));
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedgerStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    invoices: HashMap<Uuid, FeeInvoice>,
    installments: HashMap<Uuid, Vec<PaymentInstallment>>,
    payments: Vec<FeePayment>,
    /// (gateway payment id, status) -> index into `payments`
    by_gateway_id: HashMap<(String, PaymentStatus), usize>,
}

/// In-memory ledger; notifications are written to the shared notification
/// service while the ledger lock is held
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    notifications: InMemoryDataService<Notification>,
}

impl InMemoryLedgerStore {
    pub fn new(notifications: InMemoryDataService<Notification>) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            notifications,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|e| anyhow!("Failed to acquire ledger read lock: {}", e))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|e| anyhow!("Failed to acquire ledger write lock: {}", e))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_invoice(&self, invoice: FeeInvoice) -> Result<FeeInvoice> {
        let mut state = self.write()?;

        if state
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(LedgerError::DuplicateInvoiceNumber {
                number: invoice.invoice_number,
            }
            .into());
        }

        state.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &Uuid) -> Result<Option<FeeInvoice>> {
        Ok(self.read()?.invoices.get(id).cloned())
    }

    async fn list_invoices(&self) -> Result<Vec<FeeInvoice>> {
        let mut all: Vec<FeeInvoice> = self.read()?.invoices.values().cloned().collect();
        all.sort_by_key(|i| (i.created_at, i.id));
        Ok(all)
    }

    async fn installments(&self, invoice_id: &Uuid) -> Result<Vec<PaymentInstallment>> {
        let mut rows = self
            .read()?
            .installments
            .get(invoice_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|i| i.installment_number);
        Ok(rows)
    }

    async fn list_payments(&self) -> Result<Vec<FeePayment>> {
        Ok(self.read()?.payments.clone())
    }

    async fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<FeePayment>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .filter(|p| &p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn create_emi_plan(
        &self,
        invoice_id: &Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PaymentInstallment>> {
        let mut state = self.write()?;

        let invoice = state
            .invoices
            .get(invoice_id)
            .ok_or(LedgerError::InvoiceNotFound { id: *invoice_id })?;
        let existing = state
            .installments
            .get(invoice_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        ensure_plan_allowed(invoice, existing)?;

        let plan = plan_installments(invoice, today);
        state.installments.insert(*invoice_id, plan.clone());

        tracing::info!(invoice_id = %invoice_id, "Created EMI plan");
        Ok(plan)
    }

    async fn apply_payment(&self, posting: Posting) -> Result<PostingOutcome> {
        let mut guard = self.write()?;
        let LedgerState {
            invoices,
            installments,
            payments,
            by_gateway_id,
        } = &mut *guard;

        let invoice = invoices
            .get_mut(&posting.invoice_id)
            .ok_or(LedgerError::InvoiceNotFound {
                id: posting.invoice_id,
            })?;
        let plan = installments.entry(posting.invoice_id).or_default();

        let key = (posting.gateway_payment_id.clone(), PaymentStatus::Completed);
        if let Some(&idx) = by_gateway_id.get(&key) {
            let payment = payments[idx].clone();
            tracing::info!(
                gateway_payment_id = %posting.gateway_payment_id,
                "Payment already applied, skipping replay"
            );
            return Ok(PostingOutcome {
                invoice: invoice.clone(),
                installment: plan
                    .iter()
                    .find(|i| i.payment_id == Some(payment.id))
                    .cloned(),
                payment,
                duplicate: true,
            });
        }

        // Work on copies so a rejected posting leaves nothing half-applied
        let mut next_invoice = invoice.clone();
        let mut next_plan = plan.clone();
        let applied = apply_posting(&mut next_invoice, &mut next_plan, &posting, Utc::now())?;
        self.notifications.insert(applied.notification)?;

        *invoice = next_invoice;
        *plan = next_plan;
        by_gateway_id.insert(key, payments.len());
        payments.push(applied.payment.clone());

        tracing::info!(
            invoice_id = %invoice.id,
            amount = applied.payment.amount,
            status = %invoice.status,
            "Applied payment"
        );

        Ok(PostingOutcome {
            invoice: invoice.clone(),
            installment: applied.settled.first().map(|idx| plan[*idx].clone()),
            payment: applied.payment,
            duplicate: false,
        })
    }

    async fn record_failed_payment(&self, failure: FailedPosting) -> Result<FeePayment> {
        let mut guard = self.write()?;
        let LedgerState {
            invoices,
            payments,
            by_gateway_id,
            ..
        } = &mut *guard;

        let invoice = invoices
            .get(&failure.invoice_id)
            .ok_or(LedgerError::InvoiceNotFound {
                id: failure.invoice_id,
            })?;

        let key = failure
            .gateway_payment_id
            .clone()
            .map(|id| (id, PaymentStatus::Failed));
        if let Some(idx) = key.as_ref().and_then(|k| by_gateway_id.get(k)) {
            return Ok(payments[*idx].clone());
        }

        let (payment, notification) = failed_payment(invoice, &failure);
        self.notifications.insert(notification)?;

        if let Some(key) = key {
            by_gateway_id.insert(key, payments.len());
        }
        payments.push(payment.clone());

        tracing::info!(invoice_id = %invoice.id, reason = %failure.reason, "Recorded failed payment");
        Ok(payment)
    }

    async fn mark_overdue(&self, today: NaiveDate) -> Result<OverdueReport> {
        let mut guard = self.write()?;
        let mut report = OverdueReport::default();

        for invoice in guard
            .invoices
            .values_mut()
            .filter(|i| i.should_mark_overdue(today))
        {
            invoice.status = InvoiceStatus::Overdue;
            invoice.touch();
            report.invoices += 1;
        }
        for plan in guard.installments.values_mut() {
            report.installments += mark_overdue_installments(plan, today);
        }

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// InMemoryAttendanceStore
// ---------------------------------------------------------------------------

/// In-memory attendance keyed by (person, date)
#[derive(Clone, Default)]
pub struct InMemoryAttendanceStore {
    students: Arc<RwLock<HashMap<(Uuid, NaiveDate), Attendance>>>,
    staff: Arc<RwLock<HashMap<(Uuid, NaiveDate), StaffAttendance>>>,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn mark<T: Clone>(
    rows: &RwLock<HashMap<(Uuid, NaiveDate), T>>,
    key: (Uuid, NaiveDate),
    record: T,
) -> Result<MarkOutcome<T>> {
    let mut rows = rows
        .write()
        .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

    Ok(match rows.entry(key) {
        Entry::Occupied(existing) => MarkOutcome::Existing(existing.get().clone()),
        Entry::Vacant(slot) => MarkOutcome::Created(slot.insert(record).clone()),
    })
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn mark_student(&self, record: Attendance) -> Result<MarkOutcome<Attendance>> {
        mark(&self.students, (record.student_id, record.date), record)
    }

    async fn mark_staff(&self, record: StaffAttendance) -> Result<MarkOutcome<StaffAttendance>> {
        mark(&self.staff, (record.staff_id, record.date), record)
    }

    async fn list_student(&self) -> Result<Vec<Attendance>> {
        let rows = self
            .students
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let mut all: Vec<Attendance> = rows.values().cloned().collect();
        all.sort_by(|a, b| b.date.cmp(&a.date).then(a.created_at.cmp(&b.created_at)));
        Ok(all)
    }

    async fn list_staff(&self) -> Result<Vec<StaffAttendance>> {
        let rows = self
            .staff
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let mut all: Vec<StaffAttendance> = rows.values().cloned().collect();
        all.sort_by(|a, b| b.date.cmp(&a.date).then(a.created_at.cmp(&b.created_at)));
        Ok(all)
    }
}
