//! PostgreSQL storage backend using sqlx.
//!
//! Every row keeps its full JSON form in a `data` JSONB column. The columns
//! beside it carry the keys PostgreSQL has to enforce: invoice numbers,
//! `(gateway_payment_id, status)` for payment replays and `(person, date)`
//! for attendance. Ledger mutations run in one transaction that locks the
//! invoice row with `SELECT ... FOR UPDATE`.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! campus = { version = "0.1", features = ["postgres"] }
//! ```

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
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Apply the bundled migrations
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow!("Failed to run migrations: {}", e))
}

fn decode<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| anyhow!("Failed to decode stored row: {}", e))
}

fn decode_all<T: DeserializeOwned>(rows: Vec<(serde_json::Value,)>) -> Result<Vec<T>> {
    rows.into_iter().map(|(data,)| decode(data)).collect()
}

fn encode<T: Serialize>(row: &T) -> Result<serde_json::Value> {
    serde_json::to_value(row).map_err(|e| anyhow!("Failed to encode row: {}", e))
}

async fn insert_entity<T: Data + Serialize>(conn: &mut PgConnection, entity: &T) -> Result<()> {
    sqlx::query(
        "INSERT INTO entities (id, entity_type, data, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(entity.id())
    .bind(T::resource_name_singular())
    .bind(encode(entity)?)
    .bind(entity.created_at())
    .bind(entity.updated_at())
    .execute(conn)
    .await
    .map_err(|e| anyhow!("Failed to create entity: {}", e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PostgresDataService<T>
// ---------------------------------------------------------------------------

/// Generic data storage service backed by PostgreSQL.
///
/// Stores entities in the shared `entities` table, one JSONB document per
/// row, discriminated by `entity_type`.
#[derive(Clone, Debug)]
pub struct PostgresDataService<T> {
    pool: PgPool,
    _marker: std::marker::PhantomData<T>,
}

impl<T> PostgresDataService<T> {
    /// Create a new `PostgresDataService` with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T> DataService<T> for PostgresDataService<T>
where
    T: Data + Serialize + DeserializeOwned,
{
    async fn create(&self, entity: T) -> Result<T> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| anyhow!("Failed to acquire connection: {}", e))?;
        insert_entity(&mut conn, &entity).await?;
        Ok(entity)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<T>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM entities WHERE id = $1 AND entity_type = $2",
        )
        .bind(id)
        .bind(T::resource_name_singular())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to get entity: {}", e))?;

        row.map(|(data,)| decode(data)).transpose()
    }

    async fn list(&self) -> Result<Vec<T>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM entities WHERE entity_type = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(T::resource_name_singular())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list entities: {}", e))?;

        decode_all(rows)
    }

    async fn update(&self, id: &Uuid, entity: T) -> Result<T> {
        let result = sqlx::query(
            "UPDATE entities SET data = $3, updated_at = $4 WHERE id = $1 AND entity_type = $2",
        )
        .bind(id)
        .bind(T::resource_name_singular())
        .bind(encode(&entity)?)
        .bind(entity.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to update entity: {}", e))?;

        if result.rows_affected() == 0 {
            return Err(EntityError::not_found(T::resource_name_singular(), *id).into());
        }
        Ok(entity)
    }

    async fn delete(&self, id: &Uuid) -> Result<Option<T>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "DELETE FROM entities WHERE id = $1 AND entity_type = $2 RETURNING data",
        )
        .bind(id)
        .bind(T::resource_name_singular())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to delete entity: {}", e))?;

        row.map(|(data,)| decode(data)).transpose()
    }

    async fn search(&self, field: &str, value: &str) -> Result<Vec<T>> {
        // Filtered with the same matcher as the in-memory backend
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|entity| {
                entity
                    .field_value(field)
                    .is_some_and(|v| v.matches_query(value))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// PostgresLedgerStore
// ---------------------------------------------------------------------------

/// Fee ledger backed by PostgreSQL
#[derive(Clone, Debug)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_invoice(conn: &mut PgConnection, id: &Uuid) -> Result<FeeInvoice> {
    let row = sqlx::query_as::<_, (serde_json::Value,)>(
        "SELECT data FROM fee_invoices WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| anyhow!("Failed to lock invoice: {}", e))?;

    match row {
        Some((data,)) => decode(data),
        None => Err(LedgerError::InvoiceNotFound { id: *id }.into()),
    }
}

async fn plan_for(conn: &mut PgConnection, invoice_id: &Uuid) -> Result<Vec<PaymentInstallment>> {
    let rows = sqlx::query_as::<_, (serde_json::Value,)>(
        "SELECT data FROM payment_installments WHERE invoice_id = $1 \
         ORDER BY installment_number ASC",
    )
    .bind(invoice_id)
    .fetch_all(conn)
    .await
    .map_err(|e| anyhow!("Failed to load installments: {}", e))?;

    decode_all(rows)
}

async fn payment_by_gateway_id(
    conn: &mut PgConnection,
    gateway_payment_id: &str,
    status: PaymentStatus,
) -> Result<Option<FeePayment>> {
    let row = sqlx::query_as::<_, (serde_json::Value,)>(
        "SELECT data FROM fee_payments WHERE gateway_payment_id = $1 AND status = $2",
    )
    .bind(gateway_payment_id)
    .bind(status.as_str())
    .fetch_optional(conn)
    .await
    .map_err(|e| anyhow!("Failed to look up payment: {}", e))?;

    row.map(|(data,)| decode(data)).transpose()
}

async fn save_invoice(conn: &mut PgConnection, invoice: &FeeInvoice) -> Result<()> {
    sqlx::query("UPDATE fee_invoices SET status = $2, data = $3 WHERE id = $1")
        .bind(invoice.id)
        .bind(invoice.status.as_str())
        .bind(encode(invoice)?)
        .execute(conn)
        .await
        .map_err(|e| anyhow!("Failed to update invoice: {}", e))?;
    Ok(())
}

async fn insert_installment(conn: &mut PgConnection, inst: &PaymentInstallment) -> Result<()> {
    sqlx::query(
        "INSERT INTO payment_installments (id, invoice_id, installment_number, status, due_date, data) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(inst.id)
    .bind(inst.invoice_id)
    .bind(inst.installment_number)
    .bind(inst.status.as_str())
    .bind(inst.due_date)
    .bind(encode(inst)?)
    .execute(conn)
    .await
    .map_err(|e| anyhow!("Failed to create installment: {}", e))?;
    Ok(())
}

async fn save_installment(conn: &mut PgConnection, inst: &PaymentInstallment) -> Result<()> {
    sqlx::query("UPDATE payment_installments SET status = $2, data = $3 WHERE id = $1")
        .bind(inst.id)
        .bind(inst.status.as_str())
        .bind(encode(inst)?)
        .execute(conn)
        .await
        .map_err(|e| anyhow!("Failed to update installment: {}", e))?;
    Ok(())
}

async fn insert_payment(conn: &mut PgConnection, payment: &FeePayment) -> Result<()> {
    sqlx::query(
        "INSERT INTO fee_payments (id, invoice_id, gateway_payment_id, status, data, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(payment.id)
    .bind(payment.invoice_id)
    .bind(payment.gateway_payment_id.as_deref())
    .bind(payment.status.as_str())
    .bind(encode(payment)?)
    .bind(payment.created_at)
    .execute(conn)
    .await
    .map_err(|e| anyhow!("Failed to record payment: {}", e))?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn create_invoice(&self, invoice: FeeInvoice) -> Result<FeeInvoice> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            "INSERT INTO fee_invoices (id, student_id, invoice_number, status, due_date, data, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (invoice_number) DO NOTHING RETURNING id",
        )
        .bind(invoice.id)
        .bind(invoice.student_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(encode(&invoice)?)
        .bind(invoice.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to create invoice: {}", e))?;

        if inserted.is_none() {
            return Err(LedgerError::DuplicateInvoiceNumber {
                number: invoice.invoice_number,
            }
            .into());
        }
        tracing::info!(invoice_id = %invoice.id, number = %invoice.invoice_number, "Created invoice");
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &Uuid) -> Result<Option<FeeInvoice>> {
        let row =
            sqlx::query_as::<_, (serde_json::Value,)>("SELECT data FROM fee_invoices WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| anyhow!("Failed to get invoice: {}", e))?;

        row.map(|(data,)| decode(data)).transpose()
    }

    async fn list_invoices(&self) -> Result<Vec<FeeInvoice>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM fee_invoices ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list invoices: {}", e))?;

        decode_all(rows)
    }

    async fn installments(&self, invoice_id: &Uuid) -> Result<Vec<PaymentInstallment>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| anyhow!("Failed to acquire connection: {}", e))?;
        plan_for(&mut conn, invoice_id).await
    }

    async fn list_payments(&self) -> Result<Vec<FeePayment>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM fee_payments ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list payments: {}", e))?;

        decode_all(rows)
    }

    async fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<FeePayment>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM fee_payments WHERE invoice_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list invoice payments: {}", e))?;

        decode_all(rows)
    }

    async fn create_emi_plan(
        &self,
        invoice_id: &Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PaymentInstallment>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        let existing = plan_for(&mut tx, invoice_id).await?;
        ensure_plan_allowed(&invoice, &existing)?;

        let plan = plan_installments(&invoice, today);
        for inst in &plan {
            insert_installment(&mut tx, inst).await?;
        }

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit EMI plan: {}", e))?;

        tracing::info!(invoice_id = %invoice_id, "Created EMI plan");
        Ok(plan)
    }

    async fn apply_payment(&self, posting: Posting) -> Result<PostingOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let mut invoice = lock_invoice(&mut tx, &posting.invoice_id).await?;
        let mut plan = plan_for(&mut tx, &posting.invoice_id).await?;

        if let Some(payment) =
            payment_by_gateway_id(&mut tx, &posting.gateway_payment_id, PaymentStatus::Completed)
                .await?
        {
            tracing::info!(
                gateway_payment_id = %posting.gateway_payment_id,
                "Payment already applied, skipping replay"
            );
            let installment = plan.into_iter().find(|i| i.payment_id == Some(payment.id));
            return Ok(PostingOutcome {
                invoice,
                installment,
                payment,
                duplicate: true,
            });
        }

        // Dropping the transaction on error rolls everything back
        let applied = apply_posting(&mut invoice, &mut plan, &posting, Utc::now())?;

        save_invoice(&mut tx, &invoice).await?;
        for idx in &applied.settled {
            save_installment(&mut tx, &plan[*idx]).await?;
        }
        insert_payment(&mut tx, &applied.payment).await?;
        insert_entity(&mut tx, &applied.notification).await?;

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit payment: {}", e))?;

        tracing::info!(
            invoice_id = %invoice.id,
            amount = applied.payment.amount,
            status = %invoice.status,
            "Applied payment"
        );

        Ok(PostingOutcome {
            installment: applied.settled.first().map(|idx| plan[*idx].clone()),
            invoice,
            payment: applied.payment,
            duplicate: false,
        })
    }

    async fn record_failed_payment(&self, failure: FailedPosting) -> Result<FeePayment> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let invoice = lock_invoice(&mut tx, &failure.invoice_id).await?;

        if let Some(gateway_id) = failure.gateway_payment_id.as_deref() {
            if let Some(existing) =
                payment_by_gateway_id(&mut tx, gateway_id, PaymentStatus::Failed).await?
            {
                return Ok(existing);
            }
        }

        let (payment, notification): (FeePayment, Notification) =
            failed_payment(&invoice, &failure);
        insert_payment(&mut tx, &payment).await?;
        insert_entity(&mut tx, &notification).await?;

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit failed payment: {}", e))?;

        tracing::info!(invoice_id = %invoice.id, reason = %failure.reason, "Recorded failed payment");
        Ok(payment)
    }

    async fn mark_overdue(&self, today: NaiveDate) -> Result<OverdueReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;
        let mut report = OverdueReport::default();

        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM fee_invoices WHERE status <> $1 AND due_date < $2 FOR UPDATE",
        )
        .bind(InvoiceStatus::Overdue.as_str())
        .bind(today)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| anyhow!("Failed to load invoices: {}", e))?;

        for mut invoice in decode_all::<FeeInvoice>(rows)? {
            if !invoice.should_mark_overdue(today) {
                continue;
            }
            invoice.status = InvoiceStatus::Overdue;
            invoice.touch();
            save_invoice(&mut tx, &invoice).await?;
            report.invoices += 1;
        }

        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM payment_installments WHERE status = 'pending' AND due_date < $1 \
             FOR UPDATE",
        )
        .bind(today)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| anyhow!("Failed to load installments: {}", e))?;

        let mut installments = decode_all::<PaymentInstallment>(rows)?;
        report.installments = mark_overdue_installments(&mut installments, today);
        for inst in &installments {
            save_installment(&mut tx, inst).await?;
        }

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit overdue sweep: {}", e))?;

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// PostgresAttendanceStore
// ---------------------------------------------------------------------------

/// Attendance backed by PostgreSQL; the unique keys decide races
#[derive(Clone, Debug)]
pub struct PostgresAttendanceStore {
    pool: PgPool,
}

impl PostgresAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn mark<T: Serialize + DeserializeOwned>(
        &self,
        table: &'static str,
        person_column: &'static str,
        key: (Uuid, NaiveDate),
        id: Uuid,
        created_at: chrono::DateTime<Utc>,
        record: T,
    ) -> Result<MarkOutcome<T>> {
        let insert = format!(
            "INSERT INTO {table} (id, {person_column}, date, data, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT ({person_column}, date) DO NOTHING RETURNING id"
        );
        let inserted = sqlx::query_as::<_, (Uuid,)>(&insert)
            .bind(id)
            .bind(key.0)
            .bind(key.1)
            .bind(encode(&record)?)
            .bind(created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to mark attendance: {}", e))?;

        if inserted.is_some() {
            return Ok(MarkOutcome::Created(record));
        }

        let select = format!("SELECT data FROM {table} WHERE {person_column} = $1 AND date = $2");
        let (data,) = sqlx::query_as::<_, (serde_json::Value,)>(&select)
            .bind(key.0)
            .bind(key.1)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to load existing attendance: {}", e))?;

        Ok(MarkOutcome::Existing(decode(data)?))
    }

    async fn list<T: DeserializeOwned>(&self, table: &'static str) -> Result<Vec<T>> {
        let sql = format!("SELECT data FROM {table} ORDER BY date DESC, created_at ASC");
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to list attendance: {}", e))?;

        decode_all(rows)
    }
}

#[async_trait]
impl AttendanceStore for PostgresAttendanceStore {
    async fn mark_student(&self, record: Attendance) -> Result<MarkOutcome<Attendance>> {
        let key = (record.student_id, record.date);
        let (id, created_at) = (record.id, record.created_at);
        self.mark("attendance", "student_id", key, id, created_at, record)
            .await
    }

    async fn mark_staff(&self, record: StaffAttendance) -> Result<MarkOutcome<StaffAttendance>> {
        let key = (record.staff_id, record.date);
        let (id, created_at) = (record.id, record.created_at);
        self.mark("staff_attendance", "staff_id", key, id, created_at, record)
            .await
    }

    async fn list_student(&self) -> Result<Vec<Attendance>> {
        self.list("attendance").await
    }

    async fn list_staff(&self) -> Result<Vec<StaffAttendance>> {
        self.list("staff_attendance").await
    }
}
