//! HTTP handlers for invoices, payments and the overdue sweep

use super::model::{FeeInvoice, FeePayment, OverdueReport, PaymentInstallment, from_paise};
use crate::core::error::{CampusResult, EntityError, LedgerError, ValidationError};
use crate::core::query::{ListParams, PaginatedResponse, filter_items};
use crate::core::{ValidatedJson, parse_id};
use crate::server::host::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub student_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub total_amount: f64,
    pub due_date: NaiveDate,
    pub academic_year_id: Option<Uuid>,
}

/// `POST /api/fees/invoices`
pub async fn create_invoice(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateInvoiceRequest>,
) -> CampusResult<(StatusCode, Json<FeeInvoice>)> {
    if host.resources.students.get(&request.student_id).await?.is_none() {
        return Err(EntityError::InvalidReference {
            entity_type: "student".to_string(),
            id: request.student_id,
        }
        .into());
    }
    if let Some(year_id) = request.academic_year_id
        && host.resources.academic_years.get(&year_id).await?.is_none()
    {
        return Err(EntityError::InvalidReference {
            entity_type: "academic_year".to_string(),
            id: year_id,
        }
        .into());
    }

    let invoice = FeeInvoice::issue(
        request.student_id,
        request.invoice_number.trim().to_string(),
        request.description,
        request.total_amount,
        request.due_date,
        request.academic_year_id,
    )?;
    let invoice = host.ledger.create_invoice(invoice).await?;

    tracing::info!(
        invoice_id = %invoice.id,
        student_id = %invoice.student_id,
        total = invoice.total_amount,
        "Issued invoice"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// `GET /api/fees/invoices?studentId=&status=&limit=&offset=`
pub async fn list_invoices(
    State(host): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<FeeInvoice>>> {
    let (params, filters) = ListParams::from_query(query)?;
    let items = filter_items(host.ledger.list_invoices().await?, &filters)?;
    Ok(Json(params.paginate(items)))
}

/// An invoice with its installment plan and payment history
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: FeeInvoice,
    pub installments: Vec<PaymentInstallment>,
    pub payments: Vec<FeePayment>,
}

/// `GET /api/fees/invoices/{id}`
pub async fn get_invoice(
    State(host): State<AppState>,
    Path(id): Path<String>,
) -> CampusResult<Json<InvoiceDetail>> {
    let id = parse_id("id", &id)?;
    let invoice = host
        .ledger
        .get_invoice(&id)
        .await?
        .ok_or(LedgerError::InvoiceNotFound { id })?;

    Ok(Json(InvoiceDetail {
        installments: host.ledger.installments(&id).await?,
        payments: host.ledger.payments_for_invoice(&id).await?,
        invoice,
    }))
}

/// `GET /api/fees/payments?invoiceId=&studentId=&status=`
pub async fn list_payments(
    State(host): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> CampusResult<Json<PaginatedResponse<FeePayment>>> {
    let (params, filters) = ListParams::from_query(query)?;
    let items = filter_items(host.ledger.list_payments().await?, &filters)?;
    Ok(Json(params.paginate(items)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub student_id: Option<String>,
}

/// Billing totals for one student
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub student_id: Uuid,
    pub invoice_count: usize,
    pub total_billed: f64,
    pub total_paid: f64,
    pub total_due: f64,
    pub overdue_count: usize,
}

impl FeeSummary {
    pub fn for_student(student_id: Uuid, invoices: &[FeeInvoice]) -> Self {
        let mine: Vec<&FeeInvoice> = invoices
            .iter()
            .filter(|i| i.student_id == student_id)
            .collect();
        Self {
            student_id,
            invoice_count: mine.len(),
            total_billed: from_paise(saturating_sum(mine.iter().map(|i| i.total_paise()))),
            total_paid: from_paise(saturating_sum(mine.iter().map(|i| i.paid_paise()))),
            total_due: from_paise(saturating_sum(mine.iter().map(|i| i.due_paise()))),
            overdue_count: mine
                .iter()
                .filter(|i| i.status == super::model::InvoiceStatus::Overdue)
                .count(),
        }
    }
}

fn saturating_sum(paise: impl Iterator<Item = i64>) -> i64 {
    paise.fold(0i64, i64::saturating_add)
}

/// `GET /api/fees/summary?studentId=`
pub async fn fee_summary(
    State(host): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> CampusResult<Json<FeeSummary>> {
    let raw = query.student_id.ok_or_else(|| ValidationError::MissingField {
        field: "studentId".to_string(),
    })?;
    let student_id = parse_id("studentId", &raw)?;

    let invoices = host.ledger.list_invoices().await?;
    Ok(Json(FeeSummary::for_student(student_id, &invoices)))
}

/// `POST /api/fees/invoices/mark-overdue`
pub async fn mark_overdue(State(host): State<AppState>) -> CampusResult<Json<OverdueReport>> {
    let report = host.ledger.mark_overdue(host.today()).await?;
    tracing::info!(
        invoices = report.invoices,
        installments = report.installments,
        "Overdue sweep finished"
    );
    Ok(Json(report))
}
