//! HTTP handlers for the payment gateway bridge

use super::bridge::{
    Charge, WebhookEvent, failure_from_payment, posting_from_payment, prepare_charge,
    resolve_notes,
};
use super::gateway::{GatewayQrCode, OrderRequest, QrCodeRequest};
use super::signature::{verify_checkout, verify_webhook};
use crate::core::error::{CampusResult, PaymentError};
use crate::core::{ValidatedJson, parse_id};
use crate::ledger::model::{
    FeeInvoice, FeePayment, PaymentInstallment, PaymentSource, PaymentType, from_paise,
};
use crate::server::host::{AppState, ServerHost};
use anyhow::Result;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

/// Header carrying the webhook body signature
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Body of `create-order` and `qr-code`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<PaymentType>,
}

impl ChargeRequest {
    fn invoice_id(&self) -> CampusResult<Uuid> {
        Ok(parse_id(
            "invoiceId",
            self.invoice_id.as_deref().unwrap_or_default(),
        )?)
    }

    fn payment_type(&self) -> PaymentType {
        self.payment_type.unwrap_or(PaymentType::Full)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub amount: f64,
    pub amount_paise: i64,
    pub currency: String,
    pub key_id: String,
    pub invoice_id: Uuid,
    pub payment_type: PaymentType,
    pub installment_number: Option<i32>,
}

async fn charge_for(host: &ServerHost, request: &ChargeRequest) -> CampusResult<Charge> {
    let invoice_id = request.invoice_id()?;
    Ok(prepare_charge(
        host.ledger.as_ref(),
        invoice_id,
        request.payment_type(),
        host.today(),
    )
    .await?)
}

/// `POST /api/payments/create-order`
pub async fn create_order(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<ChargeRequest>,
) -> CampusResult<Json<OrderResponse>> {
    let charge = charge_for(&host, &request).await?;

    let order = host
        .gateway
        .create_order(OrderRequest {
            amount: charge.amount_paise,
            currency: host.config.payments.currency.clone(),
            receipt: charge.receipt(),
            notes: charge.notes(),
        })
        .await?;

    tracing::info!(
        invoice_id = %charge.invoice.id,
        order_id = %order.id,
        payment_type = %charge.payment_type,
        amount = charge.amount(),
        "Created payment order"
    );

    Ok(Json(OrderResponse {
        order_id: order.id,
        amount: from_paise(order.amount),
        amount_paise: order.amount,
        currency: order.currency,
        key_id: host.gateway.key_id().to_string(),
        invoice_id: charge.invoice.id,
        payment_type: charge.payment_type,
        installment_number: charge.installment_number(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetupEmiRequest {
    #[serde(default)]
    pub invoice_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupEmiResponse {
    pub invoice_id: Uuid,
    pub installments: Vec<PaymentInstallment>,
}

/// `POST /api/payments/setup-emi`
pub async fn setup_emi(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<SetupEmiRequest>,
) -> CampusResult<(StatusCode, Json<SetupEmiResponse>)> {
    let invoice_id = parse_id(
        "invoiceId",
        request.invoice_id.as_deref().unwrap_or_default(),
    )?;
    let installments = host.ledger.create_emi_plan(&invoice_id, host.today()).await?;

    Ok((
        StatusCode::CREATED,
        Json(SetupEmiResponse {
            invoice_id,
            installments,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub payment_id: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub duplicate: bool,
    pub invoice: FeeInvoice,
    pub payment: FeePayment,
    pub installment: Option<PaymentInstallment>,
}

/// `POST /api/payments/verify`
pub async fn verify_payment(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> CampusResult<Json<VerifyResponse>> {
    verify_checkout(
        &host.config.payments.key_secret,
        &request.order_id,
        &request.payment_id,
        &request.signature,
    )?;

    let payment = host.gateway.fetch_payment(&request.payment_id).await?;
    if !payment.is_captured() {
        return Err(PaymentError::NotCaptured {
            payment_id: payment.id,
            status: payment.status,
        }
        .into());
    }

    let order = host.gateway.fetch_order(&request.order_id).await?;
    let notes = if order.notes.is_empty() {
        payment.notes.clone()
    } else {
        order.notes
    };
    let mut posting = posting_from_payment(&payment, &notes, PaymentSource::Checkout)?;
    posting.gateway_order_id = Some(request.order_id.clone());

    let outcome = host.ledger.apply_payment(posting).await?;

    Ok(Json(VerifyResponse {
        success: true,
        duplicate: outcome.duplicate,
        invoice: outcome.invoice,
        payment: outcome.payment,
        installment: outcome.installment,
    }))
}

/// What happened to a webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Processed,
    Duplicate,
    Ignored,
    Failed,
}

async fn process_event(host: &ServerHost, event: &WebhookEvent) -> Result<WebhookStatus> {
    match event.event.as_str() {
        "payment.captured" => {
            let payment = event.payment()?;
            let notes = resolve_notes(host.gateway.as_ref(), payment).await?;
            let posting = posting_from_payment(payment, &notes, PaymentSource::Webhook)?;
            let outcome = host.ledger.apply_payment(posting).await?;
            Ok(if outcome.duplicate {
                WebhookStatus::Duplicate
            } else {
                WebhookStatus::Processed
            })
        }
        "qr_code.credited" => {
            let qr = event.qr_code()?;
            let payment = event.payment()?;
            let notes = if qr.notes.is_empty() {
                &payment.notes
            } else {
                &qr.notes
            };
            let posting = posting_from_payment(payment, notes, PaymentSource::Qr)?;
            let outcome = host.ledger.apply_payment(posting).await?;
            Ok(if outcome.duplicate {
                WebhookStatus::Duplicate
            } else {
                WebhookStatus::Processed
            })
        }
        "payment.failed" => {
            let payment = event.payment()?;
            let notes = resolve_notes(host.gateway.as_ref(), payment).await?;
            let failure = failure_from_payment(payment, &notes)?;
            host.ledger.record_failed_payment(failure).await?;
            Ok(WebhookStatus::Processed)
        }
        other => {
            tracing::debug!(event = other, "Ignoring webhook event");
            Ok(WebhookStatus::Ignored)
        }
    }
}

/// `POST /api/payments/webhook`
///
/// Only a bad signature is rejected. Anything that goes wrong afterwards is
/// logged and acknowledged so the provider does not retry.
pub async fn webhook(
    State(host): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> CampusResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    verify_webhook(&host.config.payments.webhook_secret, &body, signature)?;

    let status = match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => match process_event(&host, &event).await {
            Ok(status) => {
                tracing::info!(event = %event.event, status = ?status, "Handled webhook");
                status
            }
            Err(e) => {
                tracing::warn!(event = %event.event, error = %e, "Webhook processing failed");
                WebhookStatus::Failed
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable webhook body");
            WebhookStatus::Failed
        }
    };

    Ok(Json(json!({ "received": true, "status": status })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    pub qr_code_id: String,
    pub status: String,
    pub image_url: Option<String>,
    pub amount: Option<f64>,
    pub amount_paise: Option<i64>,
    pub amount_received: f64,
    pub invoice_id: Option<String>,
    pub payment_type: Option<String>,
    pub installment_number: Option<String>,
}

impl From<GatewayQrCode> for QrCodeResponse {
    fn from(qr: GatewayQrCode) -> Self {
        Self {
            qr_code_id: qr.id,
            status: qr.status,
            image_url: qr.image_url,
            amount: qr.payment_amount.map(from_paise),
            amount_paise: qr.payment_amount,
            amount_received: from_paise(qr.payments_amount_received),
            invoice_id: qr.notes.invoice_id,
            payment_type: qr.notes.payment_type,
            installment_number: qr.notes.installment_number,
        }
    }
}

/// `POST /api/payments/qr-code`
pub async fn create_qr_code(
    State(host): State<AppState>,
    ValidatedJson(request): ValidatedJson<ChargeRequest>,
) -> CampusResult<(StatusCode, Json<QrCodeResponse>)> {
    let charge = charge_for(&host, &request).await?;

    let qr = host
        .gateway
        .create_qr_code(QrCodeRequest::upi(
            host.config.school.name.clone(),
            charge.amount_paise,
            format!("Fees {}", charge.receipt()),
            charge.notes(),
        ))
        .await?;

    tracing::info!(invoice_id = %charge.invoice.id, qr_code_id = %qr.id, "Created payment QR code");
    Ok((StatusCode::CREATED, Json(qr.into())))
}

/// `GET /api/payments/qr-code/{id}`
pub async fn get_qr_code(
    State(host): State<AppState>,
    Path(id): Path<String>,
) -> CampusResult<Json<QrCodeResponse>> {
    let qr = host.gateway.fetch_qr_code(&id).await?;
    Ok(Json(qr.into()))
}
