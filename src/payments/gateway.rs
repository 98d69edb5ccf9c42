//! Payment gateway seam
//!
//! The wire types mirror the Razorpay REST API (amounts in paise). The
//! [`InMemoryGateway`] stands in for the provider in development and tests.

use crate::core::error::PaymentError;
use crate::ledger::model::{FeeInvoice, PaymentType};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Metadata attached to orders and QR codes, echoed back on payments
///
/// Razorpay serializes empty notes as `[]`, which deserializes to the
/// default here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_number: Option<String>,
}

impl PaymentNotes {
    pub fn for_charge(
        invoice: &FeeInvoice,
        payment_type: PaymentType,
        installment_number: Option<i32>,
    ) -> Self {
        Self {
            invoice_id: Some(invoice.id.to_string()),
            student_id: Some(invoice.student_id.to_string()),
            payment_type: Some(payment_type.to_string()),
            installment_number: installment_number.map(|n| n.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.invoice_id.is_none()
    }
}

fn lenient_notes<'de, D>(deserializer: D) -> Result<PaymentNotes, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(map) => {
            let field = |key: &str| {
                map.get(key).and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
            };
            Ok(PaymentNotes {
                invoice_id: field("invoiceId"),
                student_id: field("studentId"),
                payment_type: field("paymentType"),
                installment_number: field("installmentNumber"),
            })
        }
        _ => Ok(PaymentNotes::default()),
    }
}

/// `POST /v1/orders` body
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: PaymentNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_notes")]
    pub notes: PaymentNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_notes")]
    pub notes: PaymentNotes,
}

impl GatewayPayment {
    pub fn is_captured(&self) -> bool {
        self.status == "captured"
    }
}

/// `POST /v1/payments/qr_codes` body for a single-use fixed-amount UPI code
#[derive(Debug, Clone, Serialize)]
pub struct QrCodeRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub usage: String,
    pub fixed_amount: bool,
    pub payment_amount: i64,
    pub description: String,
    pub notes: PaymentNotes,
}

impl QrCodeRequest {
    pub fn upi(name: String, amount: i64, description: String, notes: PaymentNotes) -> Self {
        Self {
            kind: "upi_qr".to_string(),
            name,
            usage: "single_use".to_string(),
            fixed_amount: true,
            payment_amount: amount,
            description,
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayQrCode {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<i64>,
    #[serde(default)]
    pub payments_amount_received: i64,
    #[serde(default)]
    pub close_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_notes")]
    pub notes: PaymentNotes,
}

/// Operations the fee ledger needs from a payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to checkout clients
    fn key_id(&self) -> &str;

    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder>;

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment>;

    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<GatewayQrCode>;

    async fn fetch_qr_code(&self, qr_code_id: &str) -> Result<GatewayQrCode>;
}

fn gateway_id(prefix: &str) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &raw[..14])
}

fn unknown(kind: &str, id: &str) -> anyhow::Error {
    PaymentError::Gateway {
        message: format!("{} '{}' does not exist", kind, id),
    }
    .into()
}

#[derive(Default)]
struct GatewayState {
    orders: HashMap<String, GatewayOrder>,
    payments: HashMap<String, GatewayPayment>,
    qr_codes: HashMap<String, GatewayQrCode>,
}

/// Process-local gateway; payments are produced by the helper methods
#[derive(Clone)]
pub struct InMemoryGateway {
    key_id: String,
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryGateway {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            state: Arc::new(RwLock::new(GatewayState::default())),
        }
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, GatewayState>> {
        self.state
            .write()
            .map_err(|e| anyhow!("Failed to acquire gateway lock: {}", e))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, GatewayState>> {
        self.state
            .read()
            .map_err(|e| anyhow!("Failed to acquire gateway lock: {}", e))
    }

    fn settle_order(&self, order_id: &str, status: &str, error: Option<String>) -> Result<GatewayPayment> {
        let mut state = self.write()?;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| unknown("order", order_id))?;
        if status == "captured" {
            order.status = "paid".to_string();
        }

        let payment = GatewayPayment {
            id: gateway_id("pay"),
            amount: order.amount,
            currency: order.currency.clone(),
            status: status.to_string(),
            order_id: Some(order.id.clone()),
            method: Some("upi".to_string()),
            error_description: error,
            notes: PaymentNotes::default(),
        };
        state.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    /// Orders created so far
    pub fn order_count(&self) -> Result<usize> {
        Ok(self.read()?.orders.len())
    }

    /// QR codes created so far
    pub fn qr_code_count(&self) -> Result<usize> {
        Ok(self.read()?.qr_codes.len())
    }

    /// Simulate a successful checkout against an order
    pub fn capture_payment(&self, order_id: &str) -> Result<GatewayPayment> {
        self.settle_order(order_id, "captured", None)
    }

    /// Simulate a declined checkout against an order
    pub fn fail_payment(&self, order_id: &str, reason: &str) -> Result<GatewayPayment> {
        self.settle_order(order_id, "failed", Some(reason.to_string()))
    }

    /// Simulate a scan-and-pay of a QR code; the code closes afterwards
    pub fn credit_qr_code(&self, qr_code_id: &str) -> Result<GatewayPayment> {
        let mut state = self.write()?;
        let qr = state
            .qr_codes
            .get_mut(qr_code_id)
            .ok_or_else(|| unknown("qr_code", qr_code_id))?;
        let amount = qr.payment_amount.unwrap_or_default();
        qr.payments_amount_received += amount;
        qr.status = "closed".to_string();
        qr.close_reason = Some("paid".to_string());

        let payment = GatewayPayment {
            id: gateway_id("pay"),
            amount,
            currency: "INR".to_string(),
            status: "captured".to_string(),
            order_id: None,
            method: Some("upi".to_string()),
            error_description: None,
            notes: qr.notes.clone(),
        };
        state.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder> {
        let order = GatewayOrder {
            id: gateway_id("order"),
            amount: request.amount,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: "created".to_string(),
            notes: request.notes,
        };
        self.write()?.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder> {
        self.read()?
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| unknown("order", order_id))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        self.read()?
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| unknown("payment", payment_id))
    }

    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<GatewayQrCode> {
        let id = gateway_id("qr");
        let qr = GatewayQrCode {
            image_url: Some(format!("https://rzp.io/i/{}", id)),
            id,
            status: "active".to_string(),
            payment_amount: Some(request.payment_amount),
            payments_amount_received: 0,
            close_reason: None,
            notes: request.notes,
        };
        self.write()?.qr_codes.insert(qr.id.clone(), qr.clone());
        Ok(qr)
    }

    async fn fetch_qr_code(&self, qr_code_id: &str) -> Result<GatewayQrCode> {
        self.read()?
            .qr_codes
            .get(qr_code_id)
            .cloned()
            .ok_or_else(|| unknown("qr_code", qr_code_id))
    }
}
