//! Translation between gateway events and ledger postings

use super::gateway::{GatewayPayment, GatewayQrCode, PaymentGateway, PaymentNotes};
use crate::core::error::{LedgerError, PaymentError, ValidationError};
use crate::ledger::model::{
    FailedPosting, FeeInvoice, PaymentInstallment, PaymentSource, PaymentType, Posting,
    from_paise, next_payable,
};
use crate::ledger::store::LedgerStore;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

/// What a new order or QR code should charge
#[derive(Debug, Clone)]
pub struct Charge {
    pub invoice: FeeInvoice,
    pub payment_type: PaymentType,
    /// Target installment for EMI charges
    pub installment: Option<PaymentInstallment>,
    pub amount_paise: i64,
}

impl Charge {
    pub fn installment_number(&self) -> Option<i32> {
        self.installment.as_ref().map(|i| i.installment_number)
    }

    pub fn notes(&self) -> PaymentNotes {
        PaymentNotes::for_charge(&self.invoice, self.payment_type, self.installment_number())
    }

    /// Receipt reference shown in the gateway dashboard
    pub fn receipt(&self) -> String {
        match self.installment_number() {
            Some(n) => format!("{}-EMI{}", self.invoice.invoice_number, n),
            None => self.invoice.invoice_number.clone(),
        }
    }

    pub fn amount(&self) -> f64 {
        from_paise(self.amount_paise)
    }
}

/// Size a charge for an invoice before any gateway call.
///
/// EMI charges create the plan on first use and target the oldest payable
/// installment; full charges take the whole outstanding amount.
pub async fn prepare_charge(
    ledger: &dyn LedgerStore,
    invoice_id: Uuid,
    payment_type: PaymentType,
    today: NaiveDate,
) -> Result<Charge> {
    let invoice = ledger
        .get_invoice(&invoice_id)
        .await?
        .ok_or(LedgerError::InvoiceNotFound { id: invoice_id })?;
    if invoice.is_paid() {
        return Err(LedgerError::InvoiceAlreadyPaid { id: invoice_id }.into());
    }

    match payment_type {
        PaymentType::Full => Ok(Charge {
            amount_paise: invoice.due_paise(),
            invoice,
            payment_type,
            installment: None,
        }),
        PaymentType::Emi => {
            let mut plan = ledger.installments(&invoice_id).await?;
            if plan.is_empty() {
                plan = match ledger.create_emi_plan(&invoice_id, today).await {
                    Ok(plan) => plan,
                    // Another request created it first
                    Err(e) if matches!(
                        e.downcast_ref::<LedgerError>(),
                        Some(LedgerError::EmiAlreadyExists { .. })
                    ) =>
                    {
                        ledger.installments(&invoice_id).await?
                    }
                    Err(e) => return Err(e),
                };
            }

            let idx = next_payable(&plan).ok_or(LedgerError::NoPendingInstallments { id: invoice_id })?;
            let installment = plan.swap_remove(idx);
            Ok(Charge {
                amount_paise: installment.amount_paise().min(invoice.due_paise()),
                invoice,
                payment_type,
                installment: Some(installment),
            })
        }
    }
}

fn notes_invoice_id(notes: &PaymentNotes) -> Result<Uuid> {
    let raw = notes
        .invoice_id
        .as_deref()
        .ok_or_else(|| PaymentError::MissingNotes {
            field: "invoiceId".to_string(),
        })?;
    Uuid::parse_str(raw).map_err(|_| {
        ValidationError::InvalidId {
            field: "invoiceId".to_string(),
            value: raw.to_string(),
        }
        .into()
    })
}

fn notes_payment_type(notes: &PaymentNotes) -> Result<PaymentType> {
    match notes.payment_type.as_deref() {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(PaymentType::Full),
    }
}

/// Build a posting from a captured gateway payment and the notes of the
/// order or QR code it paid
pub fn posting_from_payment(
    payment: &GatewayPayment,
    notes: &PaymentNotes,
    source: PaymentSource,
) -> Result<Posting> {
    Ok(Posting {
        invoice_id: notes_invoice_id(notes)?,
        payment_type: notes_payment_type(notes)?,
        amount: from_paise(payment.amount),
        method: payment.method.clone(),
        gateway_order_id: payment.order_id.clone(),
        gateway_payment_id: payment.id.clone(),
        source,
    })
}

/// Build a failed-attempt record from a failed gateway payment
pub fn failure_from_payment(payment: &GatewayPayment, notes: &PaymentNotes) -> Result<FailedPosting> {
    Ok(FailedPosting {
        invoice_id: notes_invoice_id(notes)?,
        payment_type: notes_payment_type(notes)?,
        installment_number: notes
            .installment_number
            .as_deref()
            .and_then(|n| n.parse().ok()),
        amount: from_paise(payment.amount),
        method: payment.method.clone(),
        gateway_order_id: payment.order_id.clone(),
        gateway_payment_id: Some(payment.id.clone()),
        source: PaymentSource::Webhook,
        reason: payment
            .error_description
            .clone()
            .unwrap_or_else(|| "payment failed".to_string()),
    })
}

/// Notes for a payment, falling back to its order when the payment itself
/// carries none
pub async fn resolve_notes(
    gateway: &dyn PaymentGateway,
    payment: &GatewayPayment,
) -> Result<PaymentNotes> {
    if !payment.notes.is_empty() {
        return Ok(payment.notes.clone());
    }
    match payment.order_id.as_deref() {
        Some(order_id) => Ok(gateway.fetch_order(order_id).await?.notes),
        None => Ok(PaymentNotes::default()),
    }
}

#[derive(Debug, Deserialize)]
pub struct Wrapped<T> {
    pub entity: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Wrapped<GatewayPayment>>,
    #[serde(default)]
    pub qr_code: Option<Wrapped<GatewayQrCode>>,
}

/// Webhook envelope: `{ "event": ..., "payload": { "payment": { "entity": .. } } }`
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

impl WebhookEvent {
    pub fn payment(&self) -> Result<&GatewayPayment, PaymentError> {
        self.payload
            .payment
            .as_ref()
            .map(|w| &w.entity)
            .ok_or_else(|| PaymentError::MissingNotes {
                field: "payload.payment".to_string(),
            })
    }

    pub fn qr_code(&self) -> Result<&GatewayQrCode, PaymentError> {
        self.payload
            .qr_code
            .as_ref()
            .map(|w| &w.entity)
            .ok_or_else(|| PaymentError::MissingNotes {
                field: "payload.qr_code".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::model::Notification;
    use crate::storage::{InMemoryDataService, InMemoryLedgerStore};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    async fn ledger_with_invoice(total: f64) -> (InMemoryLedgerStore, FeeInvoice) {
        let store = InMemoryLedgerStore::new(InMemoryDataService::<Notification>::new());
        let invoice = FeeInvoice::issue(Uuid::new_v4(), "INV-9".into(), None, total, today(), None)
            .unwrap();
        let invoice = store.create_invoice(invoice).await.unwrap();
        (store, invoice)
    }

    fn captured(amount: i64, notes: PaymentNotes) -> GatewayPayment {
        GatewayPayment {
            id: "pay_abc".into(),
            amount,
            currency: "INR".into(),
            status: "captured".into(),
            order_id: Some("order_abc".into()),
            method: Some("upi".into()),
            error_description: None,
            notes,
        }
    }

    #[tokio::test]
    async fn test_full_charge_uses_due_amount() {
        let (store, invoice) = ledger_with_invoice(7500.0).await;
        let charge = prepare_charge(&store, invoice.id, PaymentType::Full, today())
            .await
            .unwrap();
        assert_eq!(charge.amount_paise, 750_000);
        assert_eq!(charge.receipt(), "INV-9");
        assert!(charge.installment.is_none());
    }

    #[tokio::test]
    async fn test_emi_charge_creates_plan_lazily() {
        let (store, invoice) = ledger_with_invoice(6200.0).await;
        let charge = prepare_charge(&store, invoice.id, PaymentType::Emi, today())
            .await
            .unwrap();
        assert_eq!(charge.amount_paise, 310_000);
        assert_eq!(charge.installment_number(), Some(1));
        assert_eq!(charge.notes().installment_number.as_deref(), Some("1"));
        assert_eq!(store.installments(&invoice.id).await.unwrap().len(), 2);

        // A second EMI charge reuses the plan
        let again = prepare_charge(&store, invoice.id, PaymentType::Emi, today())
            .await
            .unwrap();
        assert_eq!(again.installment_number(), Some(1));
        assert_eq!(store.installments(&invoice.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_paid_invoice_rejected_before_gateway() {
        let (store, invoice) = ledger_with_invoice(100.0).await;
        let notes = PaymentNotes::for_charge(&invoice, PaymentType::Full, None);
        let posting =
            posting_from_payment(&captured(10_000, notes.clone()), &notes, PaymentSource::Checkout)
                .unwrap();
        store.apply_payment(posting).await.unwrap();

        let err = prepare_charge(&store, invoice.id, PaymentType::Full, today())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvoiceAlreadyPaid { .. })
        ));
    }

    #[test]
    fn test_posting_requires_invoice_note() {
        let err = posting_from_payment(
            &captured(100, PaymentNotes::default()),
            &PaymentNotes::default(),
            PaymentSource::Webhook,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PaymentError>(),
            Some(PaymentError::MissingNotes { .. })
        ));
    }

    #[test]
    fn test_webhook_envelope_parsing() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "entity": "event",
            "event": "payment.failed",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_f",
                        "amount": 50000,
                        "currency": "INR",
                        "status": "failed",
                        "error_description": "Card declined",
                        "notes": { "invoiceId": Uuid::nil().to_string(), "paymentType": "emi", "installmentNumber": "2" }
                    }
                }
            }
        }))
        .unwrap();

        let payment = event.payment().unwrap();
        let failure = failure_from_payment(payment, &payment.notes).unwrap();
        assert_eq!(failure.payment_type, PaymentType::Emi);
        assert_eq!(failure.installment_number, Some(2));
        assert_eq!(failure.amount, 500.0);
        assert_eq!(failure.reason, "Card declined");
        assert!(event.qr_code().is_err());
    }
}
