//! Invoice, installment and payment records plus the pure ledger rules
//!
//! Amounts are rupees (`f64`) on the wire. Every calculation goes through
//! integer paise so that `paid + due == total` holds exactly.

use crate::core::entity::Entity;
use crate::core::error::LedgerError;
use crate::notifications::model::{Notification, payment_metadata};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

/// Days between the first and second EMI installment
pub const EMI_INTERVAL_DAYS: i64 = 30;

/// Number of installments in an EMI plan
pub const EMI_INSTALLMENTS: i32 = 2;

/// Largest amount a single invoice or posting may carry, in rupees
pub const MAX_AMOUNT_RUPEES: f64 = 1e12;

/// Rupees to paise, rounded to the nearest paisa
pub fn to_paise(rupees: f64) -> i64 {
    (rupees * 100.0).round() as i64
}

/// Paise for a caller-supplied amount: finite, positive and at most
/// `MAX_AMOUNT_RUPEES`.
pub fn positive_paise(rupees: f64, field: &str) -> Result<i64, LedgerError> {
    let reason = if !rupees.is_finite() {
        format!("{} must be a finite number", field)
    } else if rupees > MAX_AMOUNT_RUPEES {
        format!("{} must not exceed {}", field, MAX_AMOUNT_RUPEES)
    } else if to_paise(rupees) <= 0 {
        format!("{} must be greater than zero", field)
    } else {
        return Ok(to_paise(rupees));
    };
    Err(LedgerError::InvalidAmount {
        amount: rupees,
        reason,
    })
}

/// Paise to rupees
pub fn from_paise(paise: i64) -> f64 {
    paise as f64 / 100.0
}

crate::impl_field_enum!(
    /// Derived invoice status
    InvoiceStatus {
        Pending => "pending",
        Partial => "partial",
        Paid => "paid",
        Overdue => "overdue",
    }
);

crate::impl_field_enum!(
    InstallmentStatus {
        Pending => "pending",
        Paid => "paid",
        Overdue => "overdue",
    }
);

crate::impl_field_enum!(
    PaymentStatus {
        Completed => "completed",
        Failed => "failed",
        Pending => "pending",
    }
);

crate::impl_field_enum!(
    /// How a payment is applied to its invoice
    PaymentType {
        Full => "full",
        Emi => "emi",
    }
);

crate::impl_field_enum!(
    /// Which path reported the payment
    PaymentSource {
        Checkout => "checkout",
        Webhook => "webhook",
        Qr => "qr",
    }
);

crate::impl_data_entity!(
    FeeInvoice,
    "fee_invoice",
    ["student_id", "invoice_number", "status"],
    {
        student_id: Uuid,
        invoice_number: String,
        #[serde(default)]
        description: Option<String>,
        total_amount: f64,
        paid_amount: f64,
        due_amount: f64,
        status: InvoiceStatus,
        due_date: NaiveDate,
        #[serde(default)]
        academic_year_id: Option<Uuid>,
    }
);

crate::impl_data_entity!(
    PaymentInstallment,
    "payment_installment",
    ["invoice_id", "status"],
    {
        invoice_id: Uuid,
        installment_number: i32,
        amount: f64,
        paid_amount: f64,
        due_date: NaiveDate,
        status: InstallmentStatus,
        #[serde(default)]
        payment_id: Option<Uuid>,
        #[serde(default)]
        paid_at: Option<DateTime<Utc>>,
    }
);

crate::impl_data_entity!(
    FeePayment,
    "fee_payment",
    ["invoice_id", "student_id", "status", "gateway_payment_id"],
    {
        invoice_id: Uuid,
        student_id: Uuid,
        amount: f64,
        status: PaymentStatus,
        payment_type: PaymentType,
        #[serde(default)]
        installment_number: Option<i32>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        gateway_order_id: Option<String>,
        #[serde(default)]
        gateway_payment_id: Option<String>,
        source: PaymentSource,
        #[serde(default)]
        failure_reason: Option<String>,
    }
);

impl FeeInvoice {
    /// A new unpaid invoice
    pub fn issue(
        student_id: Uuid,
        invoice_number: String,
        description: Option<String>,
        total_amount: f64,
        due_date: NaiveDate,
        academic_year_id: Option<Uuid>,
    ) -> Result<Self> {
        let total = from_paise(positive_paise(total_amount, "totalAmount")?);
        Ok(Self::new(
            student_id,
            invoice_number,
            description,
            total,
            0.0,
            total,
            InvoiceStatus::Pending,
            due_date,
            academic_year_id,
        ))
    }

    pub fn total_paise(&self) -> i64 {
        to_paise(self.total_amount)
    }

    pub fn paid_paise(&self) -> i64 {
        to_paise(self.paid_amount)
    }

    pub fn due_paise(&self) -> i64 {
        to_paise(self.due_amount)
    }

    pub fn is_paid(&self) -> bool {
        self.due_paise() <= 0
    }

    /// Add a captured amount, capped at what is still due, and recompute
    /// status. Returns the paise actually applied.
    pub fn settle(&mut self, amount_paise: i64) -> i64 {
        let applied = amount_paise.min(self.due_paise()).max(0);
        let paid = self.paid_paise() + applied;
        let due = (self.total_paise() - paid).max(0);

        self.paid_amount = from_paise(paid);
        self.due_amount = from_paise(due);
        self.status = if due <= 0 {
            InvoiceStatus::Paid
        } else if paid > 0 {
            InvoiceStatus::Partial
        } else {
            self.status
        };
        self.touch();
        applied
    }

    /// Overdue when nothing has been paid and the due date has passed
    pub fn should_mark_overdue(&self, today: NaiveDate) -> bool {
        self.due_paise() > 0
            && self.paid_paise() == 0
            && self.due_date < today
            && self.status != InvoiceStatus::Overdue
    }
}

impl PaymentInstallment {
    /// Pending or overdue
    pub fn is_payable(&self) -> bool {
        matches!(
            self.status,
            InstallmentStatus::Pending | InstallmentStatus::Overdue
        )
    }

    pub fn amount_paise(&self) -> i64 {
        to_paise(self.amount)
    }

    fn settle(&mut self, payment_id: Uuid, now: DateTime<Utc>) {
        self.paid_amount = self.amount;
        self.status = InstallmentStatus::Paid;
        self.payment_id = Some(payment_id);
        self.paid_at = Some(now);
        self.updated_at = now;
    }
}

/// Split a total into the two EMI amounts; an odd paisa goes to the second
pub fn split_emi(total_paise: i64) -> [i64; 2] {
    let first = total_paise / 2;
    [first, total_paise - first]
}

/// Build the installment rows for an invoice, due today and today + 30 days
pub fn plan_installments(invoice: &FeeInvoice, today: NaiveDate) -> Vec<PaymentInstallment> {
    split_emi(invoice.total_paise())
        .into_iter()
        .enumerate()
        .map(|(idx, amount)| {
            PaymentInstallment::new(
                invoice.id,
                idx as i32 + 1,
                from_paise(amount),
                0.0,
                today + Duration::days(EMI_INTERVAL_DAYS * idx as i64),
                InstallmentStatus::Pending,
                None,
                None,
            )
        })
        .collect()
}

/// Check whether a plan may be created for this invoice
pub fn ensure_plan_allowed(invoice: &FeeInvoice, existing: &[PaymentInstallment]) -> Result<()> {
    if !existing.is_empty() {
        return Err(LedgerError::EmiAlreadyExists { id: invoice.id }.into());
    }
    if invoice.is_paid() {
        return Err(LedgerError::InvoiceAlreadyPaid { id: invoice.id }.into());
    }
    if invoice.paid_paise() > 0 {
        return Err(LedgerError::EmiNotAllowed {
            id: invoice.id,
            reason: "a payment has already been made against the full amount".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Index of the oldest payable installment (lowest number)
pub fn next_payable(installments: &[PaymentInstallment]) -> Option<usize> {
    installments
        .iter()
        .enumerate()
        .filter(|(_, inst)| inst.is_payable())
        .min_by_key(|(_, inst)| inst.installment_number)
        .map(|(idx, _)| idx)
}

/// A captured amount and the metadata saying how to apply it
#[derive(Debug, Clone)]
pub struct Posting {
    pub invoice_id: Uuid,
    pub payment_type: PaymentType,
    pub amount: f64,
    pub method: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: String,
    pub source: PaymentSource,
}

/// A payment attempt the gateway reported as failed
#[derive(Debug, Clone)]
pub struct FailedPosting {
    pub invoice_id: Uuid,
    pub payment_type: PaymentType,
    pub installment_number: Option<i32>,
    pub amount: f64,
    pub method: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub source: PaymentSource,
    pub reason: String,
}

/// Result of applying a posting
#[derive(Debug, Clone)]
pub struct PostingOutcome {
    pub invoice: FeeInvoice,
    pub installment: Option<PaymentInstallment>,
    pub payment: FeePayment,
    /// Another posting with the same gateway payment id was already applied
    pub duplicate: bool,
}

/// Rows changed by an applied posting, ready to be persisted together
#[derive(Debug)]
pub struct AppliedPosting {
    pub payment: FeePayment,
    /// Indexes into the installment slice that were settled
    pub settled: Vec<usize>,
    pub notification: Notification,
}

/// Apply a posting to an invoice and its installments in place.
///
/// EMI postings settle the oldest payable installment; full postings settle
/// every payable installment. The caller persists the invoice, the settled
/// installments, the payment and the notification as one unit.
pub fn apply_posting(
    invoice: &mut FeeInvoice,
    installments: &mut [PaymentInstallment],
    posting: &Posting,
    now: DateTime<Utc>,
) -> Result<AppliedPosting> {
    let amount_paise = positive_paise(posting.amount, "captured amount")?;
    if invoice.is_paid() {
        return Err(LedgerError::InvoiceAlreadyPaid { id: invoice.id }.into());
    }

    let settled: Vec<usize> = match posting.payment_type {
        PaymentType::Emi => {
            let idx = next_payable(installments)
                .ok_or(LedgerError::NoPendingInstallments { id: invoice.id })?;
            vec![idx]
        }
        PaymentType::Full => installments
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.is_payable())
            .map(|(idx, _)| idx)
            .collect(),
    };

    if amount_paise > invoice.due_paise() {
        tracing::warn!(
            invoice_id = %invoice.id,
            captured = posting.amount,
            due = invoice.due_amount,
            "Captured amount exceeds amount due, capping"
        );
    }
    let applied = invoice.settle(amount_paise);

    let installment_number = match posting.payment_type {
        PaymentType::Emi => settled
            .first()
            .map(|idx| installments[*idx].installment_number),
        PaymentType::Full => None,
    };

    let payment = FeePayment::new(
        invoice.id,
        invoice.student_id,
        from_paise(applied),
        PaymentStatus::Completed,
        posting.payment_type,
        installment_number,
        posting.method.clone(),
        posting.gateway_order_id.clone(),
        Some(posting.gateway_payment_id.clone()),
        posting.source,
        None,
    );

    for idx in &settled {
        installments[*idx].settle(payment.id, now);
    }

    let message = match installment_number {
        Some(n) => format!(
            "Installment {} of Rs. {:.2} received for invoice {}",
            n, payment.amount, invoice.invoice_number
        ),
        None => format!(
            "Payment of Rs. {:.2} received for invoice {}",
            payment.amount, invoice.invoice_number
        ),
    };
    let notification = Notification::for_student(
        invoice.student_id,
        "payment_success",
        "Payment received",
        message,
        payment_metadata(invoice.id, payment.id, payment.amount),
    );

    Ok(AppliedPosting {
        payment,
        settled,
        notification,
    })
}

/// Build the failed payment row and its notification
pub fn failed_payment(invoice: &FeeInvoice, failure: &FailedPosting) -> (FeePayment, Notification) {
    let payment = FeePayment::new(
        invoice.id,
        invoice.student_id,
        from_paise(to_paise(failure.amount)),
        PaymentStatus::Failed,
        failure.payment_type,
        failure.installment_number,
        failure.method.clone(),
        failure.gateway_order_id.clone(),
        failure.gateway_payment_id.clone(),
        failure.source,
        Some(failure.reason.clone()),
    );
    let notification = Notification::for_student(
        invoice.student_id,
        "payment_failed",
        "Payment failed",
        format!(
            "Payment of Rs. {:.2} for invoice {} failed: {}",
            payment.amount, invoice.invoice_number, failure.reason
        ),
        payment_metadata(invoice.id, payment.id, payment.amount),
    );
    (payment, notification)
}

/// Counts returned by the overdue sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueReport {
    pub invoices: usize,
    pub installments: usize,
}

/// Mark overdue installments in place; returns how many changed
pub fn mark_overdue_installments(
    installments: &mut [PaymentInstallment],
    today: NaiveDate,
) -> usize {
    let mut changed = 0;
    for inst in installments
        .iter_mut()
        .filter(|i| i.status == InstallmentStatus::Pending && i.due_date < today)
    {
        inst.status = InstallmentStatus::Overdue;
        inst.touch();
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(total: f64) -> FeeInvoice {
        FeeInvoice::issue(
            Uuid::new_v4(),
            "INV-001".to_string(),
            None,
            total,
            date(2024, 7, 1),
            None,
        )
        .unwrap()
    }

    fn posting(invoice: &FeeInvoice, payment_type: PaymentType, amount: f64) -> Posting {
        Posting {
            invoice_id: invoice.id,
            payment_type,
            amount,
            method: Some("upi".to_string()),
            gateway_order_id: Some("order_1".to_string()),
            gateway_payment_id: format!("pay_{}", Uuid::new_v4().simple()),
            source: PaymentSource::Checkout,
        }
    }

    #[test]
    fn test_money_conversion_is_exact_in_paise() {
        assert_eq!(to_paise(0.1 + 0.2), 30);
        assert_eq!(to_paise(6200.0), 620_000);
        assert_eq!(from_paise(310_050), 3100.5);
    }

    #[test]
    fn test_positive_paise_bounds() {
        assert_eq!(positive_paise(MAX_AMOUNT_RUPEES, "x").unwrap(), 100_000_000_000_000);
        for bad in [0.0, -5.0, 0.004, 1e300, f64::INFINITY, f64::NAN] {
            let err = positive_paise(bad, "totalAmount").unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_issue_rejects_non_positive_total() {
        let err = FeeInvoice::issue(Uuid::new_v4(), "X".into(), None, 0.0, date(2024, 1, 1), None)
            .unwrap_err();
        assert!(err.downcast_ref::<LedgerError>().is_some());
    }

    #[test]
    fn test_full_payment_settles_invoice() {
        let mut inv = invoice(7500.0);
        let p = posting(&inv, PaymentType::Full, 7500.0);
        let applied =
            apply_posting(&mut inv, &mut [], &p, Utc::now())
                .unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.due_amount, 0.0);
        assert_eq!(inv.paid_amount, 7500.0);
        assert_eq!(applied.payment.amount, 7500.0);
        assert_eq!(applied.payment.status, PaymentStatus::Completed);
        assert_eq!(applied.notification.notification_type, "payment_success");
    }

    #[test]
    fn test_oversized_posting_is_rejected() {
        let mut inv = invoice(1000.0);
        let p = posting(&inv, PaymentType::Full, 1e300);
        let err = apply_posting(&mut inv, &mut [], &p, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvalidAmount { .. })
        ));
        assert_eq!(inv.due_amount, 1000.0);
    }

    #[test]
    fn test_partial_full_path_payment() {
        let mut inv = invoice(1000.0);
        let p = posting(&inv, PaymentType::Full, 400.0);
        apply_posting(&mut inv, &mut [], &p, Utc::now())
            .unwrap();
        assert_eq!(inv.status, InvoiceStatus::Partial);
        assert_eq!(inv.paid_paise() + inv.due_paise(), inv.total_paise());
    }

    #[test]
    fn test_overpayment_is_capped() {
        let mut inv = invoice(500.0);
        let p = posting(&inv, PaymentType::Full, 800.0);
        let applied =
            apply_posting(&mut inv, &mut [], &p, Utc::now())
                .unwrap();
        assert_eq!(inv.due_amount, 0.0);
        assert_eq!(inv.paid_amount, 500.0);
        assert_eq!(applied.payment.amount, 500.0);
    }

    #[test]
    fn test_emi_plan_split_and_dates() {
        let inv = invoice(6200.0);
        let today = date(2024, 6, 1);
        let plan = plan_installments(&inv, today);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].amount, 3100.0);
        assert_eq!(plan[1].amount, 3100.0);
        assert_eq!(plan[0].due_date, today);
        assert_eq!(plan[1].due_date, date(2024, 7, 1));
        assert_eq!(plan[0].installment_number, 1);
        assert_eq!(plan[1].installment_number, 2);
    }

    #[test]
    fn test_emi_split_odd_paisa() {
        assert_eq!(split_emi(1001), [500, 501]);
        let inv = invoice(100.01);
        let plan = plan_installments(&inv, date(2024, 6, 1));
        let sum: i64 = plan.iter().map(|i| i.amount_paise()).sum();
        assert_eq!(sum, inv.total_paise());
    }

    #[test]
    fn test_emi_payment_targets_oldest_payable() {
        let mut inv = invoice(6200.0);
        let mut plan = plan_installments(&inv, date(2024, 6, 1));

        let p = posting(&inv, PaymentType::Emi, 3100.0);
        let first = apply_posting(&mut inv, &mut plan, &p, Utc::now())
            .unwrap();
        assert_eq!(first.settled, vec![0]);
        assert_eq!(first.payment.installment_number, Some(1));
        assert_eq!(plan[0].status, InstallmentStatus::Paid);
        assert_eq!(plan[0].payment_id, Some(first.payment.id));
        assert_eq!(plan[1].status, InstallmentStatus::Pending);
        assert_eq!(inv.status, InvoiceStatus::Partial);

        let p = posting(&inv, PaymentType::Emi, 3100.0);
        let second = apply_posting(&mut inv, &mut plan, &p, Utc::now())
            .unwrap();
        assert_eq!(second.settled, vec![1]);
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_emi_without_plan_fails() {
        let mut inv = invoice(6200.0);
        let p = posting(&inv, PaymentType::Emi, 3100.0);
        let err = apply_posting(&mut inv, &mut [], &p, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::NoPendingInstallments { .. })
        ));
        assert_eq!(inv.paid_amount, 0.0);
    }

    #[test]
    fn test_full_payment_settles_remaining_installments() {
        let mut inv = invoice(6200.0);
        let mut plan = plan_installments(&inv, date(2024, 6, 1));
        let p = posting(&inv, PaymentType::Emi, 3100.0);
        apply_posting(&mut inv, &mut plan, &p, Utc::now())
            .unwrap();
        let p = posting(&inv, PaymentType::Full, 3100.0);
        let applied =
            apply_posting(&mut inv, &mut plan, &p, Utc::now())
                .unwrap();
        assert_eq!(applied.settled, vec![1]);
        assert!(plan.iter().all(|i| i.status == InstallmentStatus::Paid));
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_plan_rules() {
        let mut inv = invoice(1000.0);
        assert!(ensure_plan_allowed(&inv, &[]).is_ok());

        let plan = plan_installments(&inv, date(2024, 6, 1));
        let err = ensure_plan_allowed(&inv, &plan).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::EmiAlreadyExists { .. })
        ));

        inv.settle(to_paise(100.0));
        let err = ensure_plan_allowed(&inv, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::EmiNotAllowed { .. })
        ));

        inv.settle(to_paise(900.0));
        let err = ensure_plan_allowed(&inv, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvoiceAlreadyPaid { .. })
        ));
    }

    #[test]
    fn test_overdue_rules() {
        let inv = invoice(1000.0);
        assert!(!inv.should_mark_overdue(date(2024, 7, 1)));
        assert!(inv.should_mark_overdue(date(2024, 7, 2)));

        let mut plan = plan_installments(&inv, date(2024, 6, 1));
        assert_eq!(mark_overdue_installments(&mut plan, date(2024, 6, 15)), 1);
        assert_eq!(plan[0].status, InstallmentStatus::Overdue);
        assert!(plan[0].is_payable());
        assert_eq!(next_payable(&plan), Some(0));
    }

    #[test]
    fn test_failed_payment_leaves_invoice_alone() {
        let inv = invoice(1000.0);
        let (payment, notification) = failed_payment(
            &inv,
            &FailedPosting {
                invoice_id: inv.id,
                payment_type: PaymentType::Full,
                installment_number: None,
                amount: 1000.0,
                method: None,
                gateway_order_id: None,
                gateway_payment_id: Some("pay_x".to_string()),
                source: PaymentSource::Webhook,
                reason: "card declined".to_string(),
            },
        );
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason.as_deref(), Some("card declined"));
        assert_eq!(notification.notification_type, "payment_failed");
        assert_eq!(inv.status, InvoiceStatus::Pending);
    }
}
