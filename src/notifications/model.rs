//! Notification and outbound message records

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

crate::impl_field_enum!(
    /// Delivery state of an outbound WhatsApp message
    MessageStatus {
        Queued => "queued",
        Sent => "sent",
        Failed => "failed",
    }
);

crate::impl_data_entity!(
    Notification,
    "notification",
    ["recipient_id", "read"],
    {
        recipient_id: Uuid,
        recipient_role: String,
        notification_type: String,
        title: String,
        message: String,
        #[serde(default)]
        read: bool,
        #[serde(default)]
        read_at: Option<DateTime<Utc>>,
        #[serde(default)]
        metadata: serde_json::Value,
    }
);

crate::impl_data_entity!(
    WhatsAppMessage,
    "whatsapp_message",
    ["student_id", "recipient_phone"],
    {
        recipient_phone: String,
        #[serde(default)]
        student_id: Option<Uuid>,
        template_name: String,
        body: String,
        status: MessageStatus,
        #[serde(default)]
        sent_at: Option<DateTime<Utc>>,
    }
);

impl Notification {
    /// A notification addressed to a student about their fees
    pub fn for_student(
        student_id: Uuid,
        notification_type: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self::new(
            student_id,
            "student".to_string(),
            notification_type.to_string(),
            title.into(),
            message.into(),
            false,
            None,
            metadata,
        )
    }

    /// Flag as read; returns false when it already was
    pub fn mark_read(&mut self) -> bool {
        if self.read {
            return false;
        }
        let now = Utc::now();
        self.read = true;
        self.read_at = Some(now);
        self.updated_at = now;
        true
    }
}

impl WhatsAppMessage {
    /// A rendered message recorded as delivered
    pub fn sent(
        recipient_phone: String,
        student_id: Option<Uuid>,
        template_name: String,
        body: String,
    ) -> Self {
        Self::new(
            recipient_phone,
            student_id,
            template_name,
            body,
            MessageStatus::Sent,
            Some(Utc::now()),
        )
    }
}

/// Metadata attached to fee notifications
pub fn payment_metadata(invoice_id: Uuid, payment_id: Uuid, amount: f64) -> serde_json::Value {
    json!({
        "invoiceId": invoice_id,
        "paymentId": payment_id,
        "amount": amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Data;
    use crate::core::field::FieldValue;

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut n = Notification::for_student(
            Uuid::new_v4(),
            "payment_success",
            "Payment received",
            "ok",
            serde_json::Value::Null,
        );
        assert!(n.mark_read());
        assert!(n.read_at.is_some());
        assert!(!n.mark_read());
    }

    #[test]
    fn test_read_flag_is_filterable() {
        let n = Notification::for_student(
            Uuid::new_v4(),
            "payment_failed",
            "Payment failed",
            "declined",
            serde_json::Value::Null,
        );
        assert_eq!(n.field_value("read"), Some(FieldValue::Boolean(false)));
        assert_eq!(n.recipient_role, "student");
    }

    #[test]
    fn test_sent_message_serialization() {
        let msg = WhatsAppMessage::sent(
            "+919876543210".to_string(),
            None,
            "attendance_absent".to_string(),
            "hello".to_string(),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["status"], "sent");
        assert_eq!(json["type"], "whatsapp_message");
        assert_eq!(json["templateName"], "attendance_absent");
    }
}
