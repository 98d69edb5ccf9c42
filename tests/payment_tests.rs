//! Payment bridge over HTTP: orders, EMI plans, checkout verification,
//! webhooks and UPI QR codes

mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use campus::payments::PaymentGateway;
use campus::payments::gateway::GatewayPayment;
use common::*;
use serde_json::{Value, json};

async fn create_order(server: &TestServer, invoice_id: &str, payment_type: &str) -> Value {
    let response = server
        .post("/api/payments/create-order")
        .json(&json!({ "invoiceId": invoice_id, "paymentType": payment_type }))
        .await;
    response.assert_status_ok();
    response.json()
}

async fn post_webhook(server: &TestServer, body: &Value) -> Value {
    let raw = serde_json::to_vec(body).unwrap();
    let (name, value) = signature_header(&webhook_signature(&raw));
    let response = server
        .post("/api/payments/webhook")
        .add_header(name, value)
        .content_type("application/json")
        .bytes(Bytes::from(raw))
        .await;
    response.assert_status_ok();
    response.json()
}

fn payment_event(event: &str, payment: &GatewayPayment) -> Value {
    json!({
        "event": event,
        "payload": { "payment": { "entity": payment } }
    })
}

// =============================================================================
// Orders and checkout verification
// =============================================================================

mod checkout_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_order_charges_due_amount() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-201").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-201", 12500.75, "2030-01-01").await;

        let order = create_order(&app.server, &id_of(&invoice), "full").await;

        assert!(order["orderId"].as_str().unwrap().starts_with("order_"));
        assert_eq!(order["amount"], 12500.75);
        assert_eq!(order["amountPaise"], 1_250_075);
        assert_eq!(order["currency"], "INR");
        assert_eq!(order["keyId"], KEY_ID);
        assert_eq!(order["paymentType"], "full");
        assert!(order["installmentNumber"].is_null());
    }

    #[tokio::test]
    async fn test_order_for_missing_or_paid_invoice() {
        let app = spawn_app();

        let missing = app
            .server
            .post("/api/payments/create-order")
            .json(&json!({ "invoiceId": uuid::Uuid::new_v4() }))
            .await;
        missing.assert_status(StatusCode::NOT_FOUND);
        let body: Value = missing.json();
        assert_eq!(body["code"], "INVOICE_NOT_FOUND");

        let no_id = app
            .server
            .post("/api/payments/create-order")
            .json(&json!({}))
            .await;
        no_id.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = no_id.json();
        assert_eq!(body["code"], "INVALID_ID");

        let family = seed_family(&app.server, "ADM-202").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-202", 300.0, "2030-01-01").await;
        pay_through_checkout(&app, &id_of(&invoice), "full").await;
        let orders_before = app.gateway.order_count().unwrap();
        let qr_codes_before = app.gateway.qr_code_count().unwrap();

        let paid = app
            .server
            .post("/api/payments/create-order")
            .json(&json!({ "invoiceId": id_of(&invoice) }))
            .await;
        paid.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = paid.json();
        assert_eq!(body["code"], "INVOICE_ALREADY_PAID");

        let paid_qr = app
            .server
            .post("/api/payments/qr-code")
            .json(&json!({ "invoiceId": id_of(&invoice), "paymentType": "full" }))
            .await;
        paid_qr.assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(app.gateway.order_count().unwrap(), orders_before);
        assert_eq!(app.gateway.qr_code_count().unwrap(), qr_codes_before);
    }

    #[tokio::test]
    async fn test_verify_applies_payment_and_notifies() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-203").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-203", 5000.0, "2030-01-01").await;

        let verified = pay_through_checkout(&app, &id_of(&invoice), "full").await;

        assert_eq!(verified["success"], true);
        assert_eq!(verified["duplicate"], false);
        assert_eq!(verified["invoice"]["status"], "paid");
        assert_eq!(verified["invoice"]["paidAmount"], 5000.0);
        assert_eq!(verified["payment"]["status"], "completed");
        assert_eq!(verified["payment"]["source"], "checkout");
        assert_eq!(verified["payment"]["amount"], 5000.0);

        let notifications: Value = app
            .server
            .get(&format!("/api/notifications?recipientId={}", family.student_id))
            .await
            .json();
        assert_eq!(notifications["pagination"]["total"], 1);
        assert_eq!(notifications["data"][0]["notificationType"], "payment_success");
        assert_eq!(notifications["data"][0]["read"], false);
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_signature() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-204").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-204", 700.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let order_id = order["orderId"].as_str().unwrap();
        let payment = app.gateway.capture_payment(order_id).unwrap();

        let response = app
            .server
            .post("/api/payments/verify")
            .json(&json!({
                "orderId": order_id,
                "paymentId": payment.id,
                "signature": checkout_signature("order_other", &payment.id),
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_SIGNATURE");

        // Nothing was applied
        let detail = get_invoice(&app.server, &id_of(&invoice)).await;
        assert_eq!(detail["status"], "pending");
        assert_eq!(detail["payments"], json!([]));
    }

    #[tokio::test]
    async fn test_verify_rejects_uncaptured_payment() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-205").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-205", 700.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let order_id = order["orderId"].as_str().unwrap();
        let payment = app.gateway.fail_payment(order_id, "card declined").unwrap();

        let response = app
            .server
            .post("/api/payments/verify")
            .json(&json!({
                "orderId": order_id,
                "paymentId": payment.id,
                "signature": checkout_signature(order_id, &payment.id),
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "PAYMENT_NOT_CAPTURED");
    }

    #[tokio::test]
    async fn test_replayed_verify_is_duplicate() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-206").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-206", 1000.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let order_id = order["orderId"].as_str().unwrap();
        let payment = app.gateway.capture_payment(order_id).unwrap();
        let request = json!({
            "orderId": order_id,
            "paymentId": payment.id,
            "signature": checkout_signature(order_id, &payment.id),
        });

        let first: Value = app.server.post("/api/payments/verify").json(&request).await.json();
        let second = app.server.post("/api/payments/verify").json(&request).await;
        second.assert_status_ok();
        let second: Value = second.json();

        assert_eq!(first["duplicate"], false);
        assert_eq!(second["duplicate"], true);
        assert_eq!(second["payment"]["id"], first["payment"]["id"]);

        let detail = get_invoice(&app.server, &id_of(&invoice)).await;
        assert_eq!(detail["payments"].as_array().unwrap().len(), 1);
        assert_eq!(detail["paidAmount"], 1000.0);
    }
}

// =============================================================================
// EMI plans
// =============================================================================

mod emi_tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_emi_splits_odd_paisa_to_second() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-211").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-211", 1000.01, "2030-01-01").await;

        let response = app
            .server
            .post("/api/payments/setup-emi")
            .json(&json!({ "invoiceId": id_of(&invoice) }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();

        let installments = body["installments"].as_array().unwrap();
        assert_eq!(installments.len(), 2);
        assert_eq!(installments[0]["installmentNumber"], 1);
        assert_eq!(installments[0]["amount"], 500.0);
        assert_eq!(installments[1]["installmentNumber"], 2);
        assert_eq!(installments[1]["amount"], 500.01);
        assert_eq!(installments[0]["status"], "pending");

        let again = app
            .server
            .post("/api/payments/setup-emi")
            .json(&json!({ "invoiceId": id_of(&invoice) }))
            .await;
        again.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = again.json();
        assert_eq!(body["code"], "EMI_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_emi_not_allowed_after_full_payment_started() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-212").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-212", 900.0, "2030-01-01").await;
        let invoice_id = id_of(&invoice);

        // Partial capture through the QR path leaves the invoice part paid
        let webhook_payment = GatewayPayment {
            id: "pay_partial_212".to_string(),
            amount: 10_000,
            currency: "INR".to_string(),
            status: "captured".to_string(),
            order_id: None,
            method: Some("upi".to_string()),
            error_description: None,
            notes: campus::payments::PaymentNotes {
                invoice_id: Some(invoice_id.clone()),
                student_id: None,
                payment_type: Some("full".to_string()),
                installment_number: None,
            },
        };
        let ack = post_webhook(&app.server, &payment_event("payment.captured", &webhook_payment)).await;
        assert_eq!(ack["status"], "processed");

        let response = app
            .server
            .post("/api/payments/setup-emi")
            .json(&json!({ "invoiceId": invoice_id }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "EMI_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_emi_installments_paid_in_order() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-213").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-213", 20000.0, "2030-01-01").await;
        let invoice_id = id_of(&invoice);

        // The first EMI order creates the plan on demand
        let order = create_order(&app.server, &invoice_id, "emi").await;
        assert_eq!(order["installmentNumber"], 1);
        assert_eq!(order["amount"], 10000.0);

        let first = pay_through_checkout(&app, &invoice_id, "emi").await;
        assert_eq!(first["installment"]["installmentNumber"], 1);
        assert_eq!(first["installment"]["status"], "paid");
        assert_eq!(first["invoice"]["status"], "partial");
        assert_eq!(first["invoice"]["dueAmount"], 10000.0);

        let second = pay_through_checkout(&app, &invoice_id, "emi").await;
        assert_eq!(second["installment"]["installmentNumber"], 2);
        assert_eq!(second["invoice"]["status"], "paid");
        assert_eq!(second["invoice"]["dueAmount"], 0.0);

        let detail = get_invoice(&app.server, &invoice_id).await;
        let installments = detail["installments"].as_array().unwrap();
        assert!(installments.iter().all(|i| i["status"] == "paid"));
        assert_eq!(detail["payments"].as_array().unwrap().len(), 2);

        let done = app
            .server
            .post("/api/payments/create-order")
            .json(&json!({ "invoiceId": invoice_id, "paymentType": "emi" }))
            .await;
        done.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = done.json();
        assert_eq!(body["code"], "INVOICE_ALREADY_PAID");
    }

    #[tokio::test]
    async fn test_full_payment_settles_remaining_installments() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-214").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-214", 3000.0, "2030-01-01").await;
        let invoice_id = id_of(&invoice);

        pay_through_checkout(&app, &invoice_id, "emi").await;
        let full = pay_through_checkout(&app, &invoice_id, "full").await;

        assert_eq!(full["payment"]["amount"], 1500.0);
        assert_eq!(full["invoice"]["status"], "paid");
        let detail = get_invoice(&app.server, &invoice_id).await;
        let installments = detail["installments"].as_array().unwrap();
        assert!(installments.iter().all(|i| i["status"] == "paid"));
    }
}

// =============================================================================
// Webhooks
// =============================================================================

mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_requires_valid_signature() {
        let app = spawn_app();
        let body = json!({ "event": "payment.captured", "payload": {} });

        let unsigned = app.server.post("/api/payments/webhook").json(&body).await;
        unsigned.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = unsigned.json();
        assert_eq!(error["code"], "INVALID_SIGNATURE");

        let (name, value) = signature_header("deadbeef");
        let forged = app
            .server
            .post("/api/payments/webhook")
            .add_header(name, value)
            .json(&body)
            .await;
        forged.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_captured_webhook_applied_once() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-221").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-221", 2500.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let payment = app
            .gateway
            .capture_payment(order["orderId"].as_str().unwrap())
            .unwrap();
        let event = payment_event("payment.captured", &payment);

        let first = post_webhook(&app.server, &event).await;
        let replay = post_webhook(&app.server, &event).await;

        assert_eq!(first["received"], true);
        assert_eq!(first["status"], "processed");
        assert_eq!(replay["status"], "duplicate");

        let detail = get_invoice(&app.server, &id_of(&invoice)).await;
        assert_eq!(detail["status"], "paid");
        assert_eq!(detail["payments"].as_array().unwrap().len(), 1);
        assert_eq!(detail["payments"][0]["source"], "webhook");
    }

    #[tokio::test]
    async fn test_webhook_and_checkout_race_applies_once() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-222").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-222", 640.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let order_id = order["orderId"].as_str().unwrap();
        let payment = app.gateway.capture_payment(order_id).unwrap();

        let ack = post_webhook(&app.server, &payment_event("payment.captured", &payment)).await;
        assert_eq!(ack["status"], "processed");

        let verified: Value = app
            .server
            .post("/api/payments/verify")
            .json(&json!({
                "orderId": order_id,
                "paymentId": payment.id,
                "signature": checkout_signature(order_id, &payment.id),
            }))
            .await
            .json();
        assert_eq!(verified["duplicate"], true);
        assert_eq!(verified["invoice"]["paidAmount"], 640.0);
    }

    #[tokio::test]
    async fn test_failed_webhook_records_attempt() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-223").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-223", 999.0, "2030-01-01").await;
        let order = create_order(&app.server, &id_of(&invoice), "full").await;
        let payment = app
            .gateway
            .fail_payment(order["orderId"].as_str().unwrap(), "insufficient funds")
            .unwrap();
        let event = payment_event("payment.failed", &payment);

        let ack = post_webhook(&app.server, &event).await;
        assert_eq!(ack["status"], "processed");
        post_webhook(&app.server, &event).await;

        let failed: Value = app
            .server
            .get(&format!("/api/fees/payments?invoiceId={}&status=failed", id_of(&invoice)))
            .await
            .json();
        assert_eq!(failed["pagination"]["total"], 1);
        assert_eq!(failed["data"][0]["failureReason"], "insufficient funds");

        let detail = get_invoice(&app.server, &id_of(&invoice)).await;
        assert_eq!(detail["status"], "pending");
        assert_eq!(detail["paidAmount"], 0.0);

        let notifications: Value = app
            .server
            .get(&format!("/api/notifications?recipientId={}", family.student_id))
            .await
            .json();
        assert_eq!(notifications["pagination"]["total"], 1);
        assert_eq!(notifications["data"][0]["notificationType"], "payment_failed");
    }

    #[tokio::test]
    async fn test_unknown_event_ignored_and_bad_notes_acknowledged() {
        let app = spawn_app();

        let ignored = post_webhook(&app.server, &json!({ "event": "refund.created", "payload": {} })).await;
        assert_eq!(ignored["status"], "ignored");

        let orphan = GatewayPayment {
            id: "pay_orphan".to_string(),
            amount: 100,
            currency: "INR".to_string(),
            status: "captured".to_string(),
            order_id: None,
            method: None,
            error_description: None,
            notes: Default::default(),
        };
        let failed = post_webhook(&app.server, &payment_event("payment.captured", &orphan)).await;
        assert_eq!(failed["received"], true);
        assert_eq!(failed["status"], "failed");
    }
}

// =============================================================================
// UPI QR codes
// =============================================================================

mod qr_code_tests {
    use super::*;

    #[tokio::test]
    async fn test_qr_code_credit_settles_invoice() {
        let app = spawn_app();
        let family = seed_family(&app.server, "ADM-231").await;
        let invoice = create_invoice(&app.server, &family.student_id, "INV-231", 4200.0, "2030-01-01").await;
        let invoice_id = id_of(&invoice);

        let created = app
            .server
            .post("/api/payments/qr-code")
            .json(&json!({ "invoiceId": invoice_id }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: Value = created.json();
        let qr_id = created["qrCodeId"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "active");
        assert_eq!(created["amount"], 4200.0);
        assert_eq!(created["invoiceId"], invoice_id);
        assert!(created["imageUrl"].as_str().is_some());

        let payment = app.gateway.credit_qr_code(&qr_id).unwrap();
        let qr = app.gateway.fetch_qr_code(&qr_id).await.unwrap();
        let event = json!({
            "event": "qr_code.credited",
            "payload": {
                "payment": { "entity": payment },
                "qr_code": { "entity": qr },
            }
        });

        let ack = post_webhook(&app.server, &event).await;
        assert_eq!(ack["status"], "processed");
        let replay = post_webhook(&app.server, &event).await;
        assert_eq!(replay["status"], "duplicate");

        let detail = get_invoice(&app.server, &invoice_id).await;
        assert_eq!(detail["status"], "paid");
        assert_eq!(detail["payments"][0]["source"], "qr");

        let fetched: Value = app
            .server
            .get(&format!("/api/payments/qr-code/{}", qr_id))
            .await
            .json();
        assert_eq!(fetched["status"], "closed");
        assert_eq!(fetched["amountReceived"], 4200.0);
    }

    #[tokio::test]
    async fn test_unknown_qr_code_is_gateway_error() {
        let app = spawn_app();

        let response = app.server.get("/api/payments/qr-code/qr_missing").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["code"], "GATEWAY_ERROR");
    }
}
