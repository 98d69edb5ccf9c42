//! Shared helpers for the HTTP integration tests.
//!
//! Every test gets a fresh in-memory server wired to an `InMemoryGateway`
//! whose handle is kept so tests can simulate checkout and QR payments.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use campus::config::AppConfig;
use campus::payments::InMemoryGateway;
use campus::payments::signature::{checkout_payload, sign};
use campus::server::ServerBuilder;
use campus::storage::Storage;
use serde_json::{Value, json};

pub const KEY_ID: &str = "rzp_test_campus";
pub const KEY_SECRET: &str = "checkout-secret";
pub const WEBHOOK_SECRET: &str = "webhook-secret";

pub struct TestApp {
    pub server: TestServer,
    pub gateway: InMemoryGateway,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.payments.key_id = KEY_ID.to_string();
    config.payments.key_secret = KEY_SECRET.to_string();
    config.payments.webhook_secret = WEBHOOK_SECRET.to_string();
    config.school.name = "Green Valley School".to_string();
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: AppConfig) -> TestApp {
    let gateway = InMemoryGateway::new(KEY_ID);
    let app = ServerBuilder::new()
        .with_config(config)
        .with_storage(Storage::in_memory())
        .with_gateway(gateway.clone())
        .build()
        .expect("Failed to build app");

    TestApp {
        server: TestServer::new(app),
        gateway,
    }
}

/// Checkout signature as the client SDK would compute it
pub fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    sign(KEY_SECRET, checkout_payload(order_id, payment_id).as_bytes()).unwrap()
}

pub fn webhook_signature(body: &[u8]) -> String {
    sign(WEBHOOK_SECRET, body).unwrap()
}

pub fn signature_header(signature: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-razorpay-signature"),
        HeaderValue::from_str(signature).unwrap(),
    )
}

pub fn id_of(body: &Value) -> String {
    body["id"].as_str().expect("response has an id").to_string()
}

pub async fn create_class(server: &TestServer, name: &str) -> String {
    let response = server
        .post("/api/classes")
        .json(&json!({ "name": name, "grade": 5 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    id_of(&response.json())
}

pub async fn create_parent(server: &TestServer, name: &str, phone: &str) -> String {
    let response = server
        .post("/api/parents")
        .json(&json!({ "name": name, "phone": phone, "relation": "mother" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    id_of(&response.json())
}

/// A class, a parent with a phone and a student linked to both
pub struct Family {
    pub class_id: String,
    pub parent_id: String,
    pub student_id: String,
}

pub async fn seed_family(server: &TestServer, admission_number: &str) -> Family {
    let class_id = create_class(server, &format!("Class {}", admission_number)).await;
    let parent_id = create_parent(server, "Meera Sharma", "+919876543210").await;

    let response = server
        .post("/api/students")
        .json(&json!({
            "name": "Aarav Sharma",
            "admissionNumber": admission_number,
            "classId": class_id,
            "parentId": parent_id,
            "biometricId": format!("BIO-{}", admission_number),
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    Family {
        class_id,
        parent_id,
        student_id: id_of(&response.json()),
    }
}

pub async fn create_invoice(
    server: &TestServer,
    student_id: &str,
    number: &str,
    total: f64,
    due_date: &str,
) -> Value {
    let response = server
        .post("/api/fees/invoices")
        .json(&json!({
            "studentId": student_id,
            "invoiceNumber": number,
            "description": "Term fees",
            "totalAmount": total,
            "dueDate": due_date,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

pub async fn get_invoice(server: &TestServer, invoice_id: &str) -> Value {
    let response = server
        .get(&format!("/api/fees/invoices/{}", invoice_id))
        .await;
    response.assert_status_ok();
    response.json()
}

/// Create an order, capture it at the gateway and verify it at checkout
pub async fn pay_through_checkout(app: &TestApp, invoice_id: &str, payment_type: &str) -> Value {
    let order = app
        .server
        .post("/api/payments/create-order")
        .json(&json!({ "invoiceId": invoice_id, "paymentType": payment_type }))
        .await;
    order.assert_status_ok();
    let order: Value = order.json();
    let order_id = order["orderId"].as_str().unwrap();

    let payment = app.gateway.capture_payment(order_id).unwrap();
    let response = app
        .server
        .post("/api/payments/verify")
        .json(&json!({
            "orderId": order_id,
            "paymentId": payment.id,
            "signature": checkout_signature(order_id, &payment.id),
        }))
        .await;
    response.assert_status_ok();
    response.json()
}
