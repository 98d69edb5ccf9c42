//! Razorpay REST client

use super::gateway::{
    GatewayOrder, GatewayPayment, GatewayQrCode, OrderRequest, PaymentGateway, QrCodeRequest,
};
use crate::config::PaymentsConfig;
use crate::core::error::PaymentError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Gateway backed by the Razorpay API with basic auth `key_id:key_secret`
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

fn gateway_error(message: impl Into<String>) -> anyhow::Error {
    PaymentError::Gateway {
        message: message.into(),
    }
    .into()
}

impl RazorpayGateway {
    pub fn new(config: &PaymentsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| gateway_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| gateway_error(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = %status, what, "Gateway returned an error");
            return Err(gateway_error(format!("{} failed ({}): {}", what, status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| gateway_error(format!("Failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder> {
        let order: GatewayOrder = self
            .send(
                self.client.post(self.url("/v1/orders")).json(&request),
                "create order",
            )
            .await?;
        tracing::info!(order_id = %order.id, amount = order.amount, "Created gateway order");
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder> {
        self.send(
            self.client.get(self.url(&format!("/v1/orders/{}", order_id))),
            "fetch order",
        )
        .await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        self.send(
            self.client.get(self.url(&format!("/v1/payments/{}", payment_id))),
            "fetch payment",
        )
        .await
    }

    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<GatewayQrCode> {
        let qr: GatewayQrCode = self
            .send(
                self.client
                    .post(self.url("/v1/payments/qr_codes"))
                    .json(&request),
                "create QR code",
            )
            .await?;
        tracing::info!(qr_code_id = %qr.id, "Created gateway QR code");
        Ok(qr)
    }

    async fn fetch_qr_code(&self, qr_code_id: &str) -> Result<GatewayQrCode> {
        self.send(
            self.client
                .get(self.url(&format!("/v1/payments/qr_codes/{}", qr_code_id))),
            "fetch QR code",
        )
        .await
    }
}
