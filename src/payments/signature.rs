//! HMAC-SHA256 signatures used by checkout callbacks and webhooks

use crate::core::error::PaymentError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Payload signed by the gateway after checkout
pub fn checkout_payload(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Hex-encoded HMAC-SHA256 of `payload`
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        PaymentError::Gateway {
            message: format!("invalid signing key: {}", e),
        }
    })?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. An empty secret never verifies.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> Result<(), PaymentError> {
    if secret.is_empty() {
        tracing::warn!("Signature check attempted without a configured secret");
        return Err(PaymentError::InvalidSignature);
    }
    let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

/// Verify the `razorpay_signature` returned to checkout
pub fn verify_checkout(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    verify(
        key_secret,
        checkout_payload(order_id, payment_id).as_bytes(),
        signature,
    )
}

/// Verify the `X-Razorpay-Signature` header over the raw webhook body
pub fn verify_webhook(webhook_secret: &str, body: &[u8], signature: &str) -> Result<(), PaymentError> {
    verify(webhook_secret, body, signature)
}
