//! Payment-gateway seam.
//!
//! The transport behind the trait is out of scope; the engine only depends on
//! the order-creation and status-fetch contract, plus the signature scheme:
//! HMAC-SHA256 over `order_id|payment_id` with a shared secret.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Authoritative status report for one payment.
#[derive(Debug, Clone)]
pub struct PaymentCapture {
    /// Gateway status string, e.g. `captured`, `authorized`, `failed`.
    pub status: String,
    pub method: Option<String>,
}

/// Statuses that settle a payment.
pub fn is_settled(status: &str) -> bool {
    matches!(status, "captured" | "authorized")
}

#[derive(Debug)]
pub enum GatewayError {
    /// True status unknown — safe to retry, never safe to assume paid.
    Timeout,
    Unavailable(String),
    Protocol(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Unavailable(_))
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Timeout => write!(f, "gateway timed out"),
            GatewayError::Unavailable(e) => write!(f, "gateway unavailable: {e}"),
            GatewayError::Protocol(e) => write!(f, "gateway protocol error: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order for `amount` in `currency`; returns the gateway order id.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String, GatewayError>;

    /// Fetch the authoritative status for a payment id.
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentCapture, GatewayError>;
}

/// Hex HMAC-SHA256 over `order_id|payment_id`. This is what the gateway sends
/// back alongside a payment; we recompute and compare.
pub fn signature_for(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

/// Constant-time check of a client-supplied signature.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, provided: &str) -> bool {
    let expected = signature_for(secret, order_id, payment_id);
    let provided = provided.trim().to_ascii_lowercase();
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
