//! External payment gateway contract.
//!
//! The workflow only needs one call from the gateway: mint an opaque handle
//! the client uses to complete the charge. Outcomes come back through the
//! reconciliation callback, not through this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

mod stripe;

pub use stripe::StripeGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentHandle {
    /// Token handed to the client to confirm the charge.
    pub client_secret: String,
    /// Gateway-side identifier of the pending charge.
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway response malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_handle(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentHandle, GatewayError>;
}
