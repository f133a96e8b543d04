use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Payment;

/// Amounts are minor currency units.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    pub order_id: Uuid,
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandleResponse {
    pub order_id: Uuid,
    pub client_secret: String,
}

/// Outcome callback sent once the client-side charge settles.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePaymentRequest {
    pub order_id: Uuid,
    pub amount: i64,
    pub transaction_id: String,
    pub success: bool,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}
