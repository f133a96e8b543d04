use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        InitializePaymentRequest, PaymentHandleResponse, PaymentList, ReconcilePaymentRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Payment,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::payment_service::{self, ReconcileOutcome},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/pay", post(initialize_payment))
        .route("/update", put(reconcile_payment))
        .route("/{id}", get(get_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/pay",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Opaque payment handle for the client", body = ApiResponse<PaymentHandleResponse>),
        (status = 400, description = "Already paid, cancelled, or amount mismatch"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment gateway failed or timed out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initialize_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitializePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentHandleResponse>>> {
    let resp = payment_service::initialize_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/payments/update",
    request_body = ReconcilePaymentRequest,
    responses(
        (status = 200, description = "Outcome applied, or duplicate acknowledged", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Order already settled by another transaction"),
        (status = 403, description = "Caller is not the payment callback service"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn reconcile_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReconcilePaymentRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    // Outcomes come from the gateway callback relay, which holds an admin token.
    ensure_admin(&user)?;
    let message = match payment_service::reconcile_payment(&state, payload).await? {
        ReconcileOutcome::Applied(_) => "Payment recorded",
        ReconcileOutcome::Duplicate { .. } => "Payment already recorded",
    };
    Ok(Json(ApiResponse::success(
        message,
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment", body = ApiResponse<Payment>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::get_payment(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(Pagination),
    responses(
        (status = 200, description = "All payments, newest first (admin only)", body = ApiResponse<PaymentList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}
