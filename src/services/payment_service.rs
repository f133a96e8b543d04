use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{
        InitializePaymentRequest, PaymentHandleResponse, PaymentList, ReconcilePaymentRequest,
    },
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        sea_orm_active_enums::{OrderStatus, PaymentGateway, PaymentStatus},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Payment, payment_from_entity},
    notification::templates::{self, Customer},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::order_service::order_lock_query,
    state::AppState,
};

/// Result of applying a gateway callback.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// First delivery: payment recorded, order moved, customer notified.
    Applied(Payment),
    /// The transaction id was already recorded; nothing was written or sent.
    Duplicate { transaction_id: String },
}

/// Asks the gateway for a payment handle for an unpaid order.
///
/// The claimed amount must equal the stored order total exactly. The gateway
/// call is bounded by the configured timeout; any failure leaves the order
/// PENDING so the client can try again.
pub async fn initialize_payment(
    state: &AppState,
    user: &AuthUser,
    payload: InitializePaymentRequest,
) -> AppResult<ApiResponse<PaymentHandleResponse>> {
    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .filter(|o| o.user_id == user.user_id || user.is_admin())
        .ok_or_else(|| AppError::not_found("Order"))?;

    match order.payment_status {
        PaymentStatus::Completed => {
            return Err(AppError::BadRequest(
                "Payment already made for this order".into(),
            ));
        }
        PaymentStatus::Failed => {
            return Err(AppError::BadRequest(
                "Order was cancelled after a failed payment".into(),
            ));
        }
        PaymentStatus::Pending => {}
    }

    let claimed = payload
        .amount
        .ok_or_else(|| AppError::BadRequest("Payment amount is required".into()))?;
    if claimed != order.total_amount {
        tracing::warn!(
            order_id = %order.id,
            claimed,
            total_amount = order.total_amount,
            "payment amount mismatch"
        );
        return Err(AppError::BadRequest(
            "Payment amount does not tally with the order total".into(),
        ));
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("orderId".to_string(), order.id.to_string());

    let payment = &state.config.payment;
    let handle = tokio::time::timeout(
        payment.gateway_timeout,
        state
            .gateway
            .create_payment_handle(order.total_amount, &payment.currency, metadata),
    )
    .await
    .map_err(|_| {
        tracing::error!(order_id = %order.id, "payment gateway timed out");
        AppError::Integration(format!(
            "timed out after {}ms",
            payment.gateway_timeout.as_millis()
        ))
    })?
    .map_err(|err| {
        tracing::error!(order_id = %order.id, error = %err, "payment gateway failed");
        AppError::Integration(err.to_string())
    })?;

    tracing::info!(order_id = %order.id, reference = %handle.reference, "payment handle created");
    audit::record(
        &state.orm,
        user.user_id,
        "payment_initialized",
        "payments",
        serde_json::json!({ "order_id": order.id, "reference": handle.reference }),
    )
    .await;

    Ok(ApiResponse::success(
        "success",
        PaymentHandleResponse {
            order_id: order.id,
            client_secret: handle.client_secret,
        },
        Some(Meta::empty()),
    ))
}

/// Applies an asynchronous payment outcome to its order.
///
/// Deliveries are at-least-once. The order row is locked and the transaction
/// id checked before anything is written, so a repeated callback returns
/// [`ReconcileOutcome::Duplicate`] without a second payment row or message.
pub async fn reconcile_payment(
    state: &AppState,
    payload: ReconcilePaymentRequest,
) -> AppResult<ReconcileOutcome> {
    let transaction_id = payload.transaction_id.trim().to_string();
    if transaction_id.is_empty() {
        return Err(AppError::BadRequest("transactionId is required".into()));
    }

    let txn = state.orm.begin().await?;
    let order = order_lock_query(payload.order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let already_recorded = Payments::find()
        .filter(PaymentCol::TransactionId.eq(transaction_id.as_str()))
        .one(&txn)
        .await?;
    if already_recorded.is_some() {
        tracing::info!(order_id = %order.id, transaction_id = %transaction_id, "duplicate payment callback ignored");
        return Ok(ReconcileOutcome::Duplicate { transaction_id });
    }

    if order.payment_status != PaymentStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Order payment already settled as {:?}",
            order.payment_status
        )));
    }

    if payload.amount != order.total_amount {
        tracing::warn!(
            order_id = %order.id,
            amount = payload.amount,
            total_amount = order.total_amount,
            "captured amount differs from order total"
        );
    }

    let (payment_status, order_status) = if payload.success {
        (PaymentStatus::Completed, OrderStatus::Confirmed)
    } else {
        (PaymentStatus::Failed, OrderStatus::Cancelled)
    };
    let failure_reason = if payload.success {
        None
    } else {
        payload.failure_reason.clone()
    };

    let now = Utc::now();
    let inserted = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        amount: Set(payload.amount),
        gateway: Set(PaymentGateway::Stripe),
        transaction_id: Set(transaction_id.clone()),
        payment_status: Set(payment_status),
        failure_reason: Set(failure_reason),
        paid_at: Set(now.into()),
    }
    .insert(&txn)
    .await;
    let payment = match inserted {
        Ok(payment) => payment,
        // Same transaction id recorded against another order in the meantime.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            tracing::info!(transaction_id = %transaction_id, "duplicate payment callback ignored");
            return Ok(ReconcileOutcome::Duplicate { transaction_id });
        }
        Err(err) => return Err(err.into()),
    };

    let mut active: OrderActive = order.into();
    active.payment_status = Set(payment_status);
    active.order_status = Set(order_status);
    active.payment_id = Set(Some(payment.id));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        transaction_id = %payment.transaction_id,
        payment_status = ?payment.payment_status,
        "payment reconciled"
    );

    notify_outcome(state, &payment, now).await;

    audit::record(
        &state.orm,
        order.user_id,
        "payment_reconciled",
        "payments",
        serde_json::json!({
            "order_id": order.id,
            "payment_id": payment.id,
            "status": payment.payment_status,
        }),
    )
    .await;

    Ok(ReconcileOutcome::Applied(payment_from_entity(payment)))
}

// Runs after commit; a missing customer only costs the message.
async fn notify_outcome(
    state: &AppState,
    payment: &crate::entity::payments::Model,
    paid_at: chrono::DateTime<Utc>,
) {
    let customer = match Users::find_by_id(payment.user_id).one(&state.orm).await {
        Ok(Some(customer)) => customer,
        Ok(None) => {
            tracing::warn!(user_id = %payment.user_id, "payment notification skipped: customer missing");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "payment notification skipped: customer lookup failed");
            return;
        }
    };
    let recipient = Customer {
        name: &customer.name,
        email: &customer.email,
    };

    let notification = match payment.payment_status {
        PaymentStatus::Completed => templates::payment_success(
            &recipient,
            payment.order_id,
            payment.amount,
            &payment.transaction_id,
            paid_at,
            &state.config.links.frontend_base_url,
        ),
        _ => templates::payment_failure(
            &recipient,
            payment.order_id,
            payment.amount,
            payment.failure_reason.as_deref(),
        ),
    };
    state.notifications.dispatch(notification);
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| p.user_id == user.user_id || user.is_admin())
        .ok_or_else(|| AppError::not_found("Payment"))?;

    Ok(ApiResponse::success(
        "Payment retrieved successfully",
        payment_from_entity(payment),
        Some(Meta::empty()),
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Payments::find().order_by_desc(PaymentCol::PaidAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Payments retrieved successfully",
        PaymentList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
