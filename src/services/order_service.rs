use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithItems, UniqueCustomers, UpdateOrderStatusRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        menus::Entity as Menus,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        sea_orm_active_enums::{OrderStatus, PaymentStatus},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderItem, order_from_entity, order_item_from_entity},
    notification::templates::{self, ConfirmationLine, Customer, OrderConfirmation},
    pricing::{line_subtotal, sum_subtotals},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::cart_service::{clear_lines, lock_cart},
    state::AppState,
};

pub const ORDER_PLACED_MESSAGE: &str = "Your order has been received! We've sent a secure payment link to your email. Please proceed for payment to confirm your order.";

/// Turns the caller's cart into an order.
///
/// The order row, its item snapshot and the emptied cart commit together
/// under the cart row lock, so a second concurrent placement finds an empty
/// cart. The confirmation message is queued only after the commit.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let customer = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let delivery_address = customer
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("Delivery address not present for the user".into())
        })?
        .to_string();

    let txn = state.orm.begin().await?;

    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Menus)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    // The total is always derived from the snapshot, never taken from the client.
    let mut subtotals = Vec::with_capacity(lines.len());
    for (line, _) in &lines {
        subtotals.push(line_subtotal(line.quantity, line.price_per_unit)?);
    }
    let total_amount = sum_subtotals(subtotals.iter().copied())?;

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        order_status: Set(OrderStatus::Initialized),
        payment_status: Set(PaymentStatus::Pending),
        payment_id: Set(None),
        delivery_address: Set(delivery_address),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for ((line, menu), subtotal) in lines.into_iter().zip(subtotals) {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            menu_id: Set(line.menu_id),
            menu_name: Set(menu.map(|m| m.name).unwrap_or_default()),
            quantity: Set(line.quantity),
            price_per_unit: Set(line.price_per_unit),
            subtotal: Set(subtotal),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    clear_lines(&txn, cart.id).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total_amount = order.total_amount,
        items = items.len(),
        "order placed"
    );

    let confirmation = templates::order_confirmation(
        &Customer {
            name: &customer.name,
            email: &customer.email,
        },
        &OrderConfirmation {
            order_id: order.id,
            placed_at: now,
            total_amount: order.total_amount,
            delivery_address: &order.delivery_address,
            lines: items
                .iter()
                .map(|item| ConfirmationLine {
                    menu_name: &item.menu_name,
                    quantity: item.quantity,
                    subtotal: item.subtotal,
                })
                .collect(),
            payment_link_base: &state.config.links.payment_link_base,
        },
    );
    state.notifications.dispatch(confirmation);

    audit::record(
        &state.orm,
        user.user_id,
        "order_placed",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        ORDER_PLACED_MESSAGE,
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// `SELECT … FOR UPDATE` on one order row, taken before any status change.
pub(crate) fn order_lock_query(order_id: Uuid) -> Select<Orders> {
    Orders::find_by_id(order_id).lock(LockType::Update)
}

/// Loads an order visible to the caller: their own, or any order for an admin.
async fn find_visible_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|o| o.user_id == user.user_id || user.is_admin());
    order.ok_or_else(|| AppError::not_found("Order"))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_visible_order(state, user, id).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order retrieved successfully",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderItem>> {
    let item = OrderItems::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order item"))?;
    // Ownership follows the parent order.
    find_visible_order(state, user, item.order_id)
        .await
        .map_err(|_| AppError::not_found("Order item"))?;

    Ok(ApiResponse::success(
        "Order item retrieved successfully",
        order_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Orders for user retrieved successfully",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::OrderStatus.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Orders retrieved successfully",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Operator-driven fulfillment step, e.g. CONFIRMED → ON_THE_WAY.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<crate::models::Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let order = order_lock_query(payload.order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let current = order.order_status;
    if !current.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {current:?} to {:?}",
            payload.status
        )));
    }

    let mut active: OrderActive = order.into();
    active.order_status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = ?current, to = ?order.order_status, "order status updated");
    audit::record(
        &state.orm,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.order_status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated successfully",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn count_unique_customers(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UniqueCustomers>> {
    ensure_admin(user)?;
    let count = Orders::find()
        .select_only()
        .column(OrderCol::UserId)
        .distinct()
        .count(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Unique customer count retrieved successfully",
        UniqueCustomers { count },
        Some(Meta::empty()),
    ))
}
