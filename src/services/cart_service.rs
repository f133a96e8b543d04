use chrono::Utc;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::AddToCartRequest,
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        menus::{Entity as Menus, Model as MenuModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    pricing::{line_subtotal, sum_subtotals},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// `SELECT … FOR UPDATE` on the user's cart row.
pub(crate) fn cart_lock_query(user_id: Uuid) -> Select<Carts> {
    Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
}

/// Locks the caller's cart row for the rest of the transaction.
///
/// Every cart mutation goes through this lock first, so read-modify-write on
/// the cart's lines is serialized per user.
pub(crate) async fn lock_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<CartModel>> {
    Ok(cart_lock_query(user_id).one(conn).await?)
}

async fn lock_or_create_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    if let Some(cart) = lock_cart(conn, user_id).await? {
        return Ok(cart);
    }

    // A concurrent first add may win the insert; the unique user_id turns ours into a no-op.
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        promo_code: Set(None),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    lock_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart could not be created")))
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    menu_id: Uuid,
) -> AppResult<Option<CartItemModel>> {
    let line = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .filter(CartItemCol::MenuId.eq(menu_id))
        .one(conn)
        .await?;
    Ok(line)
}

async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    line: CartItemModel,
    quantity: i32,
) -> AppResult<CartItemModel> {
    let subtotal = line_subtotal(quantity, line.price_per_unit)?;
    let mut active: CartItemActive = line.into();
    active.quantity = Set(quantity);
    active.subtotal = Set(subtotal);
    Ok(active.update(conn).await?)
}

/// Deletes every line of a cart, leaving the cart row in place.
pub(crate) async fn clear_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

fn cart_item_view(line: CartItemModel, menu_name: String) -> CartItem {
    CartItem {
        id: line.id,
        menu_id: line.menu_id,
        menu_name,
        quantity: line.quantity,
        price_per_unit: line.price_per_unit,
        subtotal: line.subtotal,
    }
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let menu: MenuModel = Menus::find_by_id(payload.menu_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Menu item"))?;

    let txn = state.orm.begin().await?;
    let cart = lock_or_create_cart(&txn, user.user_id).await?;

    let line = match find_line(&txn, cart.id, menu.id).await? {
        Some(existing) => {
            let quantity = existing
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(|| AppError::BadRequest("quantity is too large".to_string()))?;
            set_quantity(&txn, existing, quantity).await?
        }
        None => {
            // Unit price is captured now and stays fixed for this line.
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                menu_id: Set(menu.id),
                quantity: Set(payload.quantity),
                price_per_unit: Set(menu.price),
                subtotal: Set(line_subtotal(payload.quantity, menu.price)?),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;

    tracing::debug!(user_id = %user.user_id, menu_id = %menu.id, quantity = line.quantity, "cart line updated");
    audit::record(
        &state.orm,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "menu_id": menu.id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Item successfully added to cart",
        cart_item_view(line, menu.name),
        Some(Meta::empty()),
    ))
}

pub async fn increment_item(
    state: &AppState,
    user: &AuthUser,
    menu_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    let line = find_line(&txn, cart.id, menu_id)
        .await?
        .ok_or_else(|| AppError::not_found("Menu item in cart"))?;

    let quantity = line
        .quantity
        .checked_add(1)
        .ok_or_else(|| AppError::BadRequest("quantity is too large".to_string()))?;
    set_quantity(&txn, line, quantity).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_increment",
        "cart_items",
        serde_json::json!({ "menu_id": menu_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::message("Item quantity incremented successfully"))
}

pub async fn decrement_item(
    state: &AppState,
    user: &AuthUser,
    menu_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    let line = find_line(&txn, cart.id, menu_id)
        .await?
        .ok_or_else(|| AppError::not_found("Menu item in cart"))?;

    let quantity = line.quantity - 1;
    if quantity > 0 {
        set_quantity(&txn, line, quantity).await?;
    } else {
        // A line never sits at zero; it leaves the cart.
        CartItems::delete_by_id(line.id).exec(&txn).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_decrement",
        "cart_items",
        serde_json::json!({ "menu_id": menu_id, "quantity": quantity.max(0) }),
    )
    .await;

    Ok(ApiResponse::message("Item decremented successfully"))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    cart_item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    // Scoped to the caller's cart: another user's line id is reported as absent.
    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(cart_item_id))
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart item"));
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": cart_item_id }),
    )
    .await;

    Ok(ApiResponse::message("Item removed from cart successfully"))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;

    let Some(cart) = cart else {
        return Ok(ApiResponse::success(
            "Shopping cart retrieved successfully",
            Cart {
                id: None,
                user_id: user.user_id,
                promo_code: None,
                items: Vec::new(),
                total_amount: 0,
            },
            Some(Meta::empty()),
        ));
    };

    let items: Vec<CartItem> = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Menus)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(line, menu)| cart_item_view(line, menu.map(|m| m.name).unwrap_or_default()))
        .collect();
    let total_amount = sum_subtotals(items.iter().map(|item| item.subtotal))?;

    Ok(ApiResponse::success(
        "Shopping cart retrieved successfully",
        Cart {
            id: Some(cart.id),
            user_id: cart.user_id,
            promo_code: cart.promo_code,
            items,
            total_amount,
        },
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let removed = match lock_cart(&txn, user.user_id).await? {
        Some(cart) => clear_lines(&txn, cart.id).await?,
        None => 0,
    };
    txn.commit().await?;

    if removed > 0 {
        audit::record(
            &state.orm,
            user.user_id,
            "cart_clear",
            "carts",
            serde_json::json!({ "removed": removed }),
        )
        .await;
    }

    Ok(ApiResponse::message("Shopping cart cleared successfully"))
}
