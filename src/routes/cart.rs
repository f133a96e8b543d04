use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::AddToCartRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/increment/{menu_id}", put(increment_item))
        .route("/items/decrement/{menu_id}", put(decrement_item))
        .route("/items/{cart_item_id}", delete(remove_item))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart with computed total", body = ApiResponse<Cart>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or merged into an existing line", body = ApiResponse<CartItem>),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Menu item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/items/increment/{menu_id}",
    params(("menu_id" = Uuid, Path, description = "Menu ID")),
    responses(
        (status = 200, description = "Quantity incremented", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart or line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn increment_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(menu_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::increment_item(&state, &user, menu_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/items/decrement/{menu_id}",
    params(("menu_id" = Uuid, Path, description = "Menu ID")),
    responses(
        (status = 200, description = "Quantity decremented; a line reaching zero is removed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart or line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn decrement_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(menu_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::decrement_item(&state, &user, menu_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{cart_item_id}",
    params(("cart_item_id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Line not in the caller's cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cart_item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_item(&state, &user, cart_item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied (idempotent)", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}
