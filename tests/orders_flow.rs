mod common;

use common::{PAYMENT_LINK_BASE, admin, create_menu, create_user, customer, setup};
use food_order_api::{
    dto::{cart::AddToCartRequest, orders::UpdateOrderStatusRequest},
    entity::{
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        order_items::Entity as OrderItems,
        orders::Entity as Orders,
        sea_orm_active_enums::{NotificationKind, OrderStatus, PaymentStatus},
    },
    error::AppError,
    routes::params::{OrderListQuery, Pagination},
    services::{cart_service, order_service},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

async fn fill_cart(
    state: &food_order_api::state::AppState,
    user: &food_order_api::middleware::auth::AuthUser,
) -> anyhow::Result<()> {
    let burger = create_menu(state, "Burger", 1000).await?;
    let fries = create_menu(state, "Fries", 500).await?;
    cart_service::add_to_cart(state, user, AddToCartRequest { menu_id: burger, quantity: 2 }).await?;
    cart_service::add_to_cart(state, user, AddToCartRequest { menu_id: fries, quantity: 1 }).await?;
    Ok(())
}

#[tokio::test]
async fn placing_an_order_snapshots_the_cart() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let user = customer(&app.state, "ada@example.com").await?;
    fill_cart(&app.state, &user).await?;

    let placed = order_service::place_order(&app.state, &user).await?;
    assert_eq!(placed.message, order_service::ORDER_PLACED_MESSAGE);
    let placed = placed.data.expect("order");

    assert_eq!(placed.order.total_amount, 2500);
    assert_eq!(placed.order.order_status, OrderStatus::Initialized);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert_eq!(placed.order.delivery_address, "1 Marina Road, Lagos");
    assert_eq!(placed.items.len(), 2);
    let item_sum: i64 = placed.items.iter().map(|i| i.subtotal).sum();
    assert_eq!(item_sum, placed.order.total_amount);
    assert!(placed.items.iter().any(|i| i.menu_name == "Burger" && i.quantity == 2));

    let cart = cart_service::get_cart(&app.state, &user).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::OrderConfirmation);
    assert_eq!(sent[0].recipient, "ada@example.com");
    assert!(sent[0].body.contains(&format!(
        "{PAYMENT_LINK_BASE}{}&amp;amount=2500",
        placed.order.id
    )));

    let audited = AuditLogs::find()
        .filter(AuditCol::Action.eq("order_placed"))
        .count(&app.state.orm)
        .await?;
    assert_eq!(audited, 1);
    Ok(())
}

#[tokio::test]
async fn empty_or_missing_cart_creates_no_order() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let user = customer(&app.state, "ada@example.com").await?;

    let no_cart = order_service::place_order(&app.state, &user).await;
    assert!(matches!(no_cart, Err(AppError::NotFound(_))));

    fill_cart(&app.state, &user).await?;
    cart_service::clear_cart(&app.state, &user).await?;

    let empty = order_service::place_order(&app.state, &user).await;
    assert!(matches!(empty, Err(AppError::BadRequest(ref m)) if m == "Cart is empty"));

    assert_eq!(Orders::find().count(&app.state.orm).await?, 0);
    assert!(app.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_address_is_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_user(&app.state, "nomad@example.com", None, "user").await?;
    fill_cart(&app.state, &user).await?;

    let result = order_service::place_order(&app.state, &user).await;
    assert!(matches!(
        result,
        Err(AppError::BadRequest(ref m)) if m == "Delivery address not present for the user"
    ));

    let blank = create_user(&app.state, "blank@example.com", Some("   "), "user").await?;
    let result = order_service::place_order(&app.state, &blank).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // The cart is left untouched.
    let cart = cart_service::get_cart(&app.state, &user).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_placements_produce_one_order() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = customer(&app.state, "ada@example.com").await?;
    fill_cart(&app.state, &user).await?;

    let (first, second) = tokio::join!(
        order_service::place_order(&app.state, &user),
        order_service::place_order(&app.state, &user),
    );
    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = if first.is_err() { first } else { second };
    assert!(matches!(failure, Err(AppError::BadRequest(_))));

    assert_eq!(Orders::find().count(&app.state.orm).await?, 1);
    assert_eq!(OrderItems::find().count(&app.state.orm).await?, 2);
    Ok(())
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() -> anyhow::Result<()> {
    let app = setup().await?;
    let ada = customer(&app.state, "ada@example.com").await?;
    let bob = customer(&app.state, "bob@example.com").await?;
    let root = admin(&app.state).await?;
    fill_cart(&app.state, &ada).await?;

    let placed = order_service::place_order(&app.state, &ada).await?.data.expect("order");
    let order_id = placed.order.id;

    let own = order_service::get_order(&app.state, &ada, order_id).await?.data.expect("order");
    assert_eq!(own.items.len(), 2);
    assert!(order_service::get_order(&app.state, &root, order_id).await.is_ok());
    assert!(matches!(
        order_service::get_order(&app.state, &bob, order_id).await,
        Err(AppError::NotFound(_))
    ));

    let item_id = placed.items[0].id;
    assert!(order_service::get_order_item(&app.state, &ada, item_id).await.is_ok());
    assert!(matches!(
        order_service::get_order_item(&app.state, &bob, item_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        order_service::get_order(&app.state, &ada, Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));

    let mine = order_service::list_my_orders(&app.state, &ada, Pagination::default()).await?;
    assert_eq!(mine.data.expect("orders").items.len(), 1);
    let theirs = order_service::list_my_orders(&app.state, &bob, Pagination::default()).await?;
    assert!(theirs.data.expect("orders").items.is_empty());
    Ok(())
}

#[tokio::test]
async fn admin_listing_filters_by_status() -> anyhow::Result<()> {
    let app = setup().await?;
    let ada = customer(&app.state, "ada@example.com").await?;
    let root = admin(&app.state).await?;
    fill_cart(&app.state, &ada).await?;
    order_service::place_order(&app.state, &ada).await?;

    let forbidden = order_service::list_orders(&app.state, &ada, OrderListQuery::default()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let all = order_service::list_orders(&app.state, &root, OrderListQuery::default()).await?;
    assert_eq!(all.meta.and_then(|m| m.total), Some(1));

    let confirmed = order_service::list_orders(
        &app.state,
        &root,
        OrderListQuery {
            status: Some(OrderStatus::Confirmed),
            ..Default::default()
        },
    )
    .await?;
    assert!(confirmed.data.expect("orders").items.is_empty());

    let unique = order_service::count_unique_customers(&app.state, &root).await?;
    assert_eq!(unique.data.expect("count").count, 1);
    Ok(())
}

#[tokio::test]
async fn status_updates_follow_the_lifecycle() -> anyhow::Result<()> {
    let app = setup().await?;
    let ada = customer(&app.state, "ada@example.com").await?;
    let root = admin(&app.state).await?;
    fill_cart(&app.state, &ada).await?;
    let order_id = order_service::place_order(&app.state, &ada)
        .await?
        .data
        .expect("order")
        .order
        .id;

    let update = |status| UpdateOrderStatusRequest { order_id, status };

    assert!(matches!(
        order_service::update_order_status(&app.state, &ada, update(OrderStatus::Cancelled)).await,
        Err(AppError::Forbidden)
    ));
    // Delivery before payment is not a valid step.
    assert!(matches!(
        order_service::update_order_status(&app.state, &root, update(OrderStatus::OnTheWay)).await,
        Err(AppError::BadRequest(_))
    ));

    let cancelled =
        order_service::update_order_status(&app.state, &root, update(OrderStatus::Cancelled))
            .await?
            .data
            .expect("order");
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);

    assert!(matches!(
        order_service::update_order_status(&app.state, &root, update(OrderStatus::Delivered)).await,
        Err(AppError::BadRequest(_))
    ));
    Ok(())
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() -> anyhow::Result<()> {
    let app = setup().await?;
    let ada = customer(&app.state, "ada@example.com").await?;
    fill_cart(&app.state, &ada).await?;
    order_service::place_order(&app.state, &ada).await?;

    let far = Pagination {
        page: Some(i64::MAX),
        per_page: Some(100),
    };
    let mine = order_service::list_my_orders(&app.state, &ada, far).await?;
    assert!(mine.data.expect("orders").items.is_empty());
    assert_eq!(mine.meta.and_then(|m| m.total), Some(1));
    Ok(())
}
