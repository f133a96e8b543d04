mod common;

use common::{GatewayMode, TestApp, admin, create_menu, customer, setup};
use food_order_api::{
    dto::{
        cart::AddToCartRequest,
        payments::{InitializePaymentRequest, ReconcilePaymentRequest},
    },
    entity::{
        orders::Entity as Orders,
        payments::Entity as Payments,
        sea_orm_active_enums::{NotificationKind, OrderStatus, PaymentStatus},
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    services::{
        cart_service, order_service,
        payment_service::{self, ReconcileOutcome},
    },
};
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

/// Places a 25.00 order for a fresh customer and drains its confirmation.
async fn placed_order(app: &mut TestApp) -> anyhow::Result<(AuthUser, Uuid)> {
    let user = customer(&app.state, "ada@example.com").await?;
    let burger = create_menu(&app.state, "Burger", 1000).await?;
    let fries = create_menu(&app.state, "Fries", 500).await?;
    cart_service::add_to_cart(&app.state, &user, AddToCartRequest { menu_id: burger, quantity: 2 })
        .await?;
    cart_service::add_to_cart(&app.state, &user, AddToCartRequest { menu_id: fries, quantity: 1 })
        .await?;
    let order_id = order_service::place_order(&app.state, &user)
        .await?
        .data
        .expect("order")
        .order
        .id;
    app.sent();
    Ok((user, order_id))
}

fn callback(order_id: Uuid, transaction_id: &str, success: bool) -> ReconcilePaymentRequest {
    ReconcilePaymentRequest {
        order_id,
        amount: 2500,
        transaction_id: transaction_id.to_string(),
        success,
        failure_reason: (!success).then(|| "card declined".to_string()),
    }
}

async fn order_statuses(app: &TestApp, order_id: Uuid) -> anyhow::Result<(OrderStatus, PaymentStatus)> {
    let order = Orders::find_by_id(order_id)
        .one(&app.state.orm)
        .await?
        .expect("order");
    Ok((order.order_status, order.payment_status))
}

#[tokio::test]
async fn initialize_rejects_amount_mismatch_without_calling_gateway() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;

    let wrong = payment_service::initialize_payment(
        &app.state,
        &user,
        InitializePaymentRequest { order_id, amount: Some(2400) },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::BadRequest(_))));

    let missing = payment_service::initialize_payment(
        &app.state,
        &user,
        InitializePaymentRequest { order_id, amount: None },
    )
    .await;
    assert!(matches!(missing, Err(AppError::BadRequest(_))));

    assert!(app.gateway.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn initialize_returns_gateway_handle() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;

    let response = payment_service::initialize_payment(
        &app.state,
        &user,
        InitializePaymentRequest { order_id, amount: Some(2500) },
    )
    .await?;
    assert_eq!(response.message, "success");
    let handle = response.data.expect("handle");
    assert_eq!(handle.order_id, order_id);
    assert_eq!(handle.client_secret, "pi_test_secret_123");

    let calls = app.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount_minor, 2500);
    assert_eq!(calls[0].currency, "usd");
    assert_eq!(calls[0].metadata.get("orderId"), Some(&order_id.to_string()));
    Ok(())
}

#[tokio::test]
async fn initialize_is_limited_to_the_owner() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (_, order_id) = placed_order(&mut app).await?;
    let bob = customer(&app.state, "bob@example.com").await?;

    let result = payment_service::initialize_payment(
        &app.state,
        &bob,
        InitializePaymentRequest { order_id, amount: Some(2500) },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(app.gateway.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn gateway_failure_and_timeout_leave_order_pending() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;
    let request = || InitializePaymentRequest { order_id, amount: Some(2500) };

    app.gateway.set_mode(GatewayMode::Fail);
    let failed = payment_service::initialize_payment(&app.state, &user, request()).await;
    assert!(matches!(failed, Err(AppError::Integration(_))));

    app.gateway.set_mode(GatewayMode::Hang);
    let timed_out = payment_service::initialize_payment(&app.state, &user, request()).await;
    assert!(matches!(timed_out, Err(AppError::Integration(ref m)) if m.contains("timed out")));

    assert_eq!(
        order_statuses(&app, order_id).await?,
        (OrderStatus::Initialized, PaymentStatus::Pending)
    );

    // Still payable once the gateway recovers.
    app.gateway.set_mode(GatewayMode::Succeed);
    assert!(payment_service::initialize_payment(&app.state, &user, request()).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn successful_callback_confirms_order_once() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;

    let outcome = payment_service::reconcile_payment(&app.state, callback(order_id, "tx1", true)).await?;
    let ReconcileOutcome::Applied(payment) = outcome else {
        panic!("first delivery should be applied");
    };
    assert_eq!(payment.payment_status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id, "tx1");
    assert_eq!(
        order_statuses(&app, order_id).await?,
        (OrderStatus::Confirmed, PaymentStatus::Completed)
    );

    let order = Orders::find_by_id(order_id).one(&app.state.orm).await?.expect("order");
    assert_eq!(order.payment_id, Some(payment.id));

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::PaymentSuccess);
    assert!(sent[0].body.contains("tx1"));

    let replay = payment_service::reconcile_payment(&app.state, callback(order_id, "tx1", true)).await?;
    assert!(matches!(replay, ReconcileOutcome::Duplicate { ref transaction_id } if transaction_id == "tx1"));
    assert_eq!(Payments::find().count(&app.state.orm).await?, 1);
    assert!(app.sent().is_empty());

    // A different transaction against a settled order writes nothing.
    let late = payment_service::reconcile_payment(&app.state, callback(order_id, "tx2", true)).await;
    assert!(matches!(late, Err(AppError::BadRequest(_))));
    assert_eq!(Payments::find().count(&app.state.orm).await?, 1);

    let pay_again = payment_service::initialize_payment(
        &app.state,
        &user,
        InitializePaymentRequest { order_id, amount: Some(2500) },
    )
    .await;
    assert!(matches!(
        pay_again,
        Err(AppError::BadRequest(ref m)) if m == "Payment already made for this order"
    ));
    Ok(())
}

#[tokio::test]
async fn failed_callback_cancels_order() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;

    let outcome = payment_service::reconcile_payment(&app.state, callback(order_id, "tx-fail", false)).await?;
    let ReconcileOutcome::Applied(payment) = outcome else {
        panic!("first delivery should be applied");
    };
    assert_eq!(payment.payment_status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("card declined"));
    assert_eq!(
        order_statuses(&app, order_id).await?,
        (OrderStatus::Cancelled, PaymentStatus::Failed)
    );

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::PaymentFailure);
    assert!(sent[0].body.contains("card declined"));

    let retry = payment_service::initialize_payment(
        &app.state,
        &user,
        InitializePaymentRequest { order_id, amount: Some(2500) },
    )
    .await;
    assert!(matches!(retry, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn callback_validation() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (_, order_id) = placed_order(&mut app).await?;

    let unknown = payment_service::reconcile_payment(&app.state, callback(Uuid::new_v4(), "tx1", true)).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let blank = payment_service::reconcile_payment(&app.state, callback(order_id, "  ", true)).await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    assert_eq!(Payments::find().count(&app.state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn payments_are_readable_by_owner_and_listed_for_admin() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let (user, order_id) = placed_order(&mut app).await?;
    let bob = customer(&app.state, "bob@example.com").await?;
    let root = admin(&app.state).await?;

    let ReconcileOutcome::Applied(payment) =
        payment_service::reconcile_payment(&app.state, callback(order_id, "tx1", true)).await?
    else {
        panic!("first delivery should be applied");
    };

    assert!(payment_service::get_payment(&app.state, &user, payment.id).await.is_ok());
    assert!(payment_service::get_payment(&app.state, &root, payment.id).await.is_ok());
    assert!(matches!(
        payment_service::get_payment(&app.state, &bob, payment.id).await,
        Err(AppError::NotFound(_))
    ));

    assert!(matches!(
        payment_service::list_payments(&app.state, &user, Pagination::default()).await,
        Err(AppError::Forbidden)
    ));
    let listed = payment_service::list_payments(&app.state, &root, Pagination::default()).await?;
    assert_eq!(listed.data.expect("payments").items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn amount_from_confirmation_link_is_accepted_by_pay() -> anyhow::Result<()> {
    let mut app = setup().await?;
    let user = customer(&app.state, "ada@example.com").await?;
    let burger = create_menu(&app.state, "Burger", 1000).await?;
    cart_service::add_to_cart(&app.state, &user, AddToCartRequest { menu_id: burger, quantity: 2 })
        .await?;
    let order_id = order_service::place_order(&app.state, &user)
        .await?
        .data
        .expect("order")
        .order
        .id;

    let sent = app.sent();
    let body = &sent[0].body;
    let start = body.find("&amp;amount=").expect("amount in link") + "&amp;amount=".len();
    let raw_amount: String = body[start..].chars().take_while(|c| *c != '"').collect();
    assert_eq!(raw_amount, "2000");

    // The client posts the link's amount verbatim.
    let request: InitializePaymentRequest = serde_json::from_str(&format!(
        r#"{{"orderId":"{order_id}","amount":{raw_amount}}}"#
    ))?;
    let response = payment_service::initialize_payment(&app.state, &user, request).await?;
    assert_eq!(response.data.expect("handle").order_id, order_id);
    assert_eq!(app.gateway.calls()[0].amount_minor, 2000);
    Ok(())
}
