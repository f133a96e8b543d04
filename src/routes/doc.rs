use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::AddToCartRequest,
        orders::{OrderList, OrderWithItems, UniqueCustomers, UpdateOrderStatusRequest},
        payments::{
            InitializePaymentRequest, PaymentHandleResponse, PaymentList, ReconcilePaymentRequest,
        },
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentGateway, PaymentStatus},
    models::{Cart, CartItem, Order, OrderItem, Payment},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        cart::get_cart,
        cart::add_to_cart,
        cart::increment_item,
        cart::decrement_item,
        cart::remove_item,
        cart::clear_cart,
        orders::place_order,
        orders::get_order,
        orders::get_order_item,
        orders::list_my_orders,
        orders::list_orders,
        orders::update_order_status,
        orders::count_unique_customers,
        payments::initialize_payment,
        payments::reconcile_payment,
        payments::get_payment,
        payments::list_payments
    ),
    components(
        schemas(
            Cart,
            CartItem,
            Order,
            OrderItem,
            Payment,
            OrderStatus,
            PaymentStatus,
            PaymentGateway,
            AddToCartRequest,
            UpdateOrderStatusRequest,
            InitializePaymentRequest,
            ReconcilePaymentRequest,
            PaymentHandleResponse,
            PaymentList,
            OrderList,
            OrderWithItems,
            UniqueCustomers,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentHandleResponse>,
            ApiResponse<PaymentList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Orders", description = "Order placement and lookup"),
        (name = "Payments", description = "Payment initialization and reconciliation"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
