use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    order_items::Model as OrderItemModel,
    orders::Model as OrderModel,
    payments::Model as PaymentModel,
    sea_orm_active_enums::{OrderStatus, PaymentGateway, PaymentStatus},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub menu_name: String,
    pub quantity: i32,
    pub price_per_unit: i64,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub promo_code: Option<String>,
    pub items: Vec<CartItem>,
    pub total_amount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<Uuid>,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_id: Uuid,
    pub menu_name: String,
    pub quantity: i32,
    pub price_per_unit: i64,
    pub subtotal: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub gateway: PaymentGateway,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub paid_at: DateTime<Utc>,
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        order_status: model.order_status,
        payment_status: model.payment_status,
        payment_id: model.payment_id,
        delivery_address: model.delivery_address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        menu_id: model.menu_id,
        menu_name: model.menu_name,
        quantity: model.quantity,
        price_per_unit: model.price_per_unit,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        user_id: model.user_id,
        amount: model.amount,
        gateway: model.gateway,
        transaction_id: model.transaction_id,
        payment_status: model.payment_status,
        failure_reason: model.failure_reason,
        paid_at: model.paid_at.with_timezone(&Utc),
    }
}
