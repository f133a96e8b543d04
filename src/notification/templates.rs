//! HTML bodies for customer notifications.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Notification;
use crate::{entity::sea_orm_active_enums::NotificationKind, pricing::format_amount};

pub struct Customer<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

pub struct ConfirmationLine<'a> {
    pub menu_name: &'a str,
    pub quantity: i32,
    pub subtotal: i64,
}

pub struct OrderConfirmation<'a> {
    pub order_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub total_amount: i64,
    pub delivery_address: &'a str,
    pub lines: Vec<ConfirmationLine<'a>>,
    pub payment_link_base: &'a str,
}

/// `base + order_id + "&amount=" + total`, the link the client follows to pay.
///
/// The amount is in minor units, exactly what `POST /payments/pay` expects back.
pub fn payment_link(base: &str, order_id: Uuid, total_amount: i64) -> String {
    format!("{base}{order_id}&amount={total_amount}")
}

pub fn order_confirmation(customer: &Customer<'_>, order: &OrderConfirmation<'_>) -> Notification {
    let items: String = order
        .lines
        .iter()
        .map(|line| {
            format!(
                "<div class=\"order-item\"><p>{} x {}</p><p>$ {}</p></div>",
                escape(line.menu_name),
                line.quantity,
                format_amount(line.subtotal)
            )
        })
        .collect();
    let link = payment_link(order.payment_link_base, order.order_id, order.total_amount);

    let body = format!(
        "<html><body>\
         <h2>Thank you for your order, {name}!</h2>\
         <p>Order #{id} placed on {date}</p>\
         {items}\
         <p>Items: {count}</p>\
         <p><strong>Total: $ {total}</strong></p>\
         <p>Delivering to: {address}</p>\
         <p><a href=\"{link}\">Pay now</a> to confirm your order.</p>\
         </body></html>",
        name = escape(customer.name),
        id = order.order_id,
        date = order.placed_at.format("%b %d, %Y %I:%M %p"),
        count = order.lines.len(),
        total = format_amount(order.total_amount),
        address = escape(order.delivery_address),
        link = escape(&link),
    );

    Notification {
        recipient: customer.email.to_string(),
        subject: format!("Your Order Confirmation - Order #{}", order.order_id),
        body,
        is_html: true,
        kind: NotificationKind::OrderConfirmation,
    }
}

pub fn payment_success(
    customer: &Customer<'_>,
    order_id: Uuid,
    amount: i64,
    transaction_id: &str,
    paid_at: DateTime<Utc>,
    frontend_base_url: &str,
) -> Notification {
    let body = format!(
        "<html><body>\
         <h2>Payment received, {name}</h2>\
         <p>Order #{order_id} is confirmed.</p>\
         <p>Amount: ${amount}</p>\
         <p>Transaction: {tx}</p>\
         <p>Paid on {date}</p>\
         <p><a href=\"{url}\">Track your order</a></p>\
         <p>&copy; {year}</p>\
         </body></html>",
        name = escape(customer.name),
        amount = format_amount(amount),
        tx = escape(transaction_id),
        date = paid_at.format("%b %d, %Y %I:%M %p"),
        url = escape(frontend_base_url),
        year = paid_at.format("%Y"),
    );

    Notification {
        recipient: customer.email.to_string(),
        subject: format!("Payment Successful - Order #{order_id}"),
        body,
        is_html: true,
        kind: NotificationKind::PaymentSuccess,
    }
}

pub fn payment_failure(
    customer: &Customer<'_>,
    order_id: Uuid,
    amount: i64,
    failure_reason: Option<&str>,
) -> Notification {
    let body = format!(
        "<html><body>\
         <h2>Payment failed, {name}</h2>\
         <p>We could not process the payment of ${amount} for order #{order_id}.</p>\
         <p>Reason: {reason}</p>\
         <p>The order has been cancelled.</p>\
         </body></html>",
        name = escape(customer.name),
        amount = format_amount(amount),
        reason = escape(failure_reason.unwrap_or("unspecified")),
    );

    Notification {
        recipient: customer.email.to_string(),
        subject: format!("Payment Failed - Order #{order_id}"),
        body,
        is_html: true,
        kind: NotificationKind::PaymentFailure,
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
