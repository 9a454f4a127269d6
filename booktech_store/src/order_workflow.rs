use booktech_common::clock::now_millis;

use crate::api::{
    Caller, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Role, StatusChange,
    TransactionKind, UserId,
};
use crate::context::StoreContext;
use crate::service_error::ServiceError;
use crate::store_repository::OrderFilter;

/// Statuses a delivery boy works with
const DELIVERY_STATUSES: &[OrderStatus] = &[OrderStatus::Processing, OrderStatus::Shipped];

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
    )
}

/// Whether the caller's role is the one that moves the order into `to`
pub fn may_move_to(caller: &Caller, order: &Order, to: OrderStatus) -> bool {
    if caller.is_admin() {
        return true;
    }
    match to {
        OrderStatus::Confirmed | OrderStatus::Processing => {
            caller.role == Role::Author && order.involves_author(caller.user_id)
        }
        OrderStatus::Shipped | OrderStatus::Delivered => caller.role == Role::DeliveryBoy,
        OrderStatus::Cancelled => caller.user_id == order.user_id,
        OrderStatus::Pending => false,
    }
}

pub fn can_view(caller: &Caller, order: &Order) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::DeliveryBoy => {
            caller.user_id == order.user_id
                || DELIVERY_STATUSES.contains(&order.status)
                || order.status == OrderStatus::Delivered
        }
        Role::Author => caller.user_id == order.user_id || order.involves_author(caller.user_id),
        Role::Customer => caller.user_id == order.user_id,
    }
}

/// Orders listed on the role's order management page
pub fn listing_filter(caller: &Caller) -> OrderFilter {
    match caller.role {
        Role::Admin => OrderFilter::All,
        Role::Author => OrderFilter::Author(caller.user_id),
        Role::DeliveryBoy => OrderFilter::Statuses(DELIVERY_STATUSES.to_vec()),
        Role::Customer => OrderFilter::Customer(caller.user_id),
    }
}

pub(crate) fn record_status(order: &mut Order, status: OrderStatus, changed_by: Caller) {
    let now = now_millis();
    order.status = status;
    order.updated_at = now;
    order.history.push(StatusChange {
        status,
        changed_by: changed_by.user_id,
        changed_at: now,
    });
}

/// Royalty of each line, per author
fn royalties(order: &Order, royalty_percent: u32) -> Vec<(UserId, i64)> {
    order
        .items
        .iter()
        .map(|item| {
            (
                item.author_id,
                i64::try_from(item.line_total() as i128 * royalty_percent as i128 / 100)
                    .unwrap_or(i64::MAX),
            )
        })
        .filter(|(_, amount)| *amount > 0)
        .collect()
}

pub async fn change_status(
    context: &StoreContext,
    caller: Caller,
    order_id: OrderId,
    to: OrderStatus,
) -> Result<Order, ServiceError> {
    let repository = &context.repository;
    let mut order = repository.get_order(order_id).await?;
    if !may_move_to(&caller, &order, to) {
        return Err(ServiceError::Forbidden(format!(
            "{} cannot mark orders {}",
            caller.role.as_str(),
            to.as_str()
        )));
    }
    let from = order.status;
    if !can_transition(from, to) {
        return Err(ServiceError::Conflict(format!(
            "Order {} cannot go from {} to {}",
            order_id,
            from.as_str(),
            to.as_str()
        )));
    }

    record_status(&mut order, to, caller);
    let refund = to == OrderStatus::Cancelled
        && order.payment.status == PaymentStatus::Paid
        && matches!(
            order.payment.method,
            PaymentMethod::Card | PaymentMethod::Wallet
        );
    if refund {
        order.payment.status = PaymentStatus::Refunded;
    }
    if to == OrderStatus::Delivered
        && order.payment.method == PaymentMethod::CashOnDelivery
        && order.payment.status == PaymentStatus::Pending
    {
        order.payment.status = PaymentStatus::Paid;
    }

    // Stored status acts as the guard against applying side effects twice
    repository.update_order(order.clone(), from).await?;
    tracing::info!(
        "Order {} moved from {} to {} by user {}",
        order_id,
        from.as_str(),
        to.as_str(),
        caller.user_id
    );

    if refund {
        repository
            .credit(
                order.user_id,
                order.total,
                TransactionKind::Refund,
                &format!("Refund for cancelled order {}", order_id),
            )
            .await?;
    }
    if to == OrderStatus::Delivered && order.payment.status == PaymentStatus::Paid {
        for (author_id, amount) in royalties(&order, context.policy.author_royalty_percent) {
            repository
                .credit(
                    author_id,
                    amount,
                    TransactionKind::Royalty,
                    &format!("Royalty for order {}", order_id),
                )
                .await?;
        }
    }

    context
        .notify(
            order.user_id,
            &format!("Order {}", to.as_str()),
            &format!("Your order {} is now {}", order_id, to.as_str()),
        )
        .await;
    Ok(order)
}
