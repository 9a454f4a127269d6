use booktech_common::clock::now_millis;

use crate::api::{
    Caller, CartView, CheckoutRequest, CheckoutResponse, Order, OrderId, OrderItem,
    OrderStatus, Payment, PaymentConfirmation, PaymentMethod, PaymentSession, PaymentStatus,
    Role, ShippingAddress, TransactionKind, UserId,
};
use crate::context::StoreContext;
use crate::order_workflow::record_status;
use crate::payment_gateway::PaymentGatewayError;
use crate::pricing::price_cart;
use crate::service_error::ServiceError;
use crate::store_repository::NewOrder;

pub async fn cart_view(context: &StoreContext, user_id: UserId) -> Result<CartView, ServiceError> {
    let items = context.repository.get_cart(user_id).await?;
    price_cart(
        context.catalog.as_ref(),
        items,
        context.policy.tax_rate_basis_points,
    )
    .await
}

fn validate_address(address: &ShippingAddress) -> Result<(), ServiceError> {
    let required = [
        ("full_name", &address.full_name),
        ("line1", &address.line1),
        ("city", &address.city),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ];
    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(ServiceError::Invalid(format!(
            "Shipping address {} is required",
            field
        ))),
        None => Ok(()),
    }
}

/// Turns the cart into an order with prices taken from the catalog now.
/// The cart is only cleared once the order is stored
pub async fn place_order(
    context: &StoreContext,
    user_id: UserId,
    request: CheckoutRequest,
) -> Result<CheckoutResponse, ServiceError> {
    validate_address(&request.shipping_address)?;
    let cart = cart_view(context, user_id).await?;
    if !cart.unavailable.is_empty() {
        return Err(ServiceError::Invalid(format!(
            "Books {:?} are no longer available",
            cart.unavailable
        )));
    }
    if cart.lines.is_empty() {
        return Err(ServiceError::Invalid("Cart is empty".to_string()));
    }
    let summary = cart.summary;
    let repository = &context.repository;

    let mut payment_session = None;
    let payment = match request.payment_method {
        PaymentMethod::Wallet => {
            repository
                .debit(
                    user_id,
                    summary.total,
                    TransactionKind::OrderPayment,
                    "Book order",
                )
                .await?;
            Payment {
                method: PaymentMethod::Wallet,
                status: PaymentStatus::Paid,
                gateway_order_id: None,
                gateway_payment_id: None,
            }
        }
        PaymentMethod::Card => {
            let receipt = format!("user_{}_{}", user_id, now_millis());
            match context
                .payments
                .create_order(&receipt, summary.total, &context.policy.currency)
                .await
            {
                Ok(gateway_order_id) => {
                    payment_session = Some(PaymentSession {
                        gateway_order_id: gateway_order_id.clone(),
                        key_id: context.policy.payment_key_id.clone(),
                        amount: summary.total,
                        currency: context.policy.currency.clone(),
                    });
                    Payment {
                        method: PaymentMethod::Card,
                        status: PaymentStatus::Pending,
                        gateway_order_id: Some(gateway_order_id),
                        gateway_payment_id: None,
                    }
                }
                Err(PaymentGatewayError::Unavailable(reason)) if context.policy.allow_demo_orders => {
                    tracing::warn!(
                        "Payment gateway unavailable ({}), recording demo order for user {}",
                        reason,
                        user_id
                    );
                    Payment {
                        method: PaymentMethod::Card,
                        status: PaymentStatus::Demo,
                        gateway_order_id: None,
                        gateway_payment_id: None,
                    }
                }
                Err(PaymentGatewayError::Unavailable(reason)) => {
                    tracing::warn!("Payment gateway unavailable: {}", reason);
                    return Err(ServiceError::PaymentUnavailable);
                }
                Err(err @ PaymentGatewayError::Rejected(_)) => {
                    return Err(anyhow::Error::from(err).into());
                }
            }
        }
        PaymentMethod::CashOnDelivery => Payment {
            method: PaymentMethod::CashOnDelivery,
            status: PaymentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
        },
    };

    let new_order = NewOrder {
        user_id,
        items: cart
            .lines
            .into_iter()
            .map(|line| OrderItem {
                book_id: line.book_id,
                title: line.title,
                author_id: line.author_id,
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect(),
        shipping_address: request.shipping_address,
        payment,
        subtotal: summary.subtotal,
        tax: summary.tax,
        total: summary.total,
    };
    let paid_from_wallet = new_order.payment.method == PaymentMethod::Wallet;

    let mut order = match repository.create_order(new_order).await {
        Ok(order) => order,
        Err(err) => {
            if paid_from_wallet {
                // Give the money back, the order does not exist
                if let Err(refund_err) = repository
                    .credit(
                        user_id,
                        summary.total,
                        TransactionKind::Refund,
                        "Refund for failed order",
                    )
                    .await
                {
                    tracing::error!("Failed to refund user {}: {}", user_id, refund_err);
                }
            }
            return Err(err.into());
        }
    };

    if paid_from_wallet {
        record_status(
            &mut order,
            OrderStatus::Confirmed,
            Caller {
                user_id,
                role: Role::Customer,
            },
        );
        repository
            .update_order(order.clone(), OrderStatus::Pending)
            .await?;
    }

    repository.clear_cart(user_id).await?;
    tracing::info!(
        "User {} placed order {} for {}",
        user_id,
        order.order_id,
        order.total
    );
    context
        .notify(
            user_id,
            "Order placed",
            &format!("Order {} was placed", order.order_id),
        )
        .await;

    Ok(CheckoutResponse {
        order,
        payment_session,
    })
}

/// Records the gateway payment of a card order and confirms it
pub async fn confirm_payment(
    context: &StoreContext,
    caller: Caller,
    order_id: OrderId,
    confirmation: PaymentConfirmation,
) -> Result<Order, ServiceError> {
    let mut order = context.repository.get_order(order_id).await?;
    if !caller.can_act_for(order.user_id) {
        return Err(ServiceError::Forbidden(format!(
            "Order {} belongs to another user",
            order_id
        )));
    }
    // Only payments opened at the gateway can be confirmed
    if order.payment.method != PaymentMethod::Card
        || order.payment.status != PaymentStatus::Pending
        || order.payment.gateway_order_id.is_none()
        || order.status != OrderStatus::Pending
    {
        return Err(ServiceError::Conflict(format!(
            "Order {} is not awaiting a card payment",
            order_id
        )));
    }
    if confirmation.gateway_payment_id.trim().is_empty() {
        return Err(ServiceError::Invalid(
            "gateway_payment_id is required".to_string(),
        ));
    }

    order.payment.status = PaymentStatus::Paid;
    order.payment.gateway_payment_id = Some(confirmation.gateway_payment_id);
    record_status(&mut order, OrderStatus::Confirmed, caller);
    context
        .repository
        .update_order(order.clone(), OrderStatus::Pending)
        .await?;
    context
        .notify(
            order.user_id,
            "Payment received",
            &format!("Payment for order {} was received", order_id),
        )
        .await;
    Ok(order)
}
