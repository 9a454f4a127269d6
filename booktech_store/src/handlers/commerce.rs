use actix_web::http::header::LOCATION;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use crate::api::{
    BookId, Caller, CartQuantity, CheckoutRequest, OrderId, OrderStatusUpdate,
    PaymentConfirmation, UserId,
};
use crate::checkout::{cart_view, confirm_payment, place_order};
use crate::context::StoreContext;
use crate::handlers::{Store, UserBookPath};
use crate::order_workflow::{can_view, change_status, listing_filter};
use crate::service_error::ServiceError;

/// Book must be listed and approved before it goes into a cart or wishlist
async fn ensure_purchasable(context: &StoreContext, book_id: BookId) -> Result<(), ServiceError> {
    match context.catalog.find_book(book_id).await? {
        Some(entry) if entry.purchasable => Ok(()),
        Some(_) => Err(ServiceError::Invalid(format!(
            "Book {} is not for sale",
            book_id
        ))),
        None => Err(ServiceError::Invalid(format!("Book {} does not exist", book_id))),
    }
}

#[api_v2_operation]
pub async fn get_cart(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match cart_view(&store, user_id).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(err) => err.into_response("Get cart"),
    })
}

#[api_v2_operation]
pub async fn clear_cart(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.clear_cart(user_id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => ServiceError::from(err).into_response("Clear cart"),
    })
}

#[api_v2_operation]
pub async fn set_cart_item(
    store: Store,
    caller: Caller,
    path: web::Path<UserBookPath>,
    quantity: web::Json<CartQuantity>,
) -> Result<HttpResponse, Error> {
    let UserBookPath { user_id, book_id } = path.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let quantity = quantity.into_inner().quantity;
    if quantity == 0 {
        return Ok(HttpResponse::BadRequest().json("Quantity must be at least 1"));
    }
    if let Err(err) = ensure_purchasable(&store, book_id).await {
        return Ok(err.into_response("Set cart item"));
    }

    Ok(
        match store
            .repository
            .set_cart_quantity(user_id, book_id, quantity)
            .await
        {
            Ok(()) => HttpResponse::Ok().finish(),
            Err(err) => ServiceError::from(err).into_response("Set cart item"),
        },
    )
}

#[api_v2_operation]
pub async fn remove_cart_item(
    store: Store,
    caller: Caller,
    path: web::Path<UserBookPath>,
) -> Result<HttpResponse, Error> {
    let UserBookPath { user_id, book_id } = path.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.remove_from_cart(user_id, book_id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => ServiceError::from(err).into_response("Remove cart item"),
    })
}

#[api_v2_operation]
pub async fn get_wishlist(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.get_wishlist(user_id).await {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(err) => ServiceError::from(err).into_response("Get wishlist"),
    })
}

#[api_v2_operation]
pub async fn add_to_wishlist(
    store: Store,
    caller: Caller,
    path: web::Path<UserBookPath>,
) -> Result<HttpResponse, Error> {
    let UserBookPath { user_id, book_id } = path.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    match store.catalog.find_book(book_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(HttpResponse::NotFound().finish()),
        Err(err) => return Ok(ServiceError::from(err).into_response("Add to wishlist")),
    }
    Ok(match store.repository.add_to_wishlist(user_id, book_id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => ServiceError::from(err).into_response("Add to wishlist"),
    })
}

#[api_v2_operation]
pub async fn remove_from_wishlist(
    store: Store,
    caller: Caller,
    path: web::Path<UserBookPath>,
) -> Result<HttpResponse, Error> {
    let UserBookPath { user_id, book_id } = path.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store.repository.remove_from_wishlist(user_id, book_id).await {
            Ok(()) => HttpResponse::Ok().finish(),
            Err(err) => ServiceError::from(err).into_response("Remove from wishlist"),
        },
    )
}

#[api_v2_operation]
pub async fn checkout(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match place_order(&store, user_id, request.into_inner()).await {
            Ok(response) => HttpResponse::Created()
                .append_header((LOCATION, format!("/api/order/{}", response.order.order_id)))
                .json(response),
            Err(err) => err.into_response("Checkout"),
        },
    )
}

#[api_v2_operation]
pub async fn get_user_orders(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store
            .repository
            .list_orders(crate::store_repository::OrderFilter::Customer(user_id))
            .await
        {
            Ok(orders) => HttpResponse::Ok().json(orders),
            Err(err) => ServiceError::from(err).into_response("Get user orders"),
        },
    )
}

/// Order management listing, scoped by the caller's role
#[api_v2_operation]
pub async fn get_managed_orders(store: Store, caller: Caller) -> Result<HttpResponse, Error> {
    Ok(
        match store.repository.list_orders(listing_filter(&caller)).await {
            Ok(orders) => HttpResponse::Ok().json(orders),
            Err(err) => ServiceError::from(err).into_response("Get orders"),
        },
    )
}

#[api_v2_operation]
pub async fn get_order(
    store: Store,
    caller: Caller,
    order_id: web::Path<OrderId>,
) -> Result<HttpResponse, Error> {
    Ok(match store.repository.get_order(order_id.into_inner()).await {
        Ok(order) if can_view(&caller, &order) => HttpResponse::Ok().json(order),
        Ok(_) => HttpResponse::Forbidden().finish(),
        Err(err) => ServiceError::from(err).into_response("Get order"),
    })
}

#[api_v2_operation]
pub async fn update_order_status(
    store: Store,
    caller: Caller,
    order_id: web::Path<OrderId>,
    update: web::Json<OrderStatusUpdate>,
) -> Result<HttpResponse, Error> {
    Ok(
        match change_status(&store, caller, order_id.into_inner(), update.status).await {
            Ok(order) => HttpResponse::Ok().json(order),
            Err(err) => err.into_response("Update order status"),
        },
    )
}

#[api_v2_operation]
pub async fn confirm_order_payment(
    store: Store,
    caller: Caller,
    order_id: web::Path<OrderId>,
    confirmation: web::Json<PaymentConfirmation>,
) -> Result<HttpResponse, Error> {
    Ok(
        match confirm_payment(
            &store,
            caller,
            order_id.into_inner(),
            confirmation.into_inner(),
        )
        .await
        {
            Ok(order) => HttpResponse::Ok().json(order),
            Err(err) => err.into_response("Confirm payment"),
        },
    )
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    use crate::api::{
        CartQuantity, CartView, CheckoutRequest, CheckoutResponse, Order, OrderStatus,
        OrderStatusUpdate, PaymentConfirmation, PaymentMethod, PaymentStatus, ShippingAddress,
    };
    use crate::context::StorePolicy;
    use crate::handlers::test_support::{
        test_app, ADMIN, AUTHOR, CUSTOMER, DELIVERY, OTHER_CUSTOMER,
    };
    use crate::payment_gateway::testing::FakePaymentGateway;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Jane Doe".to_string(),
            line1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    fn checkout_request(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: address(),
            payment_method: method,
        }
    }

    #[actix_web::test]
    async fn test_cart_operations() {
        let (app, _context) = test_app!();

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 2 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/2")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/2")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 0 })
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        // Not approved in the catalog
        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/3")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, OTHER_CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/cart")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let cart: CartView = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.summary.subtotal, 3500);
        assert_eq!(cart.summary.tax, 630);
        assert_eq!(cart.summary.total, 4130);

        let req = actix_test::TestRequest::delete()
            .uri("/api/user/1/cart/2")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/cart")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let cart: CartView = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 2);

        let req = actix_test::TestRequest::delete()
            .uri("/api/user/1/cart")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/cart")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let cart: CartView = actix_test::call_and_read_body_json(&app, req).await;
        assert!(cart.lines.is_empty());
        assert_eq!(cart.summary.total, 0);
    }

    #[actix_web::test]
    async fn test_wishlist_operations() {
        let (app, _context) = test_app!();

        for book_id in [1, 2, 1] {
            let req = actix_test::TestRequest::post()
                .uri(&format!("/api/user/1/wishlist/{}", book_id))
                .insert_header((AUTHORIZATION, CUSTOMER))
                .to_request();
            assert!(actix_test::call_service(&app, req).await.status().is_success());
        }

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/wishlist/99")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        let req = actix_test::TestRequest::delete()
            .uri("/api/user/1/wishlist/2")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/wishlist")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let wishlist: Vec<i32> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(wishlist, vec![1]);
    }

    #[actix_web::test]
    /// Cash order from checkout to delivery, driven by each role in turn
    async fn test_order_lifecycle() {
        let (app, context) = test_app!();

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::CashOnDelivery))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST,
            "empty cart cannot be checked out"
        );

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::CashOnDelivery))
            .to_request();
        let response = actix_test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: CheckoutResponse = actix_test::read_body_json(response).await;
        let order_id = created.order.order_id;
        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.total, 1180);
        assert!(created.payment_session.is_none());

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/order/{}", order_id))
            .insert_header((AUTHORIZATION, OTHER_CUSTOMER))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/orders")
            .insert_header((AUTHORIZATION, AUTHOR))
            .to_request();
        let managed: Vec<Order> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(managed.len(), 1);

        let req = actix_test::TestRequest::get()
            .uri("/api/orders")
            .insert_header((AUTHORIZATION, DELIVERY))
            .to_request();
        let managed: Vec<Order> = actix_test::call_and_read_body_json(&app, req).await;
        assert!(managed.is_empty(), "pending orders are not for delivery yet");

        let status_change = |token, status| {
            actix_test::TestRequest::put()
                .uri(&format!("/api/order/{}/status", order_id))
                .insert_header((AUTHORIZATION, token))
                .set_json(OrderStatusUpdate { status })
                .to_request()
        };

        let response =
            actix_test::call_service(&app, status_change(DELIVERY, OrderStatus::Shipped)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response =
            actix_test::call_service(&app, status_change(AUTHOR, OrderStatus::Processing)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        for (token, status) in [
            (AUTHOR, OrderStatus::Confirmed),
            (AUTHOR, OrderStatus::Processing),
            (DELIVERY, OrderStatus::Shipped),
            (DELIVERY, OrderStatus::Delivered),
        ] {
            let response = actix_test::call_service(&app, status_change(token, status)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/order/{}", order_id))
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let order: Order = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.payment.status, PaymentStatus::Paid);

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/cart")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let cart: CartView = actix_test::call_and_read_body_json(&app, req).await;
        assert!(cart.lines.is_empty());

        // 70% royalty of the $10 line
        assert_eq!(context.repository.get_wallet(10).await.unwrap().balance, 700);

        let req = actix_test::TestRequest::get()
            .uri("/api/orders")
            .insert_header((AUTHORIZATION, ADMIN))
            .to_request();
        let all: Vec<Order> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 1);
    }

    #[actix_web::test]
    async fn test_card_checkout_and_payment_confirmation() {
        let (app, _context) = test_app!();

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/2")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 2 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::Card))
            .to_request();
        let created: CheckoutResponse = actix_test::call_and_read_body_json(&app, req).await;
        let session = created.payment_session.unwrap();
        assert_eq!(session.amount, created.order.total);
        assert_eq!(created.order.payment.status, PaymentStatus::Pending);

        let confirm = |token| {
            actix_test::TestRequest::post()
                .uri(&format!("/api/order/{}/payment", created.order.order_id))
                .insert_header((AUTHORIZATION, token))
                .set_json(PaymentConfirmation {
                    gateway_payment_id: "pay_1".to_string(),
                })
                .to_request()
        };

        let response = actix_test::call_service(&app, confirm(OTHER_CUSTOMER)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let order: Order = actix_test::call_and_read_body_json(&app, confirm(CUSTOMER)).await;
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment.status, PaymentStatus::Paid);

        let response = actix_test::call_service(&app, confirm(CUSTOMER)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_card_checkout_without_gateway() {
        let (app, context) = test_app!(
            StorePolicy::default(),
            FakePaymentGateway::unavailable()
        );

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::Card))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(context
            .repository
            .list_orders(crate::store_repository::OrderFilter::All)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(context.repository.get_cart(1).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_demo_order_cannot_be_confirmed() {
        let (app, context) = test_app!(
            StorePolicy {
                allow_demo_orders: true,
                ..StorePolicy::default()
            },
            FakePaymentGateway::unavailable()
        );

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::Card))
            .to_request();
        let created: CheckoutResponse = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.order.payment.status, PaymentStatus::Demo);

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/order/{}/payment", created.order.order_id))
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(PaymentConfirmation {
                gateway_payment_id: "made-up".to_string(),
            })
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::CONFLICT
        );

        let req = actix_test::TestRequest::put()
            .uri(&format!("/api/order/{}/status", created.order.order_id))
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(OrderStatusUpdate {
                status: OrderStatus::Cancelled,
            })
            .to_request();
        let cancelled: Order = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Demo);
        assert_eq!(context.repository.get_wallet(1).await.unwrap().balance, 0);
    }

    #[actix_web::test]
    async fn test_wallet_checkout_needs_balance() {
        let (app, context) = test_app!();

        let req = actix_test::TestRequest::put()
            .uri("/api/user/1/cart/1")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(CartQuantity { quantity: 1 })
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::Wallet))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::PAYMENT_REQUIRED
        );

        context
            .repository
            .credit(1, 2000, crate::api::TransactionKind::Refund, "Top up")
            .await
            .unwrap();

        let req = actix_test::TestRequest::post()
            .uri("/api/user/1/orders")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .set_json(checkout_request(PaymentMethod::Wallet))
            .to_request();
        let created: CheckoutResponse = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.order.status, OrderStatus::Confirmed);
        assert_eq!(created.order.payment.status, PaymentStatus::Paid);
        assert_eq!(
            context.repository.get_wallet(1).await.unwrap().balance,
            2000 - 1180
        );
    }
}
