use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::api_v2_operation;
use paperclip::actix::Apiv2Schema;
use serde::Deserialize;

use crate::api::{BookId, NotificationId, UserId};
use crate::context::StoreContext;

pub mod accounts;
pub mod commerce;
pub mod support;
pub mod wallet;

type Store = Data<StoreContext>;

#[derive(Debug, Deserialize, Apiv2Schema)]
pub struct UserBookPath {
    pub user_id: UserId,
    pub book_id: BookId,
}

#[derive(Debug, Deserialize, Apiv2Schema)]
pub struct UserNotificationPath {
    pub user_id: UserId,
    pub notification_id: NotificationId,
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use booktech_common::api::{Caller, Role};
    use booktech_common::auth::{SessionVerifier, StaticSessionVerifier};

    pub const CUSTOMER: &str = "Bearer customer-token";
    pub const OTHER_CUSTOMER: &str = "Bearer other-customer-token";
    pub const AUTHOR: &str = "Bearer author-token";
    pub const ADMIN: &str = "Bearer admin-token";
    pub const DELIVERY: &str = "Bearer delivery-token";

    /// Customer 1, other customer 2, author 10 (owns book 1), admin 30, delivery boy 20
    pub fn verifier() -> Arc<dyn SessionVerifier> {
        let session = |user_id, role| Caller { user_id, role };
        Arc::new(
            StaticSessionVerifier::default()
                .with_session("customer-token", session(1, Role::Customer))
                .with_session("other-customer-token", session(2, Role::Customer))
                .with_session("author-token", session(10, Role::Author))
                .with_session("admin-token", session(30, Role::Admin))
                .with_session("delivery-token", session(20, Role::DeliveryBoy)),
        )
    }

    /// In-process store app on the in-memory repository and static catalog.
    /// Evaluates to the service and its context
    macro_rules! test_app {
        ($policy:expr, $gateway:expr) => {{
            use paperclip::actix::OpenApiExt;
            let context = actix_web::web::Data::new(crate::context::testing::store_context(
                $policy, $gateway,
            ));
            let app = actix_web::test::init_service(
                actix_web::App::new()
                    .wrap_api()
                    .app_data(context.clone())
                    .app_data(actix_web::web::Data::new(
                        crate::handlers::test_support::verifier(),
                    ))
                    .configure(crate::app_config::config_app)
                    .build(),
            )
            .await;
            (app, context)
        }};
        () => {
            crate::handlers::test_support::test_app!(
                crate::context::StorePolicy::default(),
                crate::payment_gateway::testing::FakePaymentGateway::available()
            )
        };
    }
    pub(crate) use test_app;
}
