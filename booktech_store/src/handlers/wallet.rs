use actix_web::http::header::LOCATION;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use crate::api::{
    Caller, Role, SettlementDecision, SettlementId, SettlementQuery, SettlementRequest,
    SettlementVerdict, UserId,
};
use crate::context::StoreContext;
use crate::handlers::Store;
use crate::service_error::ServiceError;
use crate::store_repository::StoreError;

#[api_v2_operation]
pub async fn get_wallet(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.get_wallet(user_id).await {
        Ok(wallet) => HttpResponse::Ok().json(wallet),
        Err(err) => ServiceError::from(err).into_response("Get wallet"),
    })
}

async fn request_settlement(
    context: &StoreContext,
    user_id: UserId,
    request: SettlementRequest,
) -> Result<crate::api::Settlement, ServiceError> {
    if request.amount <= 0 {
        return Err(ServiceError::Invalid(
            "Settlement amount must be positive".to_string(),
        ));
    }
    let account = &request.bank_account;
    if account.account_holder.trim().is_empty() || account.account_number.trim().is_empty() {
        return Err(ServiceError::Invalid(
            "Bank account holder and number are required".to_string(),
        ));
    }
    // Checked again when the admin approves
    let balance = context.repository.get_wallet(user_id).await?.balance;
    if request.amount > balance {
        return Err(StoreError::InsufficientFunds {
            user_id,
            balance,
            required: request.amount,
        }
        .into());
    }

    let settlement = context
        .repository
        .create_settlement(user_id, request)
        .await?;
    tracing::info!(
        "User {} requested settlement {} of {}",
        user_id,
        settlement.settlement_id,
        settlement.amount
    );
    Ok(settlement)
}

#[api_v2_operation]
pub async fn create_settlement(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
    request: web::Json<SettlementRequest>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if caller.user_id != user_id || caller.role != Role::Author {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match request_settlement(&store, user_id, request.into_inner()).await {
            Ok(settlement) => HttpResponse::Created()
                .append_header((
                    LOCATION,
                    format!("/api/settlement/{}", settlement.settlement_id),
                ))
                .json(settlement),
            Err(err) => err.into_response("Create settlement"),
        },
    )
}

#[api_v2_operation]
pub async fn get_user_settlements(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store.repository.list_settlements(Some(user_id), None).await {
            Ok(settlements) => HttpResponse::Ok().json(settlements),
            Err(err) => ServiceError::from(err).into_response("Get user settlements"),
        },
    )
}

#[api_v2_operation]
pub async fn get_all_settlements(
    store: Store,
    caller: Caller,
    query: web::Query<SettlementQuery>,
) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store.repository.list_settlements(None, query.status).await {
            Ok(settlements) => HttpResponse::Ok().json(settlements),
            Err(err) => ServiceError::from(err).into_response("Get settlements"),
        },
    )
}

#[api_v2_operation]
pub async fn decide_settlement(
    store: Store,
    caller: Caller,
    settlement_id: web::Path<SettlementId>,
    decision: web::Json<SettlementDecision>,
) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let settlement_id = settlement_id.into_inner();
    let SettlementDecision { verdict, note } = decision.into_inner();

    let settlement = match store
        .repository
        .decide_settlement(settlement_id, verdict, note)
        .await
    {
        Ok(settlement) => settlement,
        Err(err) => return Ok(ServiceError::from(err).into_response("Decide settlement")),
    };
    tracing::info!(
        "Settlement {} {} by admin {}",
        settlement_id,
        settlement.status.as_str(),
        caller.user_id
    );
    let message = match verdict {
        SettlementVerdict::Approve => format!(
            "Your settlement of {} was paid out",
            settlement.amount
        ),
        SettlementVerdict::Reject => format!(
            "Your settlement of {} was rejected",
            settlement.amount
        ),
    };
    store
        .notify(settlement.user_id, "Settlement update", &message)
        .await;
    Ok(HttpResponse::Ok().json(settlement))
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    use crate::api::{
        BankAccount, Settlement, SettlementDecision, SettlementRequest, SettlementStatus,
        SettlementVerdict, TransactionKind, Wallet,
    };
    use crate::handlers::test_support::{test_app, ADMIN, AUTHOR, CUSTOMER};

    fn settlement_request(amount: i64) -> SettlementRequest {
        SettlementRequest {
            amount,
            bank_account: BankAccount {
                account_holder: "Author Ten".to_string(),
                account_number: "000123".to_string(),
                routing_code: "RT01".to_string(),
            },
        }
    }

    #[actix_web::test]
    async fn test_settlement_flow() {
        let (app, context) = test_app!();
        context
            .repository
            .credit(10, 1400, TransactionKind::Royalty, "Royalty for order 1")
            .await
            .unwrap();

        let request = |token, amount| {
            actix_test::TestRequest::post()
                .uri("/api/user/10/settlements")
                .insert_header((AUTHORIZATION, token))
                .set_json(settlement_request(amount))
                .to_request()
        };

        let response = actix_test::call_service(&app, request(CUSTOMER, 100)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = actix_test::call_service(&app, request(AUTHOR, 0)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = actix_test::call_service(&app, request(AUTHOR, 5000)).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let response = actix_test::call_service(&app, request(AUTHOR, 1000)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let settlement: Settlement = actix_test::read_body_json(response).await;
        assert_eq!(settlement.status, SettlementStatus::Pending);

        let req = actix_test::TestRequest::get()
            .uri("/api/settlements?status=pending")
            .insert_header((AUTHORIZATION, AUTHOR))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/settlements?status=pending")
            .insert_header((AUTHORIZATION, ADMIN))
            .to_request();
        let pending: Vec<Settlement> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 1);

        let decide = |verdict| {
            actix_test::TestRequest::put()
                .uri(&format!("/api/settlement/{}/decision", settlement.settlement_id))
                .insert_header((AUTHORIZATION, ADMIN))
                .set_json(SettlementDecision {
                    verdict,
                    note: Some("Paid by transfer".to_string()),
                })
                .to_request()
        };
        let decided: Settlement =
            actix_test::call_and_read_body_json(&app, decide(SettlementVerdict::Approve)).await;
        assert_eq!(decided.status, SettlementStatus::Completed);
        assert!(decided.decided_at.is_some());

        let response = actix_test::call_service(&app, decide(SettlementVerdict::Reject)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let req = actix_test::TestRequest::get()
            .uri("/api/user/10/wallet")
            .insert_header((AUTHORIZATION, AUTHOR))
            .to_request();
        let wallet: Wallet = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(wallet.balance, 400);
        assert_eq!(wallet.transactions[0].kind, TransactionKind::Settlement);

        let req = actix_test::TestRequest::get()
            .uri("/api/user/10/settlements")
            .insert_header((AUTHORIZATION, AUTHOR))
            .to_request();
        let history: Vec<Settlement> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.len(), 1);
        assert_eq!(
            context.repository.list_notifications(10).await.unwrap().len(),
            1
        );
    }

    #[actix_web::test]
    async fn test_wallet_is_private() {
        let (app, _context) = test_app!();

        let req = actix_test::TestRequest::get()
            .uri("/api/user/10/wallet")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/user/1/wallet")
            .insert_header((AUTHORIZATION, CUSTOMER))
            .to_request();
        let wallet: Wallet = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(wallet.balance, 0);
        assert!(wallet.transactions.is_empty());
    }
}
