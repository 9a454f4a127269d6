use actix_web::http::header::LOCATION;
use actix_web::{Error, HttpRequest, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use booktech_common::auth::bearer_token;

use crate::accounts::{self as account_service, ALL_ROLES, SELF_SERVICE_ROLES};
use crate::api::{
    Caller, LoginRequest, ProfilePatch, SignupRequest, SubscriptionUpdate, UserId,
};
use crate::handlers::Store;
use crate::service_error::ServiceError;

fn created_user(user_id: UserId) -> HttpResponse {
    HttpResponse::Created()
        .append_header((LOCATION, format!("/api/user/{}", user_id)))
        .finish()
}

#[api_v2_operation]
pub async fn signup(
    store: Store,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse, Error> {
    Ok(
        match account_service::signup(&store, request.into_inner(), SELF_SERVICE_ROLES).await {
            Ok(user_id) => created_user(user_id),
            Err(err) => err.into_response("Signup"),
        },
    )
}

#[api_v2_operation]
pub async fn create_user(
    store: Store,
    caller: Caller,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match account_service::signup(&store, request.into_inner(), ALL_ROLES).await {
            Ok(user_id) => created_user(user_id),
            Err(err) => err.into_response("Create user"),
        },
    )
}

#[api_v2_operation]
pub async fn get_all_users(store: Store, caller: Caller) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.list_users().await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(err) => ServiceError::from(err).into_response("List users"),
    })
}

#[api_v2_operation]
pub async fn login(store: Store, request: web::Json<LoginRequest>) -> Result<HttpResponse, Error> {
    Ok(
        match account_service::login(&store, request.into_inner()).await {
            Ok(session) => HttpResponse::Ok().json(session),
            Err(err) => err.into_response("Login"),
        },
    )
}

/// Used by the other services to resolve bearer tokens
#[api_v2_operation]
pub async fn whoami(caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(caller))
}

#[api_v2_operation]
pub async fn logout(store: Store, _caller: Caller, req: HttpRequest) -> Result<HttpResponse, Error> {
    let Some(token) = bearer_token(req.headers()) else {
        return Ok(HttpResponse::Unauthorized().finish());
    };
    Ok(match store.repository.delete_session(&token).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => ServiceError::from(err).into_response("Logout"),
    })
}

#[api_v2_operation]
pub async fn get_user(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.get_user(user_id).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => ServiceError::from(err).into_response("Get user"),
    })
}

#[api_v2_operation]
pub async fn update_user(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
    patch: web::Json<ProfilePatch>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let patch = patch.into_inner();
    if patch.name.as_ref().is_some_and(|name| name.trim().is_empty())
        || patch
            .email
            .as_ref()
            .is_some_and(|email| !email.contains('@'))
    {
        return Ok(HttpResponse::BadRequest().json("Invalid name or email"));
    }

    Ok(match store.repository.update_profile(user_id, patch).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => ServiceError::from(err).into_response("Update user"),
    })
}

#[api_v2_operation]
pub async fn set_subscription(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
    update: web::Json<SubscriptionUpdate>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let tier = update.into_inner().tier;
    Ok(match store.repository.set_subscription(user_id, tier).await {
        Ok(()) => {
            tracing::info!("User {} switched to {} plan", user_id, tier.as_str());
            HttpResponse::Ok().finish()
        }
        Err(err) => {
            ServiceError::from(err).into_response("Set subscription")
        }
    })
}

#[api_v2_operation]
pub async fn get_referrals(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match account_service::referral_summary(&store, user_id).await {
            Ok(summary) => HttpResponse::Ok().json(summary),
            Err(err) => err.into_response("Get referrals"),
        },
    )
}
