use std::collections::HashMap;
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use anyhow::{bail, Context};
use futures_util::future::LocalBoxFuture;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use crate::api::Caller;

/// Resolves bearer tokens to callers
/// `Ok(None)` means the token is unknown or expired
#[async_trait::async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<Caller>>;
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let verifier = req.app_data::<Data<Arc<dyn SessionVerifier>>>().cloned();
        let token = bearer_token(req.headers());

        Box::pin(async move {
            let verifier = verifier
                .ok_or_else(|| ErrorInternalServerError("Session verifier not configured"))?;
            let token = token.ok_or_else(|| ErrorUnauthorized("Missing bearer token"))?;
            match verifier.verify(&token).await {
                Ok(Some(caller)) => Ok(caller),
                Ok(None) => Err(ErrorUnauthorized("Invalid or expired session")),
                Err(err) => {
                    tracing::error!("Session verification failed {:#}", err);
                    Err(ErrorInternalServerError("Session verification failed"))
                }
            }
        })
    }
}

/// Caller for endpoints that are public but behave differently for signed in users
/// No token gives `None`, a token that does not resolve is still rejected
pub struct MaybeCaller(pub Option<Caller>);

impl FromRequest for MaybeCaller {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        if req.headers().get(AUTHORIZATION).is_none() {
            return Box::pin(async { Ok(MaybeCaller(None)) });
        }
        let caller = Caller::from_request(req, payload);
        Box::pin(async move { Ok(MaybeCaller(Some(caller.await?))) })
    }
}

// Neither extractor contributes parameters to the generated api spec
impl paperclip::v2::schema::Apiv2Schema for Caller {}
impl paperclip::actix::OperationModifier for Caller {}
impl paperclip::v2::schema::Apiv2Schema for MaybeCaller {}
impl paperclip::actix::OperationModifier for MaybeCaller {}

/// Verifies tokens against the store service `GET /api/session` endpoint
pub struct RemoteSessionVerifier {
    store_url: String,
    client: ClientWithMiddleware,
}

impl RemoteSessionVerifier {
    pub fn new(store_url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            store_url: store_url.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SessionVerifier for RemoteSessionVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<Caller>> {
        let response = self
            .client
            .get(format!("{}/api/session", self.store_url))
            .header(AUTHORIZATION.as_str(), format!("Bearer {}", token))
            .send()
            .await
            .context("Failed to reach session endpoint")?;

        if response.status() == StatusCode::UNAUTHORIZED {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await.context("Invalid session body")?))
        } else {
            bail!("Session endpoint returned {}", response.status())
        }
    }
}

/// Fixed token table, used where no store service is available
#[derive(Default)]
pub struct StaticSessionVerifier {
    sessions: parking_lot::RwLock<HashMap<String, Caller>>,
}

impl StaticSessionVerifier {
    pub fn with_session(self, token: &str, caller: Caller) -> Self {
        self.sessions.write().insert(token.to_string(), caller);
        self
    }
}

#[async_trait::async_trait]
impl SessionVerifier for StaticSessionVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<Caller>> {
        Ok(self.sessions.read().get(token).copied())
    }
}
