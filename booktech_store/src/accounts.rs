use std::sync::Arc;

use booktech_common::auth::SessionVerifier;

use crate::api::{
    Caller, LoginRequest, ReferralSummary, Role, SessionResponse, SignupRequest,
    TransactionKind, UserId,
};
use crate::context::StoreContext;
use crate::passwords::{
    hash_password, new_referral_code, new_salt, new_session_token, verify_password,
};
use crate::service_error::ServiceError;
use crate::store_repository::{NewUser, StoreRepository};

const MIN_PASSWORD_LENGTH: usize = 8;
const REFERRAL_CODE_ATTEMPTS: usize = 5;
const WELCOME_BONUS: &str = "Welcome bonus for joining with a referral";

/// Roles a visitor can pick on the signup page
pub const SELF_SERVICE_ROLES: &[Role] = &[Role::Customer, Role::Author];

/// Everything an admin may create
pub const ALL_ROLES: &[Role] = &[Role::Customer, Role::Author, Role::Admin, Role::DeliveryBoy];

fn validate_signup(request: &SignupRequest) -> Result<(), ServiceError> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Invalid("Invalid email".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(ServiceError::Invalid("Name is required".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::Invalid(format!(
            "Password must have at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

async fn unique_referral_code(repository: &dyn StoreRepository) -> Result<String, ServiceError> {
    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        let code = new_referral_code();
        if repository.find_by_referral_code(&code).await?.is_none() {
            return Ok(code);
        }
    }
    Err(anyhow::anyhow!("Failed to generate a unique referral code").into())
}

/// Creates the account and pays out referral rewards
pub async fn signup(
    context: &StoreContext,
    request: SignupRequest,
    allowed_roles: &[Role],
) -> Result<UserId, ServiceError> {
    validate_signup(&request)?;
    let role = request.role.unwrap_or(Role::Customer);
    if !allowed_roles.contains(&role) {
        return Err(ServiceError::Invalid(format!(
            "Role {} cannot be chosen here",
            role.as_str()
        )));
    }

    let repository = context.repository.as_ref();
    let referred_by = match request.referral_code.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(code) => Some(
            repository
                .find_by_referral_code(code)
                .await?
                .ok_or_else(|| ServiceError::Invalid(format!("Unknown referral code {}", code)))?,
        ),
    };

    let salt = new_salt();
    let user_id = repository
        .add_user(NewUser {
            email: request.email.trim().to_string(),
            name: request.name.trim().to_string(),
            role,
            password_hash: hash_password(&request.password, &salt),
            password_salt: salt,
            referral_code: unique_referral_code(repository).await?,
            referred_by,
        })
        .await?;
    tracing::info!("Registered user {} as {}", user_id, role.as_str());

    if let Some(referrer) = referred_by {
        let policy = &context.policy;
        repository
            .credit(
                referrer,
                policy.referrer_reward,
                TransactionKind::ReferralReward,
                &format!("Referral of user {}", user_id),
            )
            .await?;
        repository
            .credit(
                user_id,
                policy.referee_reward,
                TransactionKind::ReferralReward,
                WELCOME_BONUS,
            )
            .await?;
        context
            .notify(
                referrer,
                "Referral reward",
                "Someone joined with your referral code",
            )
            .await;
    }
    Ok(user_id)
}

pub async fn login(
    context: &StoreContext,
    request: LoginRequest,
) -> Result<SessionResponse, ServiceError> {
    let credentials = context
        .repository
        .find_credentials(request.email.trim())
        .await?
        .ok_or(ServiceError::Unauthorized)?;
    if !verify_password(
        &request.password,
        &credentials.password_salt,
        &credentials.password_hash,
    ) {
        tracing::warn!("Failed login for user {}", credentials.user_id);
        return Err(ServiceError::Unauthorized);
    }

    let token = new_session_token();
    context
        .repository
        .create_session(
            &token,
            Caller {
                user_id: credentials.user_id,
                role: credentials.role,
            },
        )
        .await?;
    Ok(SessionResponse {
        token,
        user_id: credentials.user_id,
        role: credentials.role,
    })
}

/// Seeds the first admin account, does nothing if the email is taken
pub async fn bootstrap_admin(
    context: &StoreContext,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    if context.repository.find_credentials(email).await?.is_some() {
        return Ok(());
    }
    let user_id = signup(
        context,
        SignupRequest {
            email: email.to_string(),
            name: "Administrator".to_string(),
            password: password.to_string(),
            role: Some(Role::Admin),
            referral_code: None,
        },
        ALL_ROLES,
    )
    .await
    .map_err(|err| anyhow::anyhow!("Failed to create admin {}: {}", email, err))?;
    tracing::info!("Created bootstrap admin {}", user_id);
    Ok(())
}

pub async fn referral_summary(
    context: &StoreContext,
    user_id: UserId,
) -> Result<ReferralSummary, ServiceError> {
    let profile = context.repository.get_user(user_id).await?;
    let referred = context.repository.list_referred_users(user_id).await?;
    let wallet = context.repository.get_wallet(user_id).await?;
    Ok(ReferralSummary {
        referral_code: profile.referral_code,
        referred_users: referred.len() as u32,
        total_earned: wallet
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::ReferralReward)
            .filter(|t| t.description != WELCOME_BONUS)
            .map(|t| t.amount)
            .sum(),
    })
}

/// Resolves tokens against the store's own session table
pub struct RepositorySessionVerifier {
    repository: Arc<dyn StoreRepository>,
}

impl RepositorySessionVerifier {
    pub fn new(repository: Arc<dyn StoreRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait::async_trait]
impl SessionVerifier for RepositorySessionVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<Caller>> {
        Ok(self.repository.find_session(token).await?)
    }
}
