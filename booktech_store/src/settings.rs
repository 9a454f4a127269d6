use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

use crate::context::StorePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub catalog_url: String,
    pub payment_gateway_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub allow_demo_orders: bool,
    pub currency: String,
    pub tax_rate_basis_points: u32,
    pub author_royalty_percent: u32,
    pub referrer_reward: i64,
    pub referee_reward: i64,
    /// First admin account, created on startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Settings {
    /// Defaults overridden by environment variables, e.g. `CATALOG_URL` or `ALLOW_DEMO_ORDERS`
    pub fn load() -> anyhow::Result<Self> {
        Self::from_env(None)
    }

    fn from_env(env: Option<HashMap<String, String>>) -> anyhow::Result<Self> {
        let policy = StorePolicy::default();
        config::Config::builder()
            .set_default("port", 8082)?
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("catalog_url", "http://localhost:8080")?
            .set_default("payment_gateway_url", "https://api.razorpay.com")?
            .set_default("payment_key_id", "")?
            .set_default("payment_key_secret", "")?
            .set_default("allow_demo_orders", policy.allow_demo_orders)?
            .set_default("currency", policy.currency)?
            .set_default("tax_rate_basis_points", policy.tax_rate_basis_points)?
            .set_default("author_royalty_percent", policy.author_royalty_percent)?
            .set_default("referrer_reward", policy.referrer_reward)?
            .set_default("referee_reward", policy.referee_reward)?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read store settings")?
            .try_deserialize()
            .context("Invalid store settings")
    }

    pub fn policy(&self) -> StorePolicy {
        StorePolicy {
            tax_rate_basis_points: self.tax_rate_basis_points,
            author_royalty_percent: self.author_royalty_percent,
            referrer_reward: self.referrer_reward,
            referee_reward: self.referee_reward,
            allow_demo_orders: self.allow_demo_orders,
            currency: self.currency.clone(),
            payment_key_id: self.payment_key_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_env(Some(HashMap::from([
            ("ALLOW_DEMO_ORDERS".to_string(), "true".to_string()),
            ("TAX_RATE_BASIS_POINTS".to_string(), "500".to_string()),
            ("ADMIN_EMAIL".to_string(), "admin@booktech.io".to_string()),
        ])))
        .unwrap();

        assert_eq!(settings.port, 8082);
        assert_eq!(settings.admin_email.as_deref(), Some("admin@booktech.io"));
        assert_eq!(settings.admin_password, None);

        let policy = settings.policy();
        assert!(policy.allow_demo_orders);
        assert_eq!(policy.tax_rate_basis_points, 500);
        assert_eq!(policy.author_royalty_percent, 70);
        assert_eq!(policy.currency, "USD");
    }
}
