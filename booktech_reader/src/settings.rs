use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    /// Store service resolving bearer tokens
    pub store_url: String,
}

impl Settings {
    /// Defaults overridden by environment variables, e.g. `DB_HOST` or `STORE_URL`
    pub fn load() -> anyhow::Result<Self> {
        Self::from_env(None)
    }

    fn from_env(env: Option<HashMap<String, String>>) -> anyhow::Result<Self> {
        config::Config::builder()
            .set_default("port", 8084)?
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("store_url", "http://localhost:8082")?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read reader settings")?
            .try_deserialize()
            .context("Invalid reader settings")
    }
}
