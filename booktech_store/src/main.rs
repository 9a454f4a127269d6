use std::sync::Arc;

use actix_web::{App, HttpServer};
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use booktech_common::auth::SessionVerifier;
use booktech_common::telemetry::init_telemetry;
use booktech_store::accounts::{bootstrap_admin, RepositorySessionVerifier};
use booktech_store::app_config::config_app;
use booktech_store::catalog_lookup::CatalogServiceLookup;
use booktech_store::context::StoreContext;
use booktech_store::payment_gateway::HttpPaymentGateway;
use booktech_store::settings::Settings;
use booktech_store::store_repository::{
    InMemoryStoreRepository, PostgresStoreRepository, PostgresStoreRepositoryConfig,
    StoreRepository,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("booktech_store")?;
    let settings = Settings::load()?;
    tracing::info!("starting HTTP server at http://0.0.0.0:{}", settings.port);

    let repository: Arc<dyn StoreRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryStoreRepository::default())
    } else {
        Arc::new(
            PostgresStoreRepository::init(PostgresStoreRepositoryConfig {
                hostname: settings.db_host.clone(),
                username: settings.db_username.clone(),
                password: settings.db_password.clone(),
            })
            .await?,
        )
    };
    if settings.payment_key_id.is_empty() {
        tracing::warn!("No payment gateway keys configured, card checkout is unavailable");
    }

    let context = web::Data::new(StoreContext {
        repository: repository.clone(),
        catalog: Arc::new(CatalogServiceLookup::new(&settings.catalog_url)?),
        payments: Arc::new(HttpPaymentGateway::new(
            &settings.payment_gateway_url,
            &settings.payment_key_id,
            &settings.payment_key_secret,
        )?),
        policy: settings.policy(),
    });
    if let (Some(email), Some(password)) = (&settings.admin_email, &settings.admin_password) {
        bootstrap_admin(&context, email, password).await?;
    }
    let session_verifier: Arc<dyn SessionVerifier> =
        Arc::new(RepositorySessionVerifier::new(repository));

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(context.clone())
            .app_data(web::Data::new(session_verifier.clone()))
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind(("0.0.0.0", settings.port))?
    .run()
    .await?;
    Ok(())
}
