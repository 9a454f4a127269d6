use std::sync::Arc;

use actix_web::{App, HttpServer};
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use booktech_common::auth::{RemoteSessionVerifier, SessionVerifier};
use booktech_common::telemetry::init_telemetry;
use booktech_reader::app_config::config_app;
use booktech_reader::progress_repository::{
    InMemoryProgressRepository, PostgresProgressRepository, PostgresProgressRepositoryConfig,
    ProgressRepository,
};
use booktech_reader::settings::Settings;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("booktech_reader")?;
    let settings = Settings::load()?;
    tracing::info!("starting HTTP server at http://0.0.0.0:{}", settings.port);

    let progress_repository: Arc<dyn ProgressRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryProgressRepository::default())
    } else {
        Arc::new(
            PostgresProgressRepository::init(PostgresProgressRepositoryConfig {
                hostname: settings.db_host.clone(),
                username: settings.db_username.clone(),
                password: settings.db_password.clone(),
            })
            .await?,
        )
    };
    let session_verifier: Arc<dyn SessionVerifier> =
        Arc::new(RemoteSessionVerifier::new(&settings.store_url)?);

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::new(progress_repository.clone()))
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
