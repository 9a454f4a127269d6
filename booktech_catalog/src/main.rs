use std::sync::Arc;

use actix_web::{App, HttpServer};
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use booktech_catalog::app_config::config_app;
use booktech_catalog::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
    PostgresBooksRepositoryConfig,
};
use booktech_catalog::settings::Settings;
use booktech_common::auth::{RemoteSessionVerifier, SessionVerifier};
use booktech_common::telemetry::init_telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("booktech_catalog")?;
    let settings = Settings::load()?;
    tracing::info!("starting HTTP server at http://0.0.0.0:{}", settings.port);

    let books_repository: Arc<dyn BookRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(PostgresBooksRepositoryConfig {
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
            .app_data(web::Data::new(books_repository.clone()))
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
