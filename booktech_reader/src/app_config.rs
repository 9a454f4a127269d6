use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api").service(
                web::scope("/progress")
                    .service(web::resource("").route(web::get().to(handlers::get_all_progress)))
                    .service(web::resource("/stats").route(web::get().to(handlers::get_stats)))
                    .service(
                        web::resource("/{book_id}")
                            .route(web::get().to(handlers::get_progress))
                            .route(web::put().to(handlers::update_progress)),
                    )
                    .service(
                        web::resource("/{book_id}/time")
                            .route(web::post().to(handlers::report_reading_time)),
                    ),
            ),
        );
}
