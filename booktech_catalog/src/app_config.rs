use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(web::resource("/books").route(web::get().to(handlers::get_all_books)))
                .service(
                    web::scope("/book")
                        .service(web::resource("").route(web::post().to(handlers::add_book)))
                        .service(
                            web::scope("/{book_id}")
                                .service(
                                    web::resource("")
                                        .route(web::get().to(handlers::get_book))
                                        .route(web::patch().to(handlers::update_book))
                                        .route(web::delete().to(handlers::delete_book)),
                                )
                                .service(
                                    web::resource("/status")
                                        .route(web::put().to(handlers::set_book_status)),
                                )
                                .service(
                                    web::resource("/reviews")
                                        .route(web::get().to(handlers::get_reviews))
                                        .route(web::post().to(handlers::add_review)),
                                ),
                        ),
                ),
        );
}
