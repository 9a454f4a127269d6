use paperclip::actix::web;

use crate::handlers;
use crate::handlers::{accounts, commerce, support, wallet};

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/session")
                        .route(web::post().to(accounts::login))
                        .route(web::get().to(accounts::whoami))
                        .route(web::delete().to(accounts::logout)),
                )
                .service(
                    web::resource("/users")
                        .route(web::get().to(accounts::get_all_users))
                        .route(web::post().to(accounts::create_user)),
                )
                .service(
                    web::resource("/orders").route(web::get().to(commerce::get_managed_orders)),
                )
                .service(
                    web::resource("/settlements")
                        .route(web::get().to(wallet::get_all_settlements)),
                )
                .service(web::resource("/tickets").route(web::get().to(support::get_all_tickets)))
                .service(
                    web::scope("/order/{order_id}")
                        .service(web::resource("").route(web::get().to(commerce::get_order)))
                        .service(
                            web::resource("/status")
                                .route(web::put().to(commerce::update_order_status)),
                        )
                        .service(
                            web::resource("/payment")
                                .route(web::post().to(commerce::confirm_order_payment)),
                        ),
                )
                .service(
                    web::resource("/settlement/{settlement_id}/decision")
                        .route(web::put().to(wallet::decide_settlement)),
                )
                .service(
                    web::scope("/ticket/{ticket_id}")
                        .service(web::resource("").route(web::get().to(support::get_ticket)))
                        .service(
                            web::resource("/messages")
                                .route(web::post().to(support::reply_to_ticket)),
                        )
                        .service(
                            web::resource("/status")
                                .route(web::put().to(support::update_ticket_status)),
                        ),
                )
                .service(
                    web::scope("/user")
                        .service(web::resource("").route(web::post().to(accounts::signup)))
                        .service(
                            web::scope("/{user_id}")
                                .service(
                                    web::resource("")
                                        .route(web::get().to(accounts::get_user))
                                        .route(web::patch().to(accounts::update_user)),
                                )
                                .service(
                                    web::resource("/subscription")
                                        .route(web::put().to(accounts::set_subscription)),
                                )
                                .service(
                                    web::resource("/referrals")
                                        .route(web::get().to(accounts::get_referrals)),
                                )
                                .service(
                                    web::resource("/cart")
                                        .route(web::get().to(commerce::get_cart))
                                        .route(web::delete().to(commerce::clear_cart)),
                                )
                                .service(
                                    web::resource("/cart/{book_id}")
                                        .route(web::put().to(commerce::set_cart_item))
                                        .route(web::delete().to(commerce::remove_cart_item)),
                                )
                                .service(
                                    web::resource("/wishlist")
                                        .route(web::get().to(commerce::get_wishlist)),
                                )
                                .service(
                                    web::resource("/wishlist/{book_id}")
                                        .route(web::post().to(commerce::add_to_wishlist))
                                        .route(web::delete().to(commerce::remove_from_wishlist)),
                                )
                                .service(
                                    web::resource("/orders")
                                        .route(web::get().to(commerce::get_user_orders))
                                        .route(web::post().to(commerce::checkout)),
                                )
                                .service(
                                    web::resource("/wallet")
                                        .route(web::get().to(wallet::get_wallet)),
                                )
                                .service(
                                    web::resource("/settlements")
                                        .route(web::get().to(wallet::get_user_settlements))
                                        .route(web::post().to(wallet::create_settlement)),
                                )
                                .service(
                                    web::resource("/tickets")
                                        .route(web::get().to(support::get_user_tickets))
                                        .route(web::post().to(support::create_ticket)),
                                )
                                .service(
                                    web::resource("/notifications")
                                        .route(web::get().to(support::get_notifications)),
                                )
                                .service(
                                    web::resource("/notifications/read")
                                        .route(web::post().to(support::mark_all_notifications_read)),
                                )
                                .service(
                                    web::resource("/notifications/{notification_id}/read")
                                        .route(web::post().to(support::mark_notification_read)),
                                ),
                        ),
                ),
        );
}
