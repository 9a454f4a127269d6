use std::sync::Arc;
use std::time::UNIX_EPOCH;

use booktech_catalog::api::{BookDetails, BookDetailsPatch, BookQuery, BookStatus, Chapter, NewReview};
use booktech_catalog::client::BookTechCatalogClient;
use booktech_reader::api::ProgressUpdate;
use booktech_reader::client::BookTechReaderClient;
use booktech_reader::reading_session::ReadingSession;
use booktech_store::api::{
    CheckoutRequest, NewTicket, OrderStatus, PaymentMethod, Role, ShippingAddress, SignupRequest,
    TicketStatus, UserId,
};
use booktech_store::client::BookTechStoreClient;

use crate::service_url;

fn catalog_url() -> String {
    service_url("CATALOG_URL", "http://127.0.0.1:8080")
}

fn store_url() -> String {
    service_url("STORE_URL", "http://127.0.0.1:8082")
}

fn reader_url() -> String {
    service_url("READER_URL", "http://127.0.0.1:8084")
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

/// Signs up a new user and returns its id and session token
async fn signup_and_login(
    store: &BookTechStoreClient,
    name: &str,
    role: Role,
    referral_code: Option<String>,
) -> (UserId, String) {
    let email = format!("{}_{}@booktech.test", name, unique_suffix());
    let user_id = store
        .signup(&SignupRequest {
            email: email.clone(),
            name: name.to_string(),
            password: "secret-password".to_string(),
            role: Some(role),
            referral_code,
        })
        .await
        .expect("Failed to sign up");
    let session = store
        .login(&email, "secret-password")
        .await
        .expect("Failed to log in")
        .expect("Login rejected");
    assert_eq!(session.user_id, user_id);
    (user_id, session.token)
}

async fn admin_token(store: &BookTechStoreClient) -> String {
    let email = service_url("ADMIN_EMAIL", "admin@booktech.io");
    let password = service_url("ADMIN_PASSWORD", "admin-password");
    store
        .login(&email, &password)
        .await
        .expect("Failed to log in")
        .expect("Admin account is not bootstrapped")
        .token
}

fn sample_book(title: &str) -> BookDetails {
    BookDetails {
        title: title.to_string(),
        author: "Jane Writer".to_string(),
        description: "A book written for the system tests".to_string(),
        price: 49_900,
        category: "fiction".to_string(),
        cover_image: "https://covers.booktech.test/1.png".to_string(),
        tags: vec!["test".to_string()],
        premium: false,
        chapters: vec![
            Chapter {
                title: "One".to_string(),
                pages: 120,
            },
            Chapter {
                title: "Two".to_string(),
                pages: 180,
            },
        ],
    }
}

/// Adds a book as a new author and approves it as admin
async fn approved_book(title: &str) -> (UserId, booktech_catalog::api::BookId) {
    let store = BookTechStoreClient::new(&store_url()).expect("Failed to create store client");
    let (author_id, author_token) = signup_and_login(&store, "author", Role::Author, None).await;
    let catalog = BookTechCatalogClient::new(&catalog_url())
        .expect("Failed to create catalog client")
        .with_token(&author_token);

    let book_id = catalog
        .add_book(sample_book(title))
        .await
        .expect("Failed to add book");

    let admin_catalog = BookTechCatalogClient::new(&catalog_url())
        .expect("Failed to create catalog client")
        .with_token(&admin_token(&store).await);
    admin_catalog
        .set_book_status(book_id, BookStatus::Approved)
        .await
        .expect("Failed to approve book");
    (author_id, book_id)
}

#[tokio::test]
/// Author publishes a book
/// Pending book is hidden from the public listing until approved
/// Author patches it and a customer reviews it
async fn booktech_catalog_e2e_test() {
    let store = BookTechStoreClient::new(&store_url()).expect("Failed to create store client");
    let (author_id, author_token) = signup_and_login(&store, "author", Role::Author, None).await;
    let author_catalog = BookTechCatalogClient::new(&catalog_url())
        .expect("Failed to create catalog client")
        .with_token(&author_token);
    let public_catalog =
        BookTechCatalogClient::new(&catalog_url()).expect("Failed to create catalog client");

    let title = format!("Catalog test {}", unique_suffix());
    let book_id = author_catalog
        .add_book(sample_book(&title))
        .await
        .expect("Failed to add book");

    let book = author_catalog
        .get_book(book_id)
        .await
        .expect("Failed to get book")
        .expect("Book not found");
    assert_eq!(book.author_id, author_id);
    assert_eq!(book.status, BookStatus::PendingApproval);
    assert_eq!(book.total_pages, 300);

    let search = BookQuery {
        search: Some(title.clone()),
        ..BookQuery::default()
    };
    let listed = public_catalog
        .list_books(&search)
        .await
        .expect("Failed to list books");
    assert!(listed.is_empty());

    let admin_catalog = BookTechCatalogClient::new(&catalog_url())
        .expect("Failed to create catalog client")
        .with_token(&admin_token(&store).await);
    admin_catalog
        .set_book_status(book_id, BookStatus::Approved)
        .await
        .expect("Failed to approve book");

    author_catalog
        .update_book(
            book_id,
            BookDetailsPatch {
                price: Some(39_900),
                ..BookDetailsPatch::default()
            },
        )
        .await
        .expect("Failed to patch book");

    let listed = public_catalog
        .list_books(&search)
        .await
        .expect("Failed to list books");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].book_id, book_id);
    assert_eq!(listed[0].price, 39_900);

    let (_, customer_token) = signup_and_login(&store, "reviewer", Role::Customer, None).await;
    let customer_catalog = BookTechCatalogClient::new(&catalog_url())
        .expect("Failed to create catalog client")
        .with_token(&customer_token);
    let review_id = customer_catalog
        .add_review(
            book_id,
            NewReview {
                rating: 4,
                comment: "Good read".to_string(),
            },
        )
        .await
        .expect("Failed to add review");
    assert!(review_id.is_some());

    let reviews = public_catalog
        .list_reviews(book_id)
        .await
        .expect("Failed to list reviews");
    assert_eq!(reviews.len(), 1);

    let book = public_catalog
        .get_book(book_id)
        .await
        .expect("Failed to get book")
        .expect("Book not found");
    assert_eq!(book.review_count, 1);
    assert_eq!(book.rating, 4.0);
}

#[tokio::test]
/// Referral rewards both users
/// Customer fills the cart, checks out with cash on delivery
/// The author confirms the order, the customer may not ship it
/// Customer opens a ticket and gets notified about the admin reply
async fn booktech_store_e2e_test() {
    let (_, book_id) = approved_book(&format!("Store test {}", unique_suffix())).await;
    let store = BookTechStoreClient::new(&store_url()).expect("Failed to create store client");

    // REFERRAL
    let (referrer_id, referrer_token) =
        signup_and_login(&store, "referrer", Role::Customer, None).await;
    let referrer_store = BookTechStoreClient::new(&store_url())
        .expect("Failed to create store client")
        .with_token(&referrer_token);
    let referral_code = referrer_store
        .get_referrals(referrer_id)
        .await
        .expect("Failed to get referrals")
        .referral_code;

    let (customer_id, customer_token) =
        signup_and_login(&store, "customer", Role::Customer, Some(referral_code)).await;
    let customer_store = BookTechStoreClient::new(&store_url())
        .expect("Failed to create store client")
        .with_token(&customer_token);

    let referrals = referrer_store
        .get_referrals(referrer_id)
        .await
        .expect("Failed to get referrals");
    assert_eq!(referrals.referred_users, 1);
    assert_eq!(referrals.total_earned, 500);
    let wallet = customer_store
        .get_wallet(customer_id)
        .await
        .expect("Failed to get wallet");
    assert_eq!(wallet.balance, 250);

    // CART
    assert!(customer_store
        .set_cart_item(customer_id, book_id, 2)
        .await
        .expect("Failed to update cart"));
    let cart = customer_store
        .get_cart(customer_id)
        .await
        .expect("Failed to get cart");
    assert_eq!(cart.summary.subtotal, 99_800);
    assert_eq!(cart.summary.tax, 17_964);
    assert_eq!(cart.summary.total, 117_764);

    // CHECKOUT
    let checkout = customer_store
        .checkout(
            customer_id,
            &CheckoutRequest {
                shipping_address: ShippingAddress {
                    full_name: "Test Customer".to_string(),
                    line1: "1 Test Street".to_string(),
                    city: "Testville".to_string(),
                    postal_code: "00001".to_string(),
                    country: "IN".to_string(),
                    phone: "+910000000000".to_string(),
                },
                payment_method: PaymentMethod::CashOnDelivery,
            },
        )
        .await
        .expect("Failed to check out");
    let order_id = checkout.order.order_id;
    assert_eq!(checkout.order.status, OrderStatus::Pending);
    assert!(checkout.payment_session.is_none());
    assert!(customer_store
        .get_cart(customer_id)
        .await
        .expect("Failed to get cart")
        .lines
        .is_empty());

    // ORDER STATUS
    assert!(!customer_store
        .update_order_status(order_id, OrderStatus::Shipped)
        .await
        .expect("Failed to update order"));

    let admin_store = BookTechStoreClient::new(&store_url())
        .expect("Failed to create store client")
        .with_token(&admin_token(&store).await);
    assert!(admin_store
        .update_order_status(order_id, OrderStatus::Confirmed)
        .await
        .expect("Failed to update order"));

    let order = customer_store
        .get_order(order_id)
        .await
        .expect("Failed to get order")
        .expect("Order not found");
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.history.len(), 2);

    let (_, stranger_token) = signup_and_login(&store, "stranger", Role::Customer, None).await;
    let stranger_store = BookTechStoreClient::new(&store_url())
        .expect("Failed to create store client")
        .with_token(&stranger_token);
    assert!(stranger_store.get_order(order_id).await.is_err());

    // SUPPORT
    let ticket = customer_store
        .create_ticket(
            customer_id,
            &NewTicket {
                subject: "Where is my book".to_string(),
                message: "Ordered yesterday".to_string(),
            },
        )
        .await
        .expect("Failed to open ticket");
    assert_eq!(ticket.status, TicketStatus::Open);

    let ticket = admin_store
        .reply_to_ticket(ticket.ticket_id, "On its way")
        .await
        .expect("Failed to reply");
    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(ticket.messages.len(), 2);

    let notifications = customer_store
        .get_notifications(customer_id)
        .await
        .expect("Failed to get notifications");
    assert!(notifications.unread_count >= 1);
    let marked = customer_store
        .mark_all_notifications_read(customer_id)
        .await
        .expect("Failed to mark notifications");
    assert_eq!(marked, notifications.unread_count);
}

#[tokio::test]
/// Two devices read the same book
/// The newer page wins and the stats count the reading time
async fn booktech_reader_e2e_test() {
    let (_, book_id) = approved_book(&format!("Reader test {}", unique_suffix())).await;
    let store = BookTechStoreClient::new(&store_url()).expect("Failed to create store client");
    let (_, token) = signup_and_login(&store, "reader", Role::Customer, None).await;

    let reader = Arc::new(
        BookTechReaderClient::new(&reader_url())
            .expect("Failed to create reader client")
            .with_token(&token),
    );
    assert!(reader
        .get_progress(book_id)
        .await
        .expect("Failed to get progress")
        .is_none());

    let session = ReadingSession::open(reader.clone(), book_id, 300).await;
    let local = session.go_to_page(80).await;
    assert_eq!(local.page, 80);

    let stored = reader
        .get_progress(book_id)
        .await
        .expect("Failed to get progress")
        .expect("Progress not stored");
    assert_eq!(stored.page, 80);

    // another device
    let outcome = reader
        .update_progress(
            book_id,
            &ProgressUpdate {
                page: 120,
                total_pages: 300,
                updated_at: Some(local.updated_at + 1_000),
            },
        )
        .await
        .expect("Failed to update progress");
    assert!(outcome.accepted);

    session.poll().await;
    assert_eq!(session.current().page, 120);
    assert_eq!(session.current().percent, 40);

    session.next_page().await;
    session.report_reading_time().await;
    session.close().await;

    let stats = reader.get_stats().await.expect("Failed to get stats");
    assert_eq!(stats.books_in_progress, 1);
    assert_eq!(stats.books_finished, 0);
    assert_eq!(stats.total_pages_turned, 2);

    let all = reader.list_progress().await.expect("Failed to list progress");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].page, 121);
}
