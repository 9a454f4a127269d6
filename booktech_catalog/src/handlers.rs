use std::sync::Arc;

use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use booktech_common::api::{Caller, Role};
use booktech_common::auth::MaybeCaller;

use crate::api::{
    Book, BookDetails, BookDetailsPatch, BookId, BookQuery, BookStatus, BookStatusUpdate,
    GetAllBooksResponse, NewReview,
};
use crate::books_repository::{BookRepository, BookRepositoryError};

type Books = Data<Arc<dyn BookRepository>>;

fn repository_failure(operation: &str, err: BookRepositoryError) -> HttpResponse {
    match err {
        BookRepositoryError::NotFound(_) => HttpResponse::NotFound().finish(),
        BookRepositoryError::AlreadyReviewed { .. } => {
            HttpResponse::Conflict().json(err.to_string())
        }
        err => {
            tracing::error!("{} failed {}", operation, err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Approved books are public, the rest only for the author and admins
fn visible_to(book: &Book, caller: Option<&Caller>) -> bool {
    book.status == BookStatus::Approved
        || caller.is_some_and(|caller| caller.can_act_for(book.author_id))
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_all_books(
    books_repository: Books,
    caller: MaybeCaller,
    query: web::Query<BookQuery>,
) -> Result<HttpResponse, Error> {
    let mut query = query.into_inner();
    let sees_everything = match (&caller.0, query.author_id) {
        (Some(caller), _) if caller.is_admin() => true,
        (Some(caller), Some(author_id)) => caller.user_id == author_id,
        _ => false,
    };
    if !sees_everything {
        query.status = Some(BookStatus::Approved);
    }

    Ok(match books_repository.list_books(&query).await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => repository_failure("Get all books", err),
    })
}

#[api_v2_operation]
pub async fn add_book(
    books_repository: Books,
    caller: Caller,
    details: web::Json<BookDetails>,
) -> Result<HttpResponse, Error> {
    if !matches!(caller.role, Role::Author | Role::Admin) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let details = details.into_inner();
    if let Some(error) = details.validation_error() {
        return Ok(HttpResponse::BadRequest().json(error));
    }

    Ok(
        match books_repository.add_book(caller.user_id, details).await {
            Ok(book_id) => {
                tracing::info!("Author {} submitted book {}", caller.user_id, book_id);
                HttpResponse::Created()
                    .append_header((LOCATION, format!("/api/book/{}", book_id)))
                    .finish()
            }
            Err(err) => repository_failure("Add book", err),
        },
    )
}

#[api_v2_operation]
pub async fn update_book(
    books_repository: Books,
    caller: Caller,
    book_id: web::Path<BookId>,
    patch: web::Json<BookDetailsPatch>,
) -> Result<HttpResponse, Error> {
    let book_id = book_id.into_inner();
    let patch = patch.into_inner();

    let book = match books_repository.get_book(book_id).await {
        Ok(book) => book,
        Err(err) => return Ok(repository_failure("Update book", err)),
    };
    if !caller.can_act_for(book.author_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    if patch.title.as_ref().is_some_and(|t| t.trim().is_empty())
        || patch.price.is_some_and(|price| price < 0)
    {
        return Ok(HttpResponse::BadRequest().json("Invalid title or price"));
    }

    if let Err(err) = books_repository.update_book(book_id, patch).await {
        return Ok(repository_failure("Update book", err));
    }

    // Author edits of a published book go through approval again
    if !caller.is_admin() && book.status == BookStatus::Approved {
        if let Err(err) = books_repository
            .set_status(book_id, BookStatus::PendingApproval)
            .await
        {
            return Ok(repository_failure("Update book", err));
        }
    }
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_book(
    books_repository: Books,
    caller: MaybeCaller,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.get_book(book_id.into_inner()).await {
            Ok(book) if visible_to(&book, caller.0.as_ref()) => HttpResponse::Ok().json(book),
            Ok(_) => HttpResponse::NotFound().finish(),
            Err(err) => repository_failure("Get book", err),
        },
    )
}

#[api_v2_operation]
pub async fn delete_book(
    books_repository: Books,
    caller: Caller,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    let book_id = book_id.into_inner();
    let book = match books_repository.get_book(book_id).await {
        Ok(book) => book,
        Err(err) => return Ok(repository_failure("Delete book", err)),
    };
    if !caller.can_act_for(book.author_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match books_repository.delete_book(book_id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => repository_failure("Delete book", err),
    })
}

#[api_v2_operation]
pub async fn set_book_status(
    books_repository: Books,
    caller: Caller,
    book_id: web::Path<BookId>,
    update: web::Json<BookStatusUpdate>,
) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let book_id = book_id.into_inner();
    let status = update.into_inner().status;
    Ok(match books_repository.set_status(book_id, status).await {
        Ok(()) => {
            tracing::info!("Book {} moved to {}", book_id, status.as_str());
            HttpResponse::Ok().finish()
        }
        Err(err) => repository_failure("Set book status", err),
    })
}

#[api_v2_operation]
pub async fn add_review(
    books_repository: Books,
    caller: Caller,
    book_id: web::Path<BookId>,
    review: web::Json<NewReview>,
) -> Result<HttpResponse, Error> {
    let book_id = book_id.into_inner();
    let review = review.into_inner();
    if !(1..=5).contains(&review.rating) {
        return Ok(HttpResponse::BadRequest().json("Rating must be between 1 and 5"));
    }

    match books_repository.get_book(book_id).await {
        Ok(book) if book.status == BookStatus::Approved => {}
        Ok(_) => return Ok(HttpResponse::NotFound().finish()),
        Err(err) => return Ok(repository_failure("Add review", err)),
    }

    Ok(
        match books_repository
            .add_review(book_id, caller.user_id, review)
            .await
        {
            Ok(review_id) => HttpResponse::Created().json(review_id),
            Err(err) => repository_failure("Add review", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_reviews(
    books_repository: Books,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.list_reviews(book_id.into_inner()).await {
            Ok(reviews) => HttpResponse::Ok().json(reviews),
            Err(err) => repository_failure("Get reviews", err),
        },
    )
}
