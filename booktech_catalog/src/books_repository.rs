pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use crate::api::{
    Book, BookDetails, BookDetailsPatch, BookId, BookQuery, BookStatus, BookSummary, NewReview,
    Review, ReviewId, UserId,
};

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("User {user_id} already reviewed book {book_id}")]
    AlreadyReviewed { book_id: BookId, user_id: UserId },

    #[error("Failed to deserialize book: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Adds book to repository in pending approval state, returns an id assigned to the book
    async fn add_book(
        &self,
        author_id: UserId,
        details: BookDetails,
    ) -> Result<BookId, BookRepositoryError>;
    /// Merges the patch into the stored details
    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookDetailsPatch,
    ) -> Result<(), BookRepositoryError>;
    async fn set_status(&self, book_id: BookId, status: BookStatus)
        -> Result<(), BookRepositoryError>;
    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError>;
    /// Retrieves the book together with its rating
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError>;
    /// Lists books matching the query, ordered by id
    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, BookRepositoryError>;
    /// One review per user and book
    async fn add_review(
        &self,
        book_id: BookId,
        user_id: UserId,
        review: NewReview,
    ) -> Result<ReviewId, BookRepositoryError>;
    async fn list_reviews(&self, book_id: BookId) -> Result<Vec<Review>, BookRepositoryError>;
}
