use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use serde_json::json;

use booktech_common::clock::now_secs;

use crate::api::{
    Book, BookDetails, BookDetailsPatch, BookId, BookQuery, BookStatus, BookSummary, NewReview,
    Review, ReviewId, UserId,
};
use crate::books_repository::{BookRepository, BookRepositoryError};

struct StoredBook {
    author_id: UserId,
    status: BookStatus,
    details: BookDetails,
}

pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI32,
    review_sequence_generator: AtomicI32,
    books: parking_lot::RwLock<HashMap<BookId, StoredBook>>,
    reviews: parking_lot::RwLock<HashMap<BookId, Vec<Review>>>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self {
            book_sequence_generator: AtomicI32::new(1),
            review_sequence_generator: AtomicI32::new(1),
            books: Default::default(),
            reviews: Default::default(),
        }
    }
}

impl InMemoryBookRepository {
    fn to_book(&self, book_id: BookId, stored: &StoredBook) -> Book {
        let reviews = self.reviews.read();
        let book_reviews = reviews.get(&book_id).map(Vec::as_slice).unwrap_or_default();
        let rating = if book_reviews.is_empty() {
            0.0
        } else {
            book_reviews.iter().map(|r| r.rating as f64).sum::<f64>() / book_reviews.len() as f64
        };

        Book {
            book_id,
            author_id: stored.author_id,
            status: stored.status,
            rating,
            review_count: book_reviews.len() as u32,
            total_pages: stored.details.total_pages(),
            details: stored.details.clone(),
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn add_book(
        &self,
        author_id: UserId,
        details: BookDetails,
    ) -> Result<BookId, BookRepositoryError> {
        let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed);
        self.books.write().insert(
            id,
            StoredBook {
                author_id,
                status: BookStatus::PendingApproval,
                details,
            },
        );
        Ok(id)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookDetailsPatch,
    ) -> Result<(), BookRepositoryError> {
        let mut locked_books = self.books.write();
        let book = locked_books
            .get_mut(&book_id)
            .ok_or(BookRepositoryError::NotFound(book_id))?;
        let mut result_details = json!(book.details);
        json_patch::merge(&mut result_details, &json!(patch));
        book.details = serde_json::from_value(result_details)?;
        Ok(())
    }

    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
    ) -> Result<(), BookRepositoryError> {
        self.books
            .write()
            .get_mut(&book_id)
            .map(|book| book.status = status)
            .ok_or(BookRepositoryError::NotFound(book_id))
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        self.books
            .write()
            .remove(&book_id)
            .ok_or(BookRepositoryError::NotFound(book_id))?;
        self.reviews.write().remove(&book_id);
        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let books = self.books.read();
        books
            .get(&book_id)
            .map(|stored| self.to_book(book_id, stored))
            .ok_or(BookRepositoryError::NotFound(book_id))
    }

    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, BookRepositoryError> {
        let books = self.books.read();
        let mut matching: Vec<BookSummary> = books
            .iter()
            .map(|(&book_id, stored)| self.to_book(book_id, stored))
            .filter(|book| query.matches(book))
            .map(|book| book.summary())
            .collect();
        matching.sort_by_key(|summary| summary.book_id);
        Ok(matching)
    }

    async fn add_review(
        &self,
        book_id: BookId,
        user_id: UserId,
        review: NewReview,
    ) -> Result<ReviewId, BookRepositoryError> {
        if !self.books.read().contains_key(&book_id) {
            return Err(BookRepositoryError::NotFound(book_id));
        }

        let mut reviews = self.reviews.write();
        let book_reviews = match reviews.entry(book_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(vec![]),
        };
        if book_reviews.iter().any(|r| r.user_id == user_id) {
            return Err(BookRepositoryError::AlreadyReviewed { book_id, user_id });
        }

        let review_id = self.review_sequence_generator.fetch_add(1, Ordering::Relaxed);
        book_reviews.push(Review {
            review_id,
            book_id,
            user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: now_secs(),
        });
        Ok(review_id)
    }

    async fn list_reviews(&self, book_id: BookId) -> Result<Vec<Review>, BookRepositoryError> {
        if !self.books.read().contains_key(&book_id) {
            return Err(BookRepositoryError::NotFound(book_id));
        }
        Ok(self
            .reviews
            .read()
            .get(&book_id)
            .cloned()
            .unwrap_or_default())
    }
}
