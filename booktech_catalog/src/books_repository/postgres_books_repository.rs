use anyhow::Context;
use serde_json::json;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row, Statement};

use booktech_common::clock::now_secs;

use crate::api::{
    Book, BookDetails, BookDetailsPatch, BookId, BookQuery, BookStatus, BookSummary, NewReview,
    Review, ReviewId, UserId,
};
use crate::books_repository::BookRepositoryError::Other;
use crate::books_repository::{BookRepository, BookRepositoryError};

const SELECT_BOOKS_WITH_RATING: &str = "
    SELECT b.id, b.author_id, b.status, b.params,
           COALESCE(AVG(r.rating)::FLOAT8, 0), COUNT(r.id)
    FROM books b LEFT JOIN reviews r ON r.book_id = b.id";

pub struct PostgresBooksRepository {
    client: Client,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!("Connecting to postgres at {}", config.hostname);
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id              SERIAL PRIMARY KEY,
            author_id       INTEGER NOT NULL,
            status          TEXT NOT NULL,
            params          JSONB
            );
        CREATE TABLE IF NOT EXISTS reviews (
            id              SERIAL PRIMARY KEY,
            book_id         INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            user_id         INTEGER NOT NULL,
            rating          SMALLINT NOT NULL,
            comment         TEXT NOT NULL,
            created_at      BIGINT NOT NULL,
            UNIQUE (book_id, user_id)
            );
        ",
            )
            .await
            .context("Failed to setup tables")?;
        Ok(Self { client })
    }

    fn book_from_row(row: &Row) -> Result<Book, BookRepositoryError> {
        let status: String = row.try_get(2)?;
        let details: BookDetails = serde_json::from_value(row.try_get(3)?)?;
        let review_count: i64 = row.try_get(5)?;
        Ok(Book {
            book_id: row.try_get(0)?,
            author_id: row.try_get(1)?,
            status: BookStatus::parse(&status)
                .ok_or_else(|| Other(format!("Unknown book status {}", status)))?,
            rating: row.try_get(4)?,
            review_count: review_count as u32,
            total_pages: details.total_pages(),
            details,
        })
    }

    async fn ensure_book_exists(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let rows = self
            .client
            .query("SELECT id FROM books WHERE id = $1", &[&book_id])
            .await?;
        if rows.is_empty() {
            Err(BookRepositoryError::NotFound(book_id))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn add_book(
        &self,
        author_id: UserId,
        details: BookDetails,
    ) -> Result<BookId, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("INSERT INTO books (author_id, status, params) VALUES ($1, $2, $3) RETURNING id")
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &author_id,
                    &BookStatus::PendingApproval.as_str(),
                    &json!(details),
                ],
            )
            .await?;

        let book_id: BookId = rows
            .first()
            .ok_or_else(|| Other("Id not returned".to_string()))?
            .try_get(0)?;

        Ok(book_id)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookDetailsPatch,
    ) -> Result<(), BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("UPDATE books SET params = params || ($1)::JSONB WHERE id = ($2) RETURNING id")
            .await?;

        let rows = self.client.query(&stmt, &[&json!(patch), &book_id]).await?;
        if rows.is_empty() {
            Err(BookRepositoryError::NotFound(book_id))
        } else {
            Ok(())
        }
    }

    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
    ) -> Result<(), BookRepositoryError> {
        let updated = self
            .client
            .execute(
                "UPDATE books SET status = $1 WHERE id = $2",
                &[&status.as_str(), &book_id],
            )
            .await?;
        if updated == 0 {
            Err(BookRepositoryError::NotFound(book_id))
        } else {
            Ok(())
        }
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let deleted = self
            .client
            .execute("DELETE FROM books WHERE id = $1", &[&book_id])
            .await?;
        if deleted == 0 {
            Err(BookRepositoryError::NotFound(book_id))
        } else {
            Ok(())
        }
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "{} WHERE b.id = $1 GROUP BY b.id",
                SELECT_BOOKS_WITH_RATING
            ))
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;

        Self::book_from_row(rows.first().ok_or(BookRepositoryError::NotFound(book_id))?)
    }

    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookSummary>, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "{} GROUP BY b.id ORDER BY b.id",
                SELECT_BOOKS_WITH_RATING
            ))
            .await?;

        let rows = self.client.query(&stmt, &[]).await?;

        let mut books = vec![];
        for row in rows.iter() {
            let book = Self::book_from_row(row)?;
            if query.matches(&book) {
                books.push(book.summary());
            }
        }
        Ok(books)
    }

    async fn add_review(
        &self,
        book_id: BookId,
        user_id: UserId,
        review: NewReview,
    ) -> Result<ReviewId, BookRepositoryError> {
        self.ensure_book_exists(book_id).await?;

        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO reviews (book_id, user_id, rating, comment, created_at) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &book_id,
                    &user_id,
                    &(review.rating as i16),
                    &review.comment,
                    &now_secs(),
                ],
            )
            .await;

        match rows {
            Ok(rows) => Ok(rows
                .first()
                .ok_or_else(|| Other("Id not returned".to_string()))?
                .try_get(0)?),
            Err(err)
                if err
                    .as_db_error()
                    .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
                    .unwrap_or_default() =>
            {
                Err(BookRepositoryError::AlreadyReviewed { book_id, user_id })
            }
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn list_reviews(&self, book_id: BookId) -> Result<Vec<Review>, BookRepositoryError> {
        self.ensure_book_exists(book_id).await?;

        let rows = self
            .client
            .query(
                "SELECT id, book_id, user_id, rating, comment, created_at \
                 FROM reviews WHERE book_id = $1 ORDER BY id",
                &[&book_id],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let rating: i16 = row.try_get(3)?;
                Ok(Review {
                    review_id: row.try_get(0)?,
                    book_id: row.try_get(1)?,
                    user_id: row.try_get(2)?,
                    rating: rating as u8,
                    comment: row.try_get(4)?,
                    created_at: row.try_get(5)?,
                })
            })
            .collect()
    }
}
