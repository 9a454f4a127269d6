use anyhow::{bail, Context};
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    Book, BookDetails, BookDetailsPatch, BookId, BookQuery, BookStatus, BookStatusUpdate,
    BookSummary, GetAllBooksResponse, NewReview, Review, ReviewId,
};

pub struct BookTechCatalogClient {
    url: String,
    token: Option<String>,
    client: ClientWithMiddleware,
}

impl BookTechCatalogClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            url: url.to_string(),
            token: None,
            client,
        })
    }

    /// Sends the bearer token with every request
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Calls POST /api/book endpoint
    /// Returns book_id of added book in response
    pub async fn add_book(&self, book_details: BookDetails) -> anyhow::Result<BookId> {
        let response = self
            .authorized(self.client.post(format!("{}/api/book", self.url)))
            .json(&book_details)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to add book {}", error)
        }

        let location_header = response
            .headers()
            .get(LOCATION)
            .context("No location header")?;

        location_header
            .to_str()
            .context("Failed to convert header to str")?
            .strip_prefix("/api/book/")
            .context("Invalid location header")?
            .parse()
            .context("Failed to parse book id")
    }

    /// Calls GET /api/book/{book_id} endpoint
    /// None if the book does not exist or is not visible to the caller
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<Book>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/book/{}", self.url, book_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to get book {}", error)
        }
    }

    /// Calls GET /api/books endpoint
    pub async fn list_books(&self, query: &BookQuery) -> anyhow::Result<Vec<BookSummary>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/books", self.url)))
            .query(query)
            .send()
            .await?;
        if response.status().is_success() {
            let books: GetAllBooksResponse = response.json().await?;
            Ok(books.books)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list books {}", error)
        }
    }

    /// Calls PATCH /api/book/{book_id} endpoint
    pub async fn update_book(&self, book_id: BookId, patch: BookDetailsPatch) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .patch(format!("{}/api/book/{}", self.url, book_id)),
            )
            .json(&patch)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to update book {} {}", book_id, error)
        }
    }

    /// Calls PUT /api/book/{book_id}/status endpoint, admin only
    pub async fn set_book_status(&self, book_id: BookId, status: BookStatus) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/api/book/{}/status", self.url, book_id)),
            )
            .json(&BookStatusUpdate { status })
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to set status of book {}: {}", book_id, response.status())
        }
    }

    /// Calls DELETE /api/book/{book_id} endpoint
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/api/book/{}", self.url, book_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to delete book {}: {}", book_id, response.status())
        }
    }

    /// Calls POST /api/book/{book_id}/reviews endpoint
    /// Returns None if the user already reviewed the book
    pub async fn add_review(
        &self,
        book_id: BookId,
        review: NewReview,
    ) -> anyhow::Result<Option<ReviewId>> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/book/{}/reviews", self.url, book_id)),
            )
            .json(&review)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to add review {}", error)
        }
    }

    /// Calls GET /api/book/{book_id}/reviews endpoint
    pub async fn list_reviews(&self, book_id: BookId) -> anyhow::Result<Vec<Review>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}/reviews", self.url, book_id))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to list reviews of book {}: {}", book_id, response.status())
        }
    }
}
