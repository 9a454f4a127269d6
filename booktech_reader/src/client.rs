use anyhow::{bail, Context};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    BookId, ProgressUpdate, ProgressUpdateOutcome, ReadingProgress, ReadingStats,
    ReadingTimeReport,
};
use crate::reading_session::ProgressSync;

pub struct BookTechReaderClient {
    url: String,
    token: Option<String>,
    client: ClientWithMiddleware,
}

impl BookTechReaderClient {
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

    /// Calls GET /api/progress/{book_id} endpoint
    /// None if the user never opened the book
    pub async fn get_progress(&self, book_id: BookId) -> anyhow::Result<Option<ReadingProgress>> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/api/progress/{}", self.url, book_id)),
            )
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get progress of book {}: {}", book_id, response.status())
        }
    }

    /// Calls PUT /api/progress/{book_id} endpoint
    pub async fn update_progress(
        &self,
        book_id: BookId,
        update: &ProgressUpdate,
    ) -> anyhow::Result<ProgressUpdateOutcome> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/api/progress/{}", self.url, book_id)),
            )
            .json(update)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to update progress of book {} {}", book_id, error)
        }
    }

    /// Calls GET /api/progress endpoint
    pub async fn list_progress(&self) -> anyhow::Result<Vec<ReadingProgress>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/progress", self.url)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to list progress: {}", response.status())
        }
    }

    /// Calls POST /api/progress/{book_id}/time endpoint
    pub async fn report_reading_time(
        &self,
        book_id: BookId,
        report: &ReadingTimeReport,
    ) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/progress/{}/time", self.url, book_id)),
            )
            .json(report)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to report reading time: {}", response.status())
        }
    }

    /// Calls GET /api/progress/stats endpoint
    pub async fn get_stats(&self) -> anyhow::Result<ReadingStats> {
        let response = self
            .authorized(self.client.get(format!("{}/api/progress/stats", self.url)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get reading stats: {}", response.status())
        }
    }
}

#[async_trait::async_trait]
impl ProgressSync for BookTechReaderClient {
    async fn fetch(&self, book_id: BookId) -> anyhow::Result<Option<ReadingProgress>> {
        self.get_progress(book_id).await
    }

    async fn push(
        &self,
        book_id: BookId,
        update: ProgressUpdate,
    ) -> anyhow::Result<ProgressUpdateOutcome> {
        self.update_progress(book_id, &update).await
    }

    async fn report_time(&self, book_id: BookId, report: ReadingTimeReport) -> anyhow::Result<()> {
        self.report_reading_time(book_id, &report).await
    }
}
