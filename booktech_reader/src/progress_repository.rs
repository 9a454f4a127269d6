pub use in_memory_progress_repository::InMemoryProgressRepository;
pub use postgres_progress_repository::{
    PostgresProgressRepository, PostgresProgressRepositoryConfig,
};

use crate::api::{BookId, ProgressUpdateOutcome, ReadingProgress, ReadingTimeReport, UserId};

mod in_memory_progress_repository;
mod postgres_progress_repository;

#[derive(thiserror::Error, Debug)]
pub enum ProgressRepositoryError {
    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Reading time summed over all reports of a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingTotals {
    pub seconds: u64,
    pub pages: u64,
}

#[async_trait::async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn get_progress(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, ProgressRepositoryError>;

    /// Most recently updated first
    async fn list_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ReadingProgress>, ProgressRepositoryError>;

    /// Stores the progress unless the stored one has a later `updated_at`
    async fn save_progress(
        &self,
        user_id: UserId,
        progress: ReadingProgress,
    ) -> Result<ProgressUpdateOutcome, ProgressRepositoryError>;

    async fn add_reading_time(
        &self,
        user_id: UserId,
        book_id: BookId,
        report: ReadingTimeReport,
    ) -> Result<(), ProgressRepositoryError>;

    async fn reading_totals(&self, user_id: UserId)
        -> Result<ReadingTotals, ProgressRepositoryError>;
}
