use anyhow::Context;
use tokio_postgres::{Client, NoTls, Row};

use crate::api::{BookId, ProgressUpdateOutcome, ReadingProgress, ReadingTimeReport, UserId};
use crate::progress_repository::{ProgressRepository, ProgressRepositoryError, ReadingTotals};

const PROGRESS_COLUMNS: &str = "book_id, page, total_pages, percent, updated_at";

pub struct PostgresProgressRepository {
    client: Client,
}

pub struct PostgresProgressRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl PostgresProgressRepository {
    pub async fn init(config: PostgresProgressRepositoryConfig) -> anyhow::Result<Self> {
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
        CREATE TABLE IF NOT EXISTS reading_progress (
            user_id         INTEGER NOT NULL,
            book_id         INTEGER NOT NULL,
            page            INTEGER NOT NULL,
            total_pages     INTEGER NOT NULL,
            percent         INTEGER NOT NULL,
            updated_at      BIGINT NOT NULL,
            PRIMARY KEY (user_id, book_id)
            );
        CREATE TABLE IF NOT EXISTS reading_time (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            book_id         INTEGER NOT NULL,
            seconds         BIGINT NOT NULL,
            pages           BIGINT NOT NULL
            );
        ",
            )
            .await
            .context("Failed to setup tables")?;
        Ok(Self { client })
    }

    fn progress_from_row(row: &Row) -> Result<ReadingProgress, ProgressRepositoryError> {
        let page: i32 = row.try_get(1)?;
        let total_pages: i32 = row.try_get(2)?;
        let percent: i32 = row.try_get(3)?;
        Ok(ReadingProgress {
            book_id: row.try_get(0)?,
            page: page as u32,
            total_pages: total_pages as u32,
            percent: percent as u32,
            updated_at: row.try_get(4)?,
        })
    }
}

#[async_trait::async_trait]
impl ProgressRepository for PostgresProgressRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, ProgressRepositoryError> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT {} FROM reading_progress WHERE user_id = $1 AND book_id = $2",
                    PROGRESS_COLUMNS
                ),
                &[&user_id, &book_id],
            )
            .await?;
        rows.first().map(Self::progress_from_row).transpose()
    }

    async fn list_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ReadingProgress>, ProgressRepositoryError> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT {} FROM reading_progress WHERE user_id = $1 ORDER BY updated_at DESC, book_id",
                    PROGRESS_COLUMNS
                ),
                &[&user_id],
            )
            .await?;
        rows.iter().map(Self::progress_from_row).collect()
    }

    async fn save_progress(
        &self,
        user_id: UserId,
        progress: ReadingProgress,
    ) -> Result<ProgressUpdateOutcome, ProgressRepositoryError> {
        // The conditional upsert returns no row when the stored progress is newer
        let rows = self
            .client
            .query(
                &format!(
                    "INSERT INTO reading_progress (user_id, book_id, page, total_pages, percent, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (user_id, book_id) DO UPDATE SET
                        page = EXCLUDED.page,
                        total_pages = EXCLUDED.total_pages,
                        percent = EXCLUDED.percent,
                        updated_at = EXCLUDED.updated_at
                     WHERE reading_progress.updated_at <= EXCLUDED.updated_at
                     RETURNING {}",
                    PROGRESS_COLUMNS
                ),
                &[
                    &user_id,
                    &progress.book_id,
                    &(progress.page as i32),
                    &(progress.total_pages as i32),
                    &(progress.percent as i32),
                    &progress.updated_at,
                ],
            )
            .await?;
        if let Some(row) = rows.first() {
            return Ok(ProgressUpdateOutcome {
                accepted: true,
                progress: Self::progress_from_row(row)?,
            });
        }

        let stored = self
            .get_progress(user_id, progress.book_id)
            .await?
            .ok_or_else(|| ProgressRepositoryError::Other("Progress vanished".to_string()))?;
        Ok(ProgressUpdateOutcome {
            accepted: false,
            progress: stored,
        })
    }

    async fn add_reading_time(
        &self,
        user_id: UserId,
        book_id: BookId,
        report: ReadingTimeReport,
    ) -> Result<(), ProgressRepositoryError> {
        self.client
            .execute(
                "INSERT INTO reading_time (user_id, book_id, seconds, pages) VALUES ($1, $2, $3, $4)",
                &[
                    &user_id,
                    &book_id,
                    &(report.seconds as i64),
                    &(report.pages as i64),
                ],
            )
            .await?;
        Ok(())
    }

    async fn reading_totals(
        &self,
        user_id: UserId,
    ) -> Result<ReadingTotals, ProgressRepositoryError> {
        let rows = self
            .client
            .query(
                "SELECT COALESCE(SUM(seconds), 0)::BIGINT, COALESCE(SUM(pages), 0)::BIGINT
                 FROM reading_time WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| ProgressRepositoryError::Other("Totals not returned".to_string()))?;
        let seconds: i64 = row.try_get(0)?;
        let pages: i64 = row.try_get(1)?;
        Ok(ReadingTotals {
            seconds: seconds as u64,
            pages: pages as u64,
        })
    }
}

#[cfg(test)]
mod postgres_progress_repository_tests {
    use serial_test::file_serial;
    use testcontainers::core::IntoContainerPort;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, GenericImage, ImageExt};

    use crate::api::{ReadingProgress, ReadingTimeReport};
    use crate::progress_repository::{
        PostgresProgressRepository, PostgresProgressRepositoryConfig, ProgressRepository,
        ReadingTotals,
    };

    async fn start_postgres_container_and_init_repo(
    ) -> (ContainerAsync<GenericImage>, PostgresProgressRepository) {
        let _pg_container = GenericImage::new("postgres", "latest")
            .with_mapped_port(5432, 5432.tcp())
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await
            .expect("Failed to start postgres");

        for _ in 0..10 {
            if let Ok(repo) = PostgresProgressRepository::init(PostgresProgressRepositoryConfig {
                hostname: "127.0.0.1".to_string(),
                username: "postgres".to_string(),
                password: "postgres".to_string(),
            })
            .await
            {
                return (_pg_container, repo);
            }
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }
        panic!("Failed to setup postgres container")
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Progress writes with last writer wins and reading time totals in one container
    async fn test_progress_lifecycle() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        assert_eq!(repo.get_progress(1, 7).await.unwrap(), None);
        let outcome = repo
            .save_progress(1, ReadingProgress::new(7, 120, 300, 2_000))
            .await
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.progress.percent, 40);

        let stale = repo
            .save_progress(1, ReadingProgress::new(7, 80, 300, 1_000))
            .await
            .unwrap();
        assert!(!stale.accepted);
        assert_eq!(stale.progress.page, 120);

        repo.save_progress(1, ReadingProgress::new(8, 3, 10, 3_000))
            .await
            .unwrap();
        let listed = repo.list_progress(1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].book_id, 8);

        repo.add_reading_time(1, 7, ReadingTimeReport { seconds: 30, pages: 4 })
            .await
            .unwrap();
        repo.add_reading_time(1, 8, ReadingTimeReport { seconds: 12, pages: 1 })
            .await
            .unwrap();
        assert_eq!(
            repo.reading_totals(1).await.unwrap(),
            ReadingTotals {
                seconds: 42,
                pages: 5
            }
        );
        assert_eq!(repo.reading_totals(2).await.unwrap(), ReadingTotals::default());
    }
}
