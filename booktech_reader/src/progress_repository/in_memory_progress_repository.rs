use std::collections::HashMap;

use crate::api::{BookId, ProgressUpdateOutcome, ReadingProgress, ReadingTimeReport, UserId};
use crate::progress_repository::{ProgressRepository, ProgressRepositoryError, ReadingTotals};

#[derive(Default)]
pub struct InMemoryProgressRepository {
    progress: parking_lot::RwLock<HashMap<(UserId, BookId), ReadingProgress>>,
    totals: parking_lot::RwLock<HashMap<UserId, ReadingTotals>>,
}

#[async_trait::async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, ProgressRepositoryError> {
        Ok(self.progress.read().get(&(user_id, book_id)).cloned())
    }

    async fn list_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ReadingProgress>, ProgressRepositoryError> {
        let mut result: Vec<ReadingProgress> = self
            .progress
            .read()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, progress)| progress.clone())
            .collect();
        result.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.book_id.cmp(&b.book_id))
        });
        Ok(result)
    }

    async fn save_progress(
        &self,
        user_id: UserId,
        progress: ReadingProgress,
    ) -> Result<ProgressUpdateOutcome, ProgressRepositoryError> {
        let mut stored = self.progress.write();
        let key = (user_id, progress.book_id);
        match stored.get(&key) {
            Some(current) if current.updated_at > progress.updated_at => {
                Ok(ProgressUpdateOutcome {
                    accepted: false,
                    progress: current.clone(),
                })
            }
            _ => {
                stored.insert(key, progress.clone());
                Ok(ProgressUpdateOutcome {
                    accepted: true,
                    progress,
                })
            }
        }
    }

    async fn add_reading_time(
        &self,
        user_id: UserId,
        _book_id: BookId,
        report: ReadingTimeReport,
    ) -> Result<(), ProgressRepositoryError> {
        let mut totals = self.totals.write();
        let user_totals = totals.entry(user_id).or_default();
        user_totals.seconds += report.seconds;
        user_totals.pages += report.pages as u64;
        Ok(())
    }

    async fn reading_totals(
        &self,
        user_id: UserId,
    ) -> Result<ReadingTotals, ProgressRepositoryError> {
        Ok(self.totals.read().get(&user_id).cloned().unwrap_or_default())
    }
}
