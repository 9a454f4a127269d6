use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub use booktech_catalog::api::BookId;
pub use booktech_common::api::UserId;

/// Longest stretch a single reading time report may cover
pub const MAX_REPORTED_SECONDS: u64 = 60 * 60;

/// How far ahead of the server clock a client change may be dated
pub const MAX_CLOCK_SKEW_MILLIS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Where a user stands in one book
pub struct ReadingProgress {
    pub book_id: BookId,
    /// 1 based, never above total_pages
    pub page: u32,
    pub total_pages: u32,
    /// Rounded page / total_pages in percent
    pub percent: u32,
    /// Time of the change on the client, ms since epoch
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ProgressUpdate {
    pub page: u32,
    pub total_pages: u32,
    /// Server time is used when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ProgressUpdateOutcome {
    /// False when the stored progress is newer than the update
    pub accepted: bool,
    /// Progress as stored after the update
    pub progress: ReadingProgress,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ReadingTimeReport {
    pub seconds: u64,
    /// Pages turned during those seconds
    pub pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ReadingStats {
    pub total_seconds: u64,
    pub total_pages_turned: u64,
    pub books_in_progress: u32,
    pub books_finished: u32,
}
