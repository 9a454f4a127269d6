use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub use booktech_common::api::UserId;

pub type BookId = i32;
pub type ReviewId = i32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::PendingApproval => "pending_approval",
            BookStatus::Approved => "approved",
            BookStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending_approval" => Some(BookStatus::PendingApproval),
            "approved" => Some(BookStatus::Approved),
            "rejected" => Some(BookStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Chapter {
    pub title: String,
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Struct representing details of the book as submitted by its author
pub struct BookDetails {
    pub title: String,
    /// Display name of the author
    pub author: String,
    pub description: String,
    /// Price in minor currency units
    pub price: i64,
    pub category: String,
    pub cover_image: String,
    pub tags: Vec<String>,
    /// Premium books are part of the premium subscription
    pub premium: bool,
    pub chapters: Vec<Chapter>,
}

impl BookDetails {
    pub fn total_pages(&self) -> u32 {
        self.chapters
            .iter()
            .map(|chapter| chapter.pages)
            .sum::<u32>()
            .max(1)
    }

    pub fn validation_error(&self) -> Option<String> {
        if self.title.trim().is_empty() {
            Some("Title must not be empty".to_string())
        } else if self.price < 0 {
            Some("Price must not be negative".to_string())
        } else if self.chapters.iter().any(|chapter| chapter.pages == 0) {
            Some("Chapters must have at least one page".to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Struct representing a patch to book details. Allows to specify only a few fields and patch the current details
pub struct BookDetailsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<Chapter>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
/// Stored book with its moderation state and rating
pub struct Book {
    pub book_id: BookId,
    pub author_id: UserId,
    pub status: BookStatus,
    /// Average review rating, 0 when there are no reviews
    pub rating: f64,
    pub review_count: u32,
    pub total_pages: u32,
    pub details: BookDetails,
}

impl Book {
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            book_id: self.book_id,
            author_id: self.author_id,
            title: self.details.title.clone(),
            author: self.details.author.clone(),
            price: self.details.price,
            category: self.details.category.clone(),
            cover_image: self.details.cover_image.clone(),
            premium: self.details.premium,
            status: self.status,
            rating: self.rating,
            review_count: self.review_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
pub struct BookSummary {
    pub book_id: BookId,
    pub author_id: UserId,
    pub title: String,
    pub author: String,
    pub price: i64,
    pub category: String,
    pub cover_image: String,
    pub premium: bool,
    pub status: BookStatus,
    pub rating: f64,
    pub review_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
pub struct GetAllBooksResponse {
    pub books: Vec<BookSummary>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Filters for the book listing, all of them optional
pub struct BookQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Case insensitive match on title, author and description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
}

impl BookQuery {
    pub fn matches(&self, book: &Book) -> bool {
        let details = &book.details;
        if self.status.is_some_and(|status| status != book.status) {
            return false;
        }
        if self.author_id.is_some_and(|author_id| author_id != book.author_id) {
            return false;
        }
        if let Some(category) = &self.category {
            if !details.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !details.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            return [&details.title, &details.author, &details.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookStatusUpdate {
    pub status: BookStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct NewReview {
    /// 1 to 5 stars
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Review {
    pub review_id: ReviewId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: i64,
}
