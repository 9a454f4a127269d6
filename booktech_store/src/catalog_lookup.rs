use anyhow::Context;

use booktech_catalog::client::BookTechCatalogClient;

use crate::api::{BookId, UserId};

/// What the store needs to know about a book to sell it
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub book_id: BookId,
    pub title: String,
    pub author_id: UserId,
    pub price: i64,
    /// Only approved books can be bought
    pub purchasable: bool,
}

#[async_trait::async_trait]
pub trait BookCatalog: Send + Sync {
    /// None when the catalog does not know the book
    async fn find_book(&self, book_id: BookId) -> anyhow::Result<Option<CatalogEntry>>;
}

/// Resolves books over HTTP against the catalog service
pub struct CatalogServiceLookup {
    client: BookTechCatalogClient,
}

impl CatalogServiceLookup {
    pub fn new(catalog_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: BookTechCatalogClient::new(catalog_url)
                .context("Failed to create catalog client")?,
        })
    }
}

#[async_trait::async_trait]
impl BookCatalog for CatalogServiceLookup {
    async fn find_book(&self, book_id: BookId) -> anyhow::Result<Option<CatalogEntry>> {
        // Anonymous lookups only see approved books
        let book = self
            .client
            .get_book(book_id)
            .await
            .with_context(|| format!("Failed to look up book {}", book_id))?;
        Ok(book.map(|book| CatalogEntry {
            book_id: book.book_id,
            title: book.details.title,
            author_id: book.author_id,
            price: book.details.price,
            purchasable: book.status == booktech_catalog::api::BookStatus::Approved,
        }))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub struct StaticBookCatalog {
        books: HashMap<BookId, CatalogEntry>,
    }

    impl StaticBookCatalog {
        pub fn with_book(
            mut self,
            book_id: BookId,
            title: &str,
            author_id: UserId,
            price: i64,
        ) -> Self {
            self.books.insert(
                book_id,
                CatalogEntry {
                    book_id,
                    title: title.to_string(),
                    author_id,
                    price,
                    purchasable: true,
                },
            );
            self
        }

        pub fn with_unpurchasable_book(mut self, book_id: BookId) -> Self {
            self.books.insert(
                book_id,
                CatalogEntry {
                    book_id,
                    title: "Withdrawn".to_string(),
                    author_id: 0,
                    price: 0,
                    purchasable: false,
                },
            );
            self
        }
    }

    #[async_trait::async_trait]
    impl BookCatalog for StaticBookCatalog {
        async fn find_book(&self, book_id: BookId) -> anyhow::Result<Option<CatalogEntry>> {
            Ok(self.books.get(&book_id).cloned())
        }
    }
}
