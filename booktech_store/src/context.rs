use std::sync::Arc;

use crate::api::UserId;
use crate::catalog_lookup::BookCatalog;
use crate::payment_gateway::PaymentGateway;
use crate::store_repository::StoreRepository;

/// Business constants of the store, amounts in minor units
#[derive(Debug, Clone)]
pub struct StorePolicy {
    pub tax_rate_basis_points: u32,
    /// Share of a delivered line credited to the book's author
    pub author_royalty_percent: u32,
    pub referrer_reward: i64,
    pub referee_reward: i64,
    /// Record card orders while the payment gateway is down
    pub allow_demo_orders: bool,
    pub currency: String,
    /// Public key the client needs to open the hosted checkout
    pub payment_key_id: String,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            tax_rate_basis_points: 1800,
            author_royalty_percent: 70,
            referrer_reward: 500,
            referee_reward: 250,
            allow_demo_orders: false,
            currency: "USD".to_string(),
            payment_key_id: String::new(),
        }
    }
}

pub struct StoreContext {
    pub repository: Arc<dyn StoreRepository>,
    pub catalog: Arc<dyn BookCatalog>,
    pub payments: Arc<dyn PaymentGateway>,
    pub policy: StorePolicy,
}

impl StoreContext {
    /// Notifications never fail the operation that triggers them
    pub async fn notify(&self, user_id: UserId, title: &str, message: &str) {
        if let Err(err) = self
            .repository
            .push_notification(user_id, title, message)
            .await
        {
            tracing::warn!("Failed to notify user {}: {}", user_id, err);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::catalog_lookup::testing::StaticBookCatalog;
    use crate::context::{StoreContext, StorePolicy};
    use crate::payment_gateway::testing::FakePaymentGateway;
    use crate::store_repository::InMemoryStoreRepository;

    /// Catalog with book 1 ($10, author 10) and book 2 ($15, author 11)
    pub fn store_context(policy: StorePolicy, gateway: FakePaymentGateway) -> StoreContext {
        StoreContext {
            repository: Arc::new(InMemoryStoreRepository::default()),
            catalog: Arc::new(
                StaticBookCatalog::default()
                    .with_book(1, "Ten dollar book", 10, 1000)
                    .with_book(2, "Fifteen dollar book", 11, 1500)
                    .with_unpurchasable_book(3),
            ),
            payments: Arc::new(gateway),
            policy,
        }
    }
}
