pub use in_memory_store_repository::InMemoryStoreRepository;
pub use postgres_store_repository::{PostgresStoreRepository, PostgresStoreRepositoryConfig};

use crate::api::{
    BookId, Caller, CartItem, NewTicket, Notification, NotificationId, Order, OrderId,
    OrderStatus, Payment, ProfilePatch, Role, Settlement, SettlementId, SettlementRequest,
    SettlementStatus, SettlementVerdict, ShippingAddress, StatusChange, SubscriptionTier, Ticket,
    TicketId, TicketMessage, TicketStatus, Transaction, TransactionKind, UserId, UserProfile,
    Wallet,
};

mod in_memory_store_repository;
mod postgres_store_repository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Email {0} already registered")]
    EmailTaken(String),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Order {0} was changed concurrently")]
    OrderChanged(OrderId),

    #[error("User {user_id} has {balance} but {required} is required")]
    InsufficientFunds {
        user_id: UserId,
        balance: i64,
        required: i64,
    },

    #[error("Settlement {0} not found")]
    SettlementNotFound(SettlementId),

    #[error("Settlement {0} was already decided")]
    SettlementAlreadyDecided(SettlementId),

    #[error("Ticket {0} not found")]
    TicketNotFound(TicketId),

    #[error("Ticket {0} is closed")]
    TicketClosed(TicketId),

    #[error("Notification {0} not found")]
    NotificationNotFound(NotificationId),

    #[error("Failed to deserialize record: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// User record as created by signup, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub password_salt: String,
    pub referral_code: String,
    pub referred_by: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: UserId,
    pub role: Role,
    pub password_hash: String,
    pub password_salt: String,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<crate::api::OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderFilter {
    All,
    Customer(UserId),
    /// Orders containing at least one book of the author
    Author(UserId),
    Statuses(Vec<OrderStatus>),
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Customer(user_id) => order.user_id == *user_id,
            OrderFilter::Author(author_id) => order.involves_author(*author_id),
            OrderFilter::Statuses(statuses) => statuses.contains(&order.status),
        }
    }
}

#[async_trait::async_trait]
pub trait UsersRepository: Send + Sync {
    /// Fails with EmailTaken if the email (case insensitive) is already used
    async fn add_user(&self, user: NewUser) -> Result<UserId, StoreError>;

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, StoreError>;

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError>;

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, StoreError>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserId>, StoreError>;

    async fn list_referred_users(&self, referrer: UserId) -> Result<Vec<UserId>, StoreError>;

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<UserProfile, StoreError>;

    async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
    ) -> Result<(), StoreError>;

    async fn create_session(&self, token: &str, caller: Caller) -> Result<(), StoreError>;

    async fn find_session(&self, token: &str) -> Result<Option<Caller>, StoreError>;

    async fn delete_session(&self, token: &str) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait CommerceRepository: Send + Sync {
    /// Sets the quantity of the book in the cart, adds the line if missing
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: u32,
    ) -> Result<(), StoreError>;

    async fn remove_from_cart(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError>;

    /// Lines in the order they were added
    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError>;

    async fn clear_cart(&self, user_id: UserId) -> Result<(), StoreError>;

    async fn add_to_wishlist(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError>;

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<(), StoreError>;

    async fn get_wishlist(&self, user_id: UserId) -> Result<Vec<BookId>, StoreError>;

    /// Stores the order in pending state
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Order, StoreError>;

    /// Newest first
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Replaces the order if its stored status still equals `expected_status`
    async fn update_order(
        &self,
        order: Order,
        expected_status: OrderStatus,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait WalletRepository: Send + Sync {
    /// Empty wallet for users that never had a transaction
    async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, StoreError>;

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError>;

    /// Never takes the balance below zero
    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError>;

    async fn create_settlement(
        &self,
        user_id: UserId,
        request: SettlementRequest,
    ) -> Result<Settlement, StoreError>;

    async fn get_settlement(&self, settlement_id: SettlementId) -> Result<Settlement, StoreError>;

    /// Newest first
    async fn list_settlements(
        &self,
        user_id: Option<UserId>,
        status: Option<SettlementStatus>,
    ) -> Result<Vec<Settlement>, StoreError>;

    /// Pending settlements only. Approval debits the wallet in the same step,
    /// a balance that no longer covers the amount leaves the settlement pending
    async fn decide_settlement(
        &self,
        settlement_id: SettlementId,
        verdict: SettlementVerdict,
        note: Option<String>,
    ) -> Result<Settlement, StoreError>;
}

#[async_trait::async_trait]
pub trait SupportRepository: Send + Sync {
    async fn create_ticket(
        &self,
        user_id: UserId,
        role: Role,
        ticket: NewTicket,
    ) -> Result<Ticket, StoreError>;

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError>;

    /// All tickets when no user is given, most recently updated first
    async fn list_tickets(&self, user_id: Option<UserId>) -> Result<Vec<Ticket>, StoreError>;

    /// Appends the message and moves the status as `Ticket::status_after_reply` says
    async fn add_ticket_message(
        &self,
        ticket_id: TicketId,
        message: TicketMessage,
    ) -> Result<Ticket, StoreError>;

    async fn set_ticket_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, StoreError>;

    async fn push_notification(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
    ) -> Result<Notification, StoreError>;

    /// Newest first
    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError>;

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), StoreError>;

    /// Returns the number of notifications that were unread
    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u32, StoreError>;
}

pub trait StoreRepository:
    UsersRepository + CommerceRepository + WalletRepository + SupportRepository
{
}

impl<T> StoreRepository for T where
    T: UsersRepository + CommerceRepository + WalletRepository + SupportRepository
{
}

fn status_change(status: OrderStatus, changed_by: UserId, changed_at: i64) -> StatusChange {
    StatusChange {
        status,
        changed_by,
        changed_at,
    }
}
