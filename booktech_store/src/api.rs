use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub use booktech_catalog::api::BookId;
pub use booktech_common::api::{Caller, Role, UserId};

pub type OrderId = i32;
pub type TransactionId = i32;
pub type SettlementId = i32;
pub type TicketId = i32;
pub type NotificationId = i32;

// Accounts

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(SubscriptionTier::Free),
            "premium" => Some(SubscriptionTier::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    /// Customer when not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Referral code of an existing user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub subscription: SubscriptionTier,
    pub referral_code: String,
    pub referred_by: Option<UserId>,
    pub created_at: i64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SubscriptionUpdate {
    pub tier: SubscriptionTier,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: UserId,
    pub role: Role,
}

// Cart and wishlist

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CartItem {
    pub book_id: BookId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CartQuantity {
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CartLine {
    pub book_id: BookId,
    pub title: String,
    pub author_id: UserId,
    pub unit_price: i64,
    pub quantity: u32,
    pub line_total: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Amounts in minor currency units
pub struct CheckoutSummary {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Books in the cart that can no longer be bought
    pub unavailable: Vec<BookId>,
    pub summary: CheckoutSummary,
}

// Orders

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Wallet,
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    /// Recorded while the payment gateway was unreachable
    Demo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct OrderItem {
    pub book_id: BookId,
    pub title: String,
    pub author_id: UserId,
    pub unit_price: i64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub changed_by: UserId,
    pub changed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub history: Vec<StatusChange>,
}

impl Order {
    pub fn involves_author(&self, author_id: UserId) -> bool {
        self.items.iter().any(|item| item.author_id == author_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Hosted payment flow the client opens with the gateway checkout script
pub struct PaymentSession {
    pub gateway_order_id: String,
    pub key_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub payment_session: Option<PaymentSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct PaymentConfirmation {
    pub gateway_payment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

// Wallet, referrals and settlements

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    ReferralReward,
    OrderPayment,
    Refund,
    Royalty,
    Settlement,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::ReferralReward => "referral_reward",
            TransactionKind::OrderPayment => "order_payment",
            TransactionKind::Refund => "refund",
            TransactionKind::Royalty => "royalty",
            TransactionKind::Settlement => "settlement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "referral_reward" => Some(TransactionKind::ReferralReward),
            "order_payment" => Some(TransactionKind::OrderPayment),
            "refund" => Some(TransactionKind::Refund),
            "royalty" => Some(TransactionKind::Royalty),
            "settlement" => Some(TransactionKind::Settlement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    /// Positive for credits, negative for debits
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: i64,
    /// Newest first
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referred_users: u32,
    pub total_earned: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Completed,
    Rejected,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Completed => "completed",
            SettlementStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SettlementStatus::Pending),
            "completed" => Some(SettlementStatus::Completed),
            "rejected" => Some(SettlementStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BankAccount {
    pub account_holder: String,
    pub account_number: String,
    pub routing_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SettlementRequest {
    pub amount: i64,
    pub bank_account: BankAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Settlement {
    pub settlement_id: SettlementId,
    pub user_id: UserId,
    pub amount: i64,
    pub bank_account: BankAccount,
    pub status: SettlementStatus,
    pub requested_at: i64,
    pub decided_at: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementVerdict {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SettlementDecision {
    pub verdict: SettlementVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SettlementQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SettlementStatus>,
}

// Support and notifications

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct TicketMessage {
    pub author_id: UserId,
    pub author_role: Role,
    pub body: String,
    pub sent_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub subject: String,
    pub status: TicketStatus,
    pub messages: Vec<TicketMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Ticket {
    /// Status after a reply by the given role, None when the ticket takes no more replies
    pub fn status_after_reply(&self, role: Role) -> Option<TicketStatus> {
        match (self.status, role) {
            (TicketStatus::Closed, _) => None,
            (TicketStatus::Open, Role::Admin) => Some(TicketStatus::InProgress),
            // The customer answering a resolved ticket reopens it
            (TicketStatus::Resolved, role) if role != Role::Admin => Some(TicketStatus::Open),
            (status, _) => Some(status),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct NewTicket {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct TicketReply {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct TicketStatusUpdate {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Notification {
    pub notification_id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct NotificationsOverview {
    pub unread_count: u32,
    /// Newest first
    pub notifications: Vec<Notification>,
}

impl NotificationsOverview {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            unread_count: notifications.iter().filter(|n| !n.read).count() as u32,
            notifications,
        }
    }
}
