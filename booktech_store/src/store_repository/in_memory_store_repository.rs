use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use booktech_common::clock::now_millis;

use crate::api::{
    BookId, Caller, CartItem, NewTicket, Notification, NotificationId, Order, OrderId,
    OrderStatus, ProfilePatch, Role, Settlement, SettlementId, SettlementRequest,
    SettlementStatus, SettlementVerdict, SubscriptionTier, Ticket, TicketId, TicketMessage,
    TicketStatus, Transaction, TransactionKind, UserId, UserProfile, Wallet,
};
use crate::store_repository::{
    status_change, CommerceRepository, Credentials, NewOrder, NewUser, OrderFilter, StoreError,
    SupportRepository, UsersRepository, WalletRepository,
};

struct StoredUser {
    profile: UserProfile,
    password_hash: String,
    password_salt: String,
}

pub struct InMemoryStoreRepository {
    user_sequence_generator: AtomicI32,
    order_sequence_generator: AtomicI32,
    transaction_sequence_generator: AtomicI32,
    settlement_sequence_generator: AtomicI32,
    ticket_sequence_generator: AtomicI32,
    notification_sequence_generator: AtomicI32,
    users: parking_lot::RwLock<HashMap<UserId, StoredUser>>,
    sessions: parking_lot::RwLock<HashMap<String, Caller>>,
    carts: parking_lot::RwLock<HashMap<UserId, Vec<CartItem>>>,
    wishlists: parking_lot::RwLock<HashMap<UserId, Vec<BookId>>>,
    orders: parking_lot::RwLock<HashMap<OrderId, Order>>,
    wallets: parking_lot::RwLock<HashMap<UserId, Vec<Transaction>>>,
    settlements: parking_lot::RwLock<HashMap<SettlementId, Settlement>>,
    tickets: parking_lot::RwLock<HashMap<TicketId, Ticket>>,
    notifications: parking_lot::RwLock<HashMap<NotificationId, Notification>>,
}

impl Default for InMemoryStoreRepository {
    fn default() -> Self {
        Self {
            user_sequence_generator: AtomicI32::new(1),
            order_sequence_generator: AtomicI32::new(1),
            transaction_sequence_generator: AtomicI32::new(1),
            settlement_sequence_generator: AtomicI32::new(1),
            ticket_sequence_generator: AtomicI32::new(1),
            notification_sequence_generator: AtomicI32::new(1),
            users: Default::default(),
            sessions: Default::default(),
            carts: Default::default(),
            wishlists: Default::default(),
            orders: Default::default(),
            wallets: Default::default(),
            settlements: Default::default(),
            tickets: Default::default(),
            notifications: Default::default(),
        }
    }
}

fn balance(transactions: &[Transaction]) -> i64 {
    transactions.iter().map(|t| t.amount).sum()
}

impl InMemoryStoreRepository {
    fn record_transaction(
        &self,
        wallets: &mut HashMap<UserId, Vec<Transaction>>,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let transactions = wallets.entry(user_id).or_default();
        let current = balance(transactions);
        if current + amount < 0 {
            return Err(StoreError::InsufficientFunds {
                user_id,
                balance: current,
                required: -amount,
            });
        }
        let transaction = Transaction {
            transaction_id: self
                .transaction_sequence_generator
                .fetch_add(1, Ordering::Relaxed),
            amount,
            kind,
            description: description.to_string(),
            created_at: now_millis(),
        };
        transactions.push(transaction.clone());
        Ok(transaction)
    }
}

#[async_trait::async_trait]
impl UsersRepository for InMemoryStoreRepository {
    async fn add_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|stored| stored.profile.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::EmailTaken(user.email));
        }
        let user_id = self.user_sequence_generator.fetch_add(1, Ordering::Relaxed);
        users.insert(
            user_id,
            StoredUser {
                profile: UserProfile {
                    user_id,
                    email: user.email,
                    name: user.name,
                    role: user.role,
                    subscription: SubscriptionTier::Free,
                    referral_code: user.referral_code,
                    referred_by: user.referred_by,
                    created_at: now_millis(),
                },
                password_hash: user.password_hash,
                password_salt: user.password_salt,
            },
        );
        Ok(user_id)
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, StoreError> {
        self.users
            .read()
            .get(&user_id)
            .map(|stored| stored.profile.clone())
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        let mut users: Vec<UserProfile> = self
            .users
            .read()
            .values()
            .map(|stored| stored.profile.clone())
            .collect();
        users.sort_by_key(|user| user.user_id);
        Ok(users)
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|stored| stored.profile.email.eq_ignore_ascii_case(email))
            .map(|stored| Credentials {
                user_id: stored.profile.user_id,
                role: stored.profile.role,
                password_hash: stored.password_hash.clone(),
                password_salt: stored.password_salt.clone(),
            }))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|stored| stored.profile.referral_code == code)
            .map(|stored| stored.profile.user_id))
    }

    async fn list_referred_users(&self, referrer: UserId) -> Result<Vec<UserId>, StoreError> {
        let mut referred: Vec<UserId> = self
            .users
            .read()
            .values()
            .filter(|stored| stored.profile.referred_by == Some(referrer))
            .map(|stored| stored.profile.user_id)
            .collect();
        referred.sort();
        Ok(referred)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let mut users = self.users.write();
        if let Some(email) = &patch.email {
            if users.values().any(|stored| {
                stored.profile.user_id != user_id && stored.profile.email.eq_ignore_ascii_case(email)
            }) {
                return Err(StoreError::EmailTaken(email.clone()));
            }
        }
        let stored = users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        if let Some(name) = patch.name {
            stored.profile.name = name;
        }
        if let Some(email) = patch.email {
            stored.profile.email = email;
        }
        Ok(stored.profile.clone())
    }

    async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
    ) -> Result<(), StoreError> {
        self.users
            .write()
            .get_mut(&user_id)
            .map(|stored| stored.profile.subscription = tier)
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn create_session(&self, token: &str, caller: Caller) -> Result<(), StoreError> {
        self.sessions.write().insert(token.to_string(), caller);
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Caller>, StoreError> {
        Ok(self.sessions.read().get(token).copied())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.write().remove(token);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CommerceRepository for InMemoryStoreRepository {
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let mut carts = self.carts.write();
        let cart = carts.entry(user_id).or_default();
        match cart.iter_mut().find(|item| item.book_id == book_id) {
            Some(item) => item.quantity = quantity,
            None => cart.push(CartItem { book_id, quantity }),
        }
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError> {
        if let Some(cart) = self.carts.write().get_mut(&user_id) {
            cart.retain(|item| item.book_id != book_id);
        }
        Ok(())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        Ok(self.carts.read().get(&user_id).cloned().unwrap_or_default())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), StoreError> {
        self.carts.write().remove(&user_id);
        Ok(())
    }

    async fn add_to_wishlist(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError> {
        let mut wishlists = self.wishlists.write();
        let wishlist = wishlists.entry(user_id).or_default();
        if !wishlist.contains(&book_id) {
            wishlist.push(book_id);
        }
        Ok(())
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<(), StoreError> {
        if let Some(wishlist) = self.wishlists.write().get_mut(&user_id) {
            wishlist.retain(|id| *id != book_id);
        }
        Ok(())
    }

    async fn get_wishlist(&self, user_id: UserId) -> Result<Vec<BookId>, StoreError> {
        Ok(self
            .wishlists
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let order_id = self.order_sequence_generator.fetch_add(1, Ordering::Relaxed);
        let now = now_millis();
        let order = Order {
            order_id,
            user_id: order.user_id,
            items: order.items,
            shipping_address: order.shipping_address,
            payment: order.payment,
            status: OrderStatus::Pending,
            subtotal: order.subtotal,
            tax: order.tax,
            total: order.total,
            created_at: now,
            updated_at: now,
            history: vec![status_change(OrderStatus::Pending, order.user_id, now)],
        };
        self.orders.write().insert(order_id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        self.orders
            .read()
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_id.cmp(&a.order_id));
        Ok(orders)
    }

    async fn update_order(
        &self,
        order: Order,
        expected_status: OrderStatus,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write();
        let stored = orders
            .get_mut(&order.order_id)
            .ok_or(StoreError::OrderNotFound(order.order_id))?;
        if stored.status != expected_status {
            return Err(StoreError::OrderChanged(order.order_id));
        }
        *stored = order;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WalletRepository for InMemoryStoreRepository {
    async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, StoreError> {
        let wallets = self.wallets.read();
        let transactions = wallets.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        Ok(Wallet {
            user_id,
            balance: balance(transactions),
            transactions: transactions.iter().rev().cloned().collect(),
        })
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let mut wallets = self.wallets.write();
        self.record_transaction(&mut wallets, user_id, amount.abs(), kind, description)
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let mut wallets = self.wallets.write();
        self.record_transaction(&mut wallets, user_id, -amount.abs(), kind, description)
    }

    async fn create_settlement(
        &self,
        user_id: UserId,
        request: SettlementRequest,
    ) -> Result<Settlement, StoreError> {
        let settlement = Settlement {
            settlement_id: self
                .settlement_sequence_generator
                .fetch_add(1, Ordering::Relaxed),
            user_id,
            amount: request.amount,
            bank_account: request.bank_account,
            status: SettlementStatus::Pending,
            requested_at: now_millis(),
            decided_at: None,
            note: None,
        };
        self.settlements
            .write()
            .insert(settlement.settlement_id, settlement.clone());
        Ok(settlement)
    }

    async fn get_settlement(&self, settlement_id: SettlementId) -> Result<Settlement, StoreError> {
        self.settlements
            .read()
            .get(&settlement_id)
            .cloned()
            .ok_or(StoreError::SettlementNotFound(settlement_id))
    }

    async fn list_settlements(
        &self,
        user_id: Option<UserId>,
        status: Option<SettlementStatus>,
    ) -> Result<Vec<Settlement>, StoreError> {
        let mut settlements: Vec<Settlement> = self
            .settlements
            .read()
            .values()
            .filter(|s| user_id.map_or(true, |user_id| s.user_id == user_id))
            .filter(|s| status.map_or(true, |status| s.status == status))
            .cloned()
            .collect();
        settlements.sort_by(|a, b| b.settlement_id.cmp(&a.settlement_id));
        Ok(settlements)
    }

    async fn decide_settlement(
        &self,
        settlement_id: SettlementId,
        verdict: SettlementVerdict,
        note: Option<String>,
    ) -> Result<Settlement, StoreError> {
        let mut settlements = self.settlements.write();
        let settlement = settlements
            .get_mut(&settlement_id)
            .ok_or(StoreError::SettlementNotFound(settlement_id))?;
        if settlement.status != SettlementStatus::Pending {
            return Err(StoreError::SettlementAlreadyDecided(settlement_id));
        }

        settlement.status = match verdict {
            SettlementVerdict::Approve => {
                let mut wallets = self.wallets.write();
                self.record_transaction(
                    &mut wallets,
                    settlement.user_id,
                    -settlement.amount,
                    TransactionKind::Settlement,
                    &format!("Settlement {}", settlement_id),
                )?;
                SettlementStatus::Completed
            }
            SettlementVerdict::Reject => SettlementStatus::Rejected,
        };
        settlement.decided_at = Some(now_millis());
        settlement.note = note;
        Ok(settlement.clone())
    }
}

#[async_trait::async_trait]
impl SupportRepository for InMemoryStoreRepository {
    async fn create_ticket(
        &self,
        user_id: UserId,
        role: Role,
        ticket: NewTicket,
    ) -> Result<Ticket, StoreError> {
        let now = now_millis();
        let ticket = Ticket {
            ticket_id: self.ticket_sequence_generator.fetch_add(1, Ordering::Relaxed),
            user_id,
            subject: ticket.subject,
            status: TicketStatus::Open,
            messages: vec![TicketMessage {
                author_id: user_id,
                author_role: role,
                body: ticket.message,
                sent_at: now,
            }],
            created_at: now,
            updated_at: now,
        };
        self.tickets.write().insert(ticket.ticket_id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.tickets
            .read()
            .get(&ticket_id)
            .cloned()
            .ok_or(StoreError::TicketNotFound(ticket_id))
    }

    async fn list_tickets(&self, user_id: Option<UserId>) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .read()
            .values()
            .filter(|t| user_id.map_or(true, |user_id| t.user_id == user_id))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.ticket_id.cmp(&a.ticket_id))
        });
        Ok(tickets)
    }

    async fn add_ticket_message(
        &self,
        ticket_id: TicketId,
        message: TicketMessage,
    ) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write();
        let ticket = tickets
            .get_mut(&ticket_id)
            .ok_or(StoreError::TicketNotFound(ticket_id))?;
        let status = ticket
            .status_after_reply(message.author_role)
            .ok_or(StoreError::TicketClosed(ticket_id))?;
        ticket.status = status;
        ticket.updated_at = message.sent_at;
        ticket.messages.push(message);
        Ok(ticket.clone())
    }

    async fn set_ticket_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write();
        let ticket = tickets
            .get_mut(&ticket_id)
            .ok_or(StoreError::TicketNotFound(ticket_id))?;
        ticket.status = status;
        ticket.updated_at = now_millis();
        Ok(ticket.clone())
    }

    async fn push_notification(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
    ) -> Result<Notification, StoreError> {
        let notification = Notification {
            notification_id: self
                .notification_sequence_generator
                .fetch_add(1, Ordering::Relaxed),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at: now_millis(),
        };
        self.notifications
            .write()
            .insert(notification.notification_id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .read()
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.notification_id.cmp(&a.notification_id));
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), StoreError> {
        self.notifications
            .write()
            .get_mut(&notification_id)
            .filter(|n| n.user_id == user_id)
            .map(|n| n.read = true)
            .ok_or(StoreError::NotificationNotFound(notification_id))
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u32, StoreError> {
        let mut marked = 0;
        for notification in self
            .notifications
            .write()
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            marked += 1;
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod in_memory_store_repository_tests {
    use crate::api::{
        BankAccount, Caller, NewTicket, OrderItem, OrderStatus, Payment, PaymentMethod,
        PaymentStatus, ProfilePatch, Role, SettlementRequest, SettlementStatus, SettlementVerdict,
        ShippingAddress, TicketMessage, TicketStatus, TransactionKind,
    };
    use crate::store_repository::{
        CommerceRepository, InMemoryStoreRepository, NewOrder, NewUser, OrderFilter, StoreError,
        SupportRepository, UsersRepository, WalletRepository,
    };

    fn new_user(email: &str, referred_by: Option<i32>) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Reader".to_string(),
            role: Role::Customer,
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
            referral_code: format!("code-{}", email),
            referred_by,
        }
    }

    fn new_order(user_id: i32, author_id: i32) -> NewOrder {
        NewOrder {
            user_id,
            items: vec![OrderItem {
                book_id: 7,
                title: "Dune".to_string(),
                author_id,
                unit_price: 1000,
                quantity: 2,
            }],
            shipping_address: ShippingAddress {
                full_name: "Jane Reader".to_string(),
                line1: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                postal_code: "12345".to_string(),
                country: "US".to_string(),
                phone: "555-0100".to_string(),
            },
            payment: Payment {
                method: PaymentMethod::CashOnDelivery,
                status: PaymentStatus::Pending,
                gateway_order_id: None,
                gateway_payment_id: None,
            },
            subtotal: 2000,
            tax: 360,
            total: 2360,
        }
    }

    #[tokio::test]
    async fn test_users_credentials_and_sessions() {
        let repo = InMemoryStoreRepository::default();
        let referrer = repo.add_user(new_user("a@x.io", None)).await.unwrap();
        let referee = repo
            .add_user(new_user("b@x.io", Some(referrer)))
            .await
            .unwrap();

        let duplicate = repo.add_user(new_user("A@X.io", None)).await;
        assert!(matches!(duplicate, Err(StoreError::EmailTaken(..))));

        let credentials = repo.find_credentials("B@x.io").await.unwrap().unwrap();
        assert_eq!(credentials.user_id, referee);
        assert_eq!(
            repo.find_by_referral_code("code-a@x.io").await.unwrap(),
            Some(referrer)
        );
        assert_eq!(
            repo.list_referred_users(referrer).await.unwrap(),
            vec![referee]
        );

        let renamed = repo
            .update_profile(
                referee,
                ProfilePatch {
                    name: Some("Bea".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Bea");
        assert!(matches!(
            repo.update_profile(
                referee,
                ProfilePatch {
                    name: None,
                    email: Some("a@x.io".to_string()),
                },
            )
            .await,
            Err(StoreError::EmailTaken(..))
        ));

        let caller = Caller {
            user_id: referee,
            role: Role::Customer,
        };
        repo.create_session("token", caller).await.unwrap();
        assert_eq!(repo.find_session("token").await.unwrap(), Some(caller));
        repo.delete_session("token").await.unwrap();
        assert_eq!(repo.find_session("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cart_keeps_one_line_per_book() {
        let repo = InMemoryStoreRepository::default();
        repo.set_cart_quantity(1, 10, 1).await.unwrap();
        repo.set_cart_quantity(1, 11, 1).await.unwrap();
        repo.set_cart_quantity(1, 10, 3).await.unwrap();

        let cart = repo.get_cart(1).await.unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].book_id, 10);
        assert_eq!(cart[0].quantity, 3);

        repo.remove_from_cart(1, 10).await.unwrap();
        assert_eq!(repo.get_cart(1).await.unwrap().len(), 1);
        repo.clear_cart(1).await.unwrap();
        assert!(repo.get_cart(1).await.unwrap().is_empty());

        repo.add_to_wishlist(1, 5).await.unwrap();
        repo.add_to_wishlist(1, 5).await.unwrap();
        assert_eq!(repo.get_wishlist(1).await.unwrap(), vec![5]);
        repo.remove_from_wishlist(1, 5).await.unwrap();
        assert!(repo.get_wishlist(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_update_requires_expected_status() {
        let repo = InMemoryStoreRepository::default();
        let order = repo.create_order(new_order(1, 9)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.history.len(), 1);

        let mut confirmed = order.clone();
        confirmed.status = OrderStatus::Confirmed;
        repo.update_order(confirmed.clone(), OrderStatus::Pending)
            .await
            .unwrap();

        let stale = repo.update_order(confirmed, OrderStatus::Pending).await;
        assert!(matches!(stale, Err(StoreError::OrderChanged(..))));

        assert_eq!(repo.list_orders(OrderFilter::Author(9)).await.unwrap().len(), 1);
        assert!(repo
            .list_orders(OrderFilter::Customer(2))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.list_orders(OrderFilter::Statuses(vec![OrderStatus::Confirmed]))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_wallet_never_goes_negative() {
        let repo = InMemoryStoreRepository::default();
        repo.credit(1, 500, TransactionKind::ReferralReward, "Referral")
            .await
            .unwrap();
        let overdraft = repo
            .debit(1, 600, TransactionKind::OrderPayment, "Order 1")
            .await;
        assert!(matches!(
            overdraft,
            Err(StoreError::InsufficientFunds {
                balance: 500,
                required: 600,
                ..
            })
        ));
        repo.debit(1, 200, TransactionKind::OrderPayment, "Order 1")
            .await
            .unwrap();

        let wallet = repo.get_wallet(1).await.unwrap();
        assert_eq!(wallet.balance, 300);
        assert_eq!(wallet.transactions[0].amount, -200);
        assert_eq!(repo.get_wallet(2).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_decided_settlement_stays_decided() {
        let repo = InMemoryStoreRepository::default();
        repo.credit(3, 1000, TransactionKind::Royalty, "Royalty")
            .await
            .unwrap();
        let request = SettlementRequest {
            amount: 800,
            bank_account: BankAccount {
                account_holder: "Author".to_string(),
                account_number: "000123".to_string(),
                routing_code: "XYZ".to_string(),
            },
        };
        let rejected = repo.create_settlement(3, request.clone()).await.unwrap();
        let approved = repo.create_settlement(3, request).await.unwrap();

        let decided = repo
            .decide_settlement(
                rejected.settlement_id,
                SettlementVerdict::Reject,
                Some("Wrong account".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(decided.status, SettlementStatus::Rejected);
        assert!(matches!(
            repo.decide_settlement(rejected.settlement_id, SettlementVerdict::Approve, None)
                .await,
            Err(StoreError::SettlementAlreadyDecided(..))
        ));

        repo.decide_settlement(approved.settlement_id, SettlementVerdict::Approve, None)
            .await
            .unwrap();
        assert_eq!(repo.get_wallet(3).await.unwrap().balance, 200);

        let pending = repo
            .list_settlements(Some(3), Some(SettlementStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(
            repo.get_settlement(rejected.settlement_id)
                .await
                .unwrap()
                .status,
            SettlementStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_tickets_and_notifications() {
        let repo = InMemoryStoreRepository::default();
        let ticket = repo
            .create_ticket(
                4,
                Role::Customer,
                NewTicket {
                    subject: "Refund".to_string(),
                    message: "Where is my refund?".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);

        let answered = repo
            .add_ticket_message(
                ticket.ticket_id,
                TicketMessage {
                    author_id: 1,
                    author_role: Role::Admin,
                    body: "Looking into it".to_string(),
                    sent_at: ticket.created_at + 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(answered.status, TicketStatus::InProgress);
        assert_eq!(answered.messages.len(), 2);

        repo.set_ticket_status(ticket.ticket_id, TicketStatus::Closed)
            .await
            .unwrap();
        let closed = repo
            .add_ticket_message(
                ticket.ticket_id,
                TicketMessage {
                    author_id: 4,
                    author_role: Role::Customer,
                    body: "Thanks".to_string(),
                    sent_at: ticket.created_at + 2,
                },
            )
            .await;
        assert!(matches!(closed, Err(StoreError::TicketClosed(..))));
        assert_eq!(repo.list_tickets(Some(4)).await.unwrap().len(), 1);
        assert!(repo.list_tickets(Some(5)).await.unwrap().is_empty());

        let first = repo.push_notification(4, "Order shipped", "").await.unwrap();
        repo.push_notification(4, "Order delivered", "").await.unwrap();
        repo.push_notification(5, "Welcome", "").await.unwrap();

        repo.mark_notification_read(4, first.notification_id)
            .await
            .unwrap();
        assert!(matches!(
            repo.mark_notification_read(5, first.notification_id).await,
            Err(StoreError::NotificationNotFound(..))
        ));
        assert_eq!(repo.mark_all_notifications_read(4).await.unwrap(), 1);
        let notifications = repo.list_notifications(4).await.unwrap();
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.read));
        assert_eq!(notifications[0].title, "Order delivered");
    }
}
