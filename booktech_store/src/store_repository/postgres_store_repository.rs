use anyhow::Context;
use serde_json::json;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row, Statement};

use booktech_common::clock::now_millis;

use crate::api::{
    BookId, Caller, CartItem, NewTicket, Notification, NotificationId, Order, OrderId,
    OrderStatus, ProfilePatch, Role, Settlement, SettlementId, SettlementRequest,
    SettlementStatus, SettlementVerdict, SubscriptionTier, Ticket, TicketId, TicketMessage,
    TicketStatus, Transaction, TransactionKind, UserId, UserProfile, Wallet,
};
use crate::store_repository::StoreError::Other;
use crate::store_repository::{
    status_change, CommerceRepository, Credentials, NewOrder, NewUser, OrderFilter, StoreError,
    SupportRepository, UsersRepository, WalletRepository,
};

const SELECT_USERS: &str = "
    SELECT id, email, name, role, subscription, referral_code, referred_by, created_at
    FROM users";

const SELECT_SETTLEMENTS: &str = "
    SELECT id, user_id, amount, bank_account, status, requested_at, decided_at, note
    FROM settlements";

/// Inserts the transaction only if the balance stays non negative
const INSERT_TRANSACTION: &str = "
    INSERT INTO wallet_transactions (user_id, amount, kind, description, created_at)
    SELECT $1::INTEGER, $2::BIGINT, $3::TEXT, $4::TEXT, $5::BIGINT
    WHERE (SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE user_id = $1)
        + $2::BIGINT >= 0
    RETURNING id";

pub struct PostgresStoreRepository {
    client: Client,
    /// Serializes read-modify-write sequences on wallets, settlements and tickets
    write_lock: tokio::sync::Mutex<()>,
}

pub struct PostgresStoreRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
        .unwrap_or_default()
}

fn first_id(rows: &[Row]) -> Result<i32, StoreError> {
    Ok(rows
        .first()
        .ok_or_else(|| Other("Id not returned".to_string()))?
        .try_get(0)?)
}

impl PostgresStoreRepository {
    pub async fn init(config: PostgresStoreRepositoryConfig) -> anyhow::Result<Self> {
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
        CREATE TABLE IF NOT EXISTS users (
            id              SERIAL PRIMARY KEY,
            email           TEXT NOT NULL,
            name            TEXT NOT NULL,
            role            TEXT NOT NULL,
            subscription    TEXT NOT NULL,
            referral_code   TEXT NOT NULL UNIQUE,
            referred_by     INTEGER,
            password_hash   TEXT NOT NULL,
            password_salt   TEXT NOT NULL,
            created_at      BIGINT NOT NULL
            );
        CREATE UNIQUE INDEX IF NOT EXISTS users_email ON users (LOWER(email));
        CREATE TABLE IF NOT EXISTS sessions (
            token           TEXT PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            role            TEXT NOT NULL
            );
        ",
            )
            .await
            .context("Failed to setup users tables")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS cart_items (
            position        SERIAL,
            user_id         INTEGER NOT NULL,
            book_id         INTEGER NOT NULL,
            quantity        INTEGER NOT NULL,
            PRIMARY KEY (user_id, book_id)
            );
        CREATE TABLE IF NOT EXISTS wishlist_items (
            position        SERIAL,
            user_id         INTEGER NOT NULL,
            book_id         INTEGER NOT NULL,
            PRIMARY KEY (user_id, book_id)
            );
        CREATE TABLE IF NOT EXISTS orders (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            status          TEXT NOT NULL,
            params          JSONB
            );
        ",
            )
            .await
            .context("Failed to setup commerce tables")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS wallet_transactions (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            amount          BIGINT NOT NULL,
            kind            TEXT NOT NULL,
            description     TEXT NOT NULL,
            created_at      BIGINT NOT NULL
            );
        CREATE TABLE IF NOT EXISTS settlements (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            amount          BIGINT NOT NULL,
            bank_account    JSONB,
            status          TEXT NOT NULL,
            requested_at    BIGINT NOT NULL,
            decided_at      BIGINT,
            note            TEXT
            );
        CREATE TABLE IF NOT EXISTS tickets (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            updated_at      BIGINT NOT NULL,
            params          JSONB
            );
        CREATE TABLE IF NOT EXISTS notifications (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            title           TEXT NOT NULL,
            message         TEXT NOT NULL,
            read            BOOLEAN NOT NULL DEFAULT FALSE,
            created_at      BIGINT NOT NULL
            );
        ",
            )
            .await
            .context("Failed to setup wallet and support tables")?;

        Ok(Self {
            client,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn user_from_row(row: &Row) -> Result<UserProfile, StoreError> {
        let role: String = row.try_get(3)?;
        let subscription: String = row.try_get(4)?;
        Ok(UserProfile {
            user_id: row.try_get(0)?,
            email: row.try_get(1)?,
            name: row.try_get(2)?,
            role: Role::parse(&role).ok_or_else(|| Other(format!("Unknown role {}", role)))?,
            subscription: SubscriptionTier::parse(&subscription)
                .ok_or_else(|| Other(format!("Unknown subscription {}", subscription)))?,
            referral_code: row.try_get(5)?,
            referred_by: row.try_get(6)?,
            created_at: row.try_get(7)?,
        })
    }

    /// Orders keep their body in `params`, the id column is authoritative
    fn order_from_row(row: &Row) -> Result<Order, StoreError> {
        let mut order: Order = serde_json::from_value(row.try_get(1)?)?;
        order.order_id = row.try_get(0)?;
        Ok(order)
    }

    fn ticket_from_row(row: &Row) -> Result<Ticket, StoreError> {
        let mut ticket: Ticket = serde_json::from_value(row.try_get(1)?)?;
        ticket.ticket_id = row.try_get(0)?;
        Ok(ticket)
    }

    fn transaction_from_row(row: &Row) -> Result<Transaction, StoreError> {
        let kind: String = row.try_get(2)?;
        Ok(Transaction {
            transaction_id: row.try_get(0)?,
            amount: row.try_get(1)?,
            kind: TransactionKind::parse(&kind)
                .ok_or_else(|| Other(format!("Unknown transaction kind {}", kind)))?,
            description: row.try_get(3)?,
            created_at: row.try_get(4)?,
        })
    }

    fn settlement_from_row(row: &Row) -> Result<Settlement, StoreError> {
        let status: String = row.try_get(4)?;
        Ok(Settlement {
            settlement_id: row.try_get(0)?,
            user_id: row.try_get(1)?,
            amount: row.try_get(2)?,
            bank_account: serde_json::from_value(row.try_get(3)?)?,
            status: SettlementStatus::parse(&status)
                .ok_or_else(|| Other(format!("Unknown settlement status {}", status)))?,
            requested_at: row.try_get(5)?,
            decided_at: row.try_get(6)?,
            note: row.try_get(7)?,
        })
    }

    fn notification_from_row(row: &Row) -> Result<Notification, StoreError> {
        Ok(Notification {
            notification_id: row.try_get(0)?,
            user_id: row.try_get(1)?,
            title: row.try_get(2)?,
            message: row.try_get(3)?,
            read: row.try_get(4)?,
            created_at: row.try_get(5)?,
        })
    }

    async fn insert_transaction(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let created_at = now_millis();
        let rows = self
            .client
            .query(
                INSERT_TRANSACTION,
                &[&user_id, &amount, &kind.as_str(), &description, &created_at],
            )
            .await?;
        match rows.first() {
            Some(row) => Ok(Transaction {
                transaction_id: row.try_get(0)?,
                amount,
                kind,
                description: description.to_string(),
                created_at,
            }),
            None => Err(StoreError::InsufficientFunds {
                user_id,
                balance: self.balance(user_id).await?,
                required: -amount,
            }),
        }
    }

    async fn balance(&self, user_id: UserId) -> Result<i64, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM wallet_transactions WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok(rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()?
            .unwrap_or_default())
    }

    async fn store_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        self.client
            .execute(
                "UPDATE tickets SET updated_at = $1, params = $2 WHERE id = $3",
                &[&ticket.updated_at, &json!(ticket), &ticket.ticket_id],
            )
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UsersRepository for PostgresStoreRepository {
    async fn add_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO users (email, name, role, subscription, referral_code, referred_by, \
                 password_hash, password_salt, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
            )
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &user.email,
                    &user.name,
                    &user.role.as_str(),
                    &SubscriptionTier::Free.as_str(),
                    &user.referral_code,
                    &user.referred_by,
                    &user.password_hash,
                    &user.password_salt,
                    &now_millis(),
                ],
            )
            .await;

        match rows {
            Ok(rows) => first_id(&rows),
            Err(err) if is_unique_violation(&err) => Err(StoreError::EmailTaken(user.email)),
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserProfile, StoreError> {
        let rows = self
            .client
            .query(&format!("{} WHERE id = $1", SELECT_USERS), &[&user_id])
            .await?;
        Self::user_from_row(rows.first().ok_or(StoreError::UserNotFound(user_id))?)
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        let rows = self
            .client
            .query(&format!("{} ORDER BY id", SELECT_USERS), &[])
            .await?;
        rows.iter().map(Self::user_from_row).collect()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, role, password_hash, password_salt FROM users \
                 WHERE LOWER(email) = LOWER($1)",
                &[&email],
            )
            .await?;
        rows.first()
            .map(|row| {
                let role: String = row.try_get(1)?;
                Ok(Credentials {
                    user_id: row.try_get(0)?,
                    role: Role::parse(&role)
                        .ok_or_else(|| Other(format!("Unknown role {}", role)))?,
                    password_hash: row.try_get(2)?,
                    password_salt: row.try_get(3)?,
                })
            })
            .transpose()
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserId>, StoreError> {
        let rows = self
            .client
            .query("SELECT id FROM users WHERE referral_code = $1", &[&code])
            .await?;
        Ok(rows.first().map(|row| row.try_get(0)).transpose()?)
    }

    async fn list_referred_users(&self, referrer: UserId) -> Result<Vec<UserId>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id FROM users WHERE referred_by = $1 ORDER BY id",
                &[&referrer],
            )
            .await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email) \
                 WHERE id = $3",
                &[&patch.name, &patch.email, &user_id],
            )
            .await;
        match updated {
            Ok(0) => Err(StoreError::UserNotFound(user_id)),
            Ok(_) => self.get_user(user_id).await,
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::EmailTaken(patch.email.unwrap_or_default()))
            }
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
    ) -> Result<(), StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE users SET subscription = $1 WHERE id = $2",
                &[&tier.as_str(), &user_id],
            )
            .await?;
        if updated == 0 {
            Err(StoreError::UserNotFound(user_id))
        } else {
            Ok(())
        }
    }

    async fn create_session(&self, token: &str, caller: Caller) -> Result<(), StoreError> {
        self.client
            .execute(
                "INSERT INTO sessions (token, user_id, role) VALUES ($1, $2, $3)",
                &[&token, &caller.user_id, &caller.role.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Caller>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT user_id, role FROM sessions WHERE token = $1",
                &[&token],
            )
            .await?;
        rows.first()
            .map(|row| {
                let role: String = row.try_get(1)?;
                Ok(Caller {
                    user_id: row.try_get(0)?,
                    role: Role::parse(&role)
                        .ok_or_else(|| Other(format!("Unknown role {}", role)))?,
                })
            })
            .transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.client
            .execute("DELETE FROM sessions WHERE token = $1", &[&token])
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CommerceRepository for PostgresStoreRepository {
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.client
            .execute(
                "INSERT INTO cart_items (user_id, book_id, quantity) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, book_id) DO UPDATE SET quantity = EXCLUDED.quantity",
                &[&user_id, &book_id, &(quantity as i32)],
            )
            .await?;
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError> {
        self.client
            .execute(
                "DELETE FROM cart_items WHERE user_id = $1 AND book_id = $2",
                &[&user_id, &book_id],
            )
            .await?;
        Ok(())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT book_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY position",
                &[&user_id],
            )
            .await?;
        rows.iter()
            .map(|row| {
                let quantity: i32 = row.try_get(1)?;
                Ok(CartItem {
                    book_id: row.try_get(0)?,
                    quantity: quantity as u32,
                })
            })
            .collect()
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), StoreError> {
        self.client
            .execute("DELETE FROM cart_items WHERE user_id = $1", &[&user_id])
            .await?;
        Ok(())
    }

    async fn add_to_wishlist(&self, user_id: UserId, book_id: BookId) -> Result<(), StoreError> {
        self.client
            .execute(
                "INSERT INTO wishlist_items (user_id, book_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
                &[&user_id, &book_id],
            )
            .await?;
        Ok(())
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<(), StoreError> {
        self.client
            .execute(
                "DELETE FROM wishlist_items WHERE user_id = $1 AND book_id = $2",
                &[&user_id, &book_id],
            )
            .await?;
        Ok(())
    }

    async fn get_wishlist(&self, user_id: UserId) -> Result<Vec<BookId>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT book_id FROM wishlist_items WHERE user_id = $1 ORDER BY position",
                &[&user_id],
            )
            .await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let now = now_millis();
        let mut order = Order {
            order_id: 0,
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

        let stmt: Statement = self
            .client
            .prepare("INSERT INTO orders (user_id, status, params) VALUES ($1, $2, $3) RETURNING id")
            .await?;
        let rows = self
            .client
            .query(
                &stmt,
                &[&order.user_id, &order.status.as_str(), &json!(order)],
            )
            .await?;
        order.order_id = first_id(&rows)?;
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        let rows = self
            .client
            .query("SELECT id, params FROM orders WHERE id = $1", &[&order_id])
            .await?;
        Self::order_from_row(rows.first().ok_or(StoreError::OrderNotFound(order_id))?)
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = match &filter {
            OrderFilter::Customer(user_id) => {
                self.client
                    .query(
                        "SELECT id, params FROM orders WHERE user_id = $1 ORDER BY id DESC",
                        &[user_id],
                    )
                    .await?
            }
            _ => {
                self.client
                    .query("SELECT id, params FROM orders ORDER BY id DESC", &[])
                    .await?
            }
        };

        let mut orders = vec![];
        for row in rows.iter() {
            let order = Self::order_from_row(row)?;
            if filter.matches(&order) {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn update_order(
        &self,
        order: Order,
        expected_status: OrderStatus,
    ) -> Result<(), StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE orders SET status = $1, params = $2 WHERE id = $3 AND status = $4",
                &[
                    &order.status.as_str(),
                    &json!(order),
                    &order.order_id,
                    &expected_status.as_str(),
                ],
            )
            .await?;
        if updated > 0 {
            return Ok(());
        }
        // Distinguish a missing order from a concurrent status change
        self.get_order(order.order_id).await?;
        Err(StoreError::OrderChanged(order.order_id))
    }
}

#[async_trait::async_trait]
impl WalletRepository for PostgresStoreRepository {
    async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, amount, kind, description, created_at FROM wallet_transactions \
                 WHERE user_id = $1 ORDER BY id DESC",
                &[&user_id],
            )
            .await?;
        let transactions = rows
            .iter()
            .map(Self::transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Wallet {
            user_id,
            balance: transactions.iter().map(|t| t.amount).sum(),
            transactions,
        })
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.insert_transaction(user_id, amount.abs(), kind, description)
            .await
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Transaction, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.insert_transaction(user_id, -amount.abs(), kind, description)
            .await
    }

    async fn create_settlement(
        &self,
        user_id: UserId,
        request: SettlementRequest,
    ) -> Result<Settlement, StoreError> {
        let requested_at = now_millis();
        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO settlements (user_id, amount, bank_account, status, requested_at) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .await?;
        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &user_id,
                    &request.amount,
                    &json!(request.bank_account),
                    &SettlementStatus::Pending.as_str(),
                    &requested_at,
                ],
            )
            .await?;
        Ok(Settlement {
            settlement_id: first_id(&rows)?,
            user_id,
            amount: request.amount,
            bank_account: request.bank_account,
            status: SettlementStatus::Pending,
            requested_at,
            decided_at: None,
            note: None,
        })
    }

    async fn get_settlement(&self, settlement_id: SettlementId) -> Result<Settlement, StoreError> {
        let rows = self
            .client
            .query(
                &format!("{} WHERE id = $1", SELECT_SETTLEMENTS),
                &[&settlement_id],
            )
            .await?;
        Self::settlement_from_row(
            rows.first()
                .ok_or(StoreError::SettlementNotFound(settlement_id))?,
        )
    }

    async fn list_settlements(
        &self,
        user_id: Option<UserId>,
        status: Option<SettlementStatus>,
    ) -> Result<Vec<Settlement>, StoreError> {
        let rows = self
            .client
            .query(
                &format!(
                    "{} WHERE ($1::INTEGER IS NULL OR user_id = $1) \
                     AND ($2::TEXT IS NULL OR status = $2) ORDER BY id DESC",
                    SELECT_SETTLEMENTS
                ),
                &[&user_id, &status.map(|s| s.as_str())],
            )
            .await?;
        rows.iter().map(Self::settlement_from_row).collect()
    }

    async fn decide_settlement(
        &self,
        settlement_id: SettlementId,
        verdict: SettlementVerdict,
        note: Option<String>,
    ) -> Result<Settlement, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut settlement = self.get_settlement(settlement_id).await?;
        if settlement.status != SettlementStatus::Pending {
            return Err(StoreError::SettlementAlreadyDecided(settlement_id));
        }

        settlement.status = match verdict {
            SettlementVerdict::Approve => {
                self.insert_transaction(
                    settlement.user_id,
                    -settlement.amount,
                    TransactionKind::Settlement,
                    &format!("Settlement {}", settlement_id),
                )
                .await?;
                SettlementStatus::Completed
            }
            SettlementVerdict::Reject => SettlementStatus::Rejected,
        };
        settlement.decided_at = Some(now_millis());
        settlement.note = note;

        self.client
            .execute(
                "UPDATE settlements SET status = $1, decided_at = $2, note = $3 \
                 WHERE id = $4 AND status = $5",
                &[
                    &settlement.status.as_str(),
                    &settlement.decided_at,
                    &settlement.note,
                    &settlement_id,
                    &SettlementStatus::Pending.as_str(),
                ],
            )
            .await?;
        Ok(settlement)
    }
}

#[async_trait::async_trait]
impl SupportRepository for PostgresStoreRepository {
    async fn create_ticket(
        &self,
        user_id: UserId,
        role: Role,
        ticket: NewTicket,
    ) -> Result<Ticket, StoreError> {
        let now = now_millis();
        let mut ticket = Ticket {
            ticket_id: 0,
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
        let rows = self
            .client
            .query(
                "INSERT INTO tickets (user_id, updated_at, params) VALUES ($1, $2, $3) RETURNING id",
                &[&user_id, &now, &json!(ticket)],
            )
            .await?;
        ticket.ticket_id = first_id(&rows)?;
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        let rows = self
            .client
            .query("SELECT id, params FROM tickets WHERE id = $1", &[&ticket_id])
            .await?;
        Self::ticket_from_row(rows.first().ok_or(StoreError::TicketNotFound(ticket_id))?)
    }

    async fn list_tickets(&self, user_id: Option<UserId>) -> Result<Vec<Ticket>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, params FROM tickets WHERE ($1::INTEGER IS NULL OR user_id = $1) \
                 ORDER BY updated_at DESC, id DESC",
                &[&user_id],
            )
            .await?;
        rows.iter().map(Self::ticket_from_row).collect()
    }

    async fn add_ticket_message(
        &self,
        ticket_id: TicketId,
        message: TicketMessage,
    ) -> Result<Ticket, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut ticket = self.get_ticket(ticket_id).await?;
        ticket.status = ticket
            .status_after_reply(message.author_role)
            .ok_or(StoreError::TicketClosed(ticket_id))?;
        ticket.updated_at = message.sent_at;
        ticket.messages.push(message);
        self.store_ticket(&ticket).await?;
        Ok(ticket)
    }

    async fn set_ticket_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut ticket = self.get_ticket(ticket_id).await?;
        ticket.status = status;
        ticket.updated_at = now_millis();
        self.store_ticket(&ticket).await?;
        Ok(ticket)
    }

    async fn push_notification(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
    ) -> Result<Notification, StoreError> {
        let created_at = now_millis();
        let rows = self
            .client
            .query(
                "INSERT INTO notifications (user_id, title, message, created_at) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[&user_id, &title, &message, &created_at],
            )
            .await?;
        Ok(Notification {
            notification_id: first_id(&rows)?,
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at,
        })
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, user_id, title, message, read, created_at FROM notifications \
                 WHERE user_id = $1 ORDER BY id DESC",
                &[&user_id],
            )
            .await?;
        rows.iter().map(Self::notification_from_row).collect()
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
                &[&notification_id, &user_id],
            )
            .await?;
        if updated == 0 {
            Err(StoreError::NotificationNotFound(notification_id))
        } else {
            Ok(())
        }
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u32, StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read",
                &[&user_id],
            )
            .await?;
        Ok(updated as u32)
    }
}
