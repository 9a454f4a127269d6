use anyhow::{bail, Context};
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    BookId, Caller, CartQuantity, CartView, CheckoutRequest, CheckoutResponse, LoginRequest,
    NewTicket, NotificationsOverview, Order, OrderId, OrderStatus, OrderStatusUpdate,
    PaymentConfirmation, ReferralSummary, SessionResponse, Settlement, SettlementDecision,
    SettlementId, SettlementRequest, SignupRequest, SubscriptionTier, SubscriptionUpdate, Ticket,
    TicketId, TicketReply, UserId, UserProfile, Wallet,
};

pub struct BookTechStoreClient {
    url: String,
    token: Option<String>,
    client: ClientWithMiddleware,
}

impl BookTechStoreClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            url: url.to_string(),
            token: None,
            client,
        })
    }

    /// Sends the bearer token with every request
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn created_user(response: reqwest::Response) -> anyhow::Result<UserId> {
        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to add user {}", error)
        }

        let location_header = response
            .headers()
            .get(LOCATION)
            .context("No location header")?;

        location_header
            .to_str()
            .context("Failed to convert header to str")?
            .strip_prefix("/api/user/")
            .context("Invalid location header")?
            .parse()
            .context("Failed to parse user id")
    }

    /// Calls POST /api/user endpoint
    /// Returns user_id of the registered user
    pub async fn signup(&self, request: &SignupRequest) -> anyhow::Result<UserId> {
        let response = self
            .client
            .post(format!("{}/api/user", self.url))
            .json(request)
            .send()
            .await?;
        Self::created_user(response).await
    }

    /// Calls POST /api/users endpoint, admin only
    pub async fn create_user(&self, request: &SignupRequest) -> anyhow::Result<UserId> {
        let response = self
            .authorized(self.client.post(format!("{}/api/users", self.url)))
            .json(request)
            .send()
            .await?;
        Self::created_user(response).await
    }

    /// Calls POST /api/session endpoint
    /// None when the credentials are wrong
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<Option<SessionResponse>> {
        let response = self
            .client
            .post(format!("{}/api/session", self.url))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to log in: {}", response.status())
        }
    }

    /// Calls GET /api/session endpoint
    /// None when the token is not a live session
    pub async fn whoami(&self) -> anyhow::Result<Option<Caller>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/session", self.url)))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to resolve session: {}", response.status())
        }
    }

    /// Calls DELETE /api/session endpoint
    pub async fn logout(&self) -> anyhow::Result<()> {
        let response = self
            .authorized(self.client.delete(format!("{}/api/session", self.url)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to log out: {}", response.status())
        }
    }

    /// Calls GET /api/user/{user_id} endpoint
    pub async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<UserProfile>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/user/{}", self.url, user_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get user {}: {}", user_id, response.status())
        }
    }

    /// Calls PUT /api/user/{user_id}/subscription endpoint
    pub async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
    ) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/api/user/{}/subscription", self.url, user_id)),
            )
            .json(&SubscriptionUpdate { tier })
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to change subscription: {}", response.status())
        }
    }

    /// Calls GET /api/user/{user_id}/referrals endpoint
    pub async fn get_referrals(&self, user_id: UserId) -> anyhow::Result<ReferralSummary> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/api/user/{}/referrals", self.url, user_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get referrals: {}", response.status())
        }
    }

    /// Calls PUT /api/user/{user_id}/cart/{book_id} endpoint
    /// Returns false if the book cannot be bought
    pub async fn set_cart_item(
        &self,
        user_id: UserId,
        book_id: BookId,
        quantity: u32,
    ) -> anyhow::Result<bool> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/api/user/{}/cart/{}", self.url, user_id, book_id)),
            )
            .json(&CartQuantity { quantity })
            .send()
            .await?;
        if response.status() == StatusCode::BAD_REQUEST {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            bail!("Failed to update cart: {}", response.status())
        }
    }

    /// Calls DELETE /api/user/{user_id}/cart/{book_id} endpoint
    pub async fn remove_cart_item(&self, user_id: UserId, book_id: BookId) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/api/user/{}/cart/{}", self.url, user_id, book_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to remove cart item: {}", response.status())
        }
    }

    /// Calls GET /api/user/{user_id}/cart endpoint
    pub async fn get_cart(&self, user_id: UserId) -> anyhow::Result<CartView> {
        let response = self
            .authorized(self.client.get(format!("{}/api/user/{}/cart", self.url, user_id)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get cart: {}", response.status())
        }
    }

    /// Calls POST /api/user/{user_id}/wishlist/{book_id} endpoint
    pub async fn add_to_wishlist(&self, user_id: UserId, book_id: BookId) -> anyhow::Result<()> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/user/{}/wishlist/{}", self.url, user_id, book_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Failed to add book {} to wishlist: {}", book_id, response.status())
        }
    }

    /// Calls GET /api/user/{user_id}/wishlist endpoint
    pub async fn get_wishlist(&self, user_id: UserId) -> anyhow::Result<Vec<BookId>> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/api/user/{}/wishlist", self.url, user_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get wishlist: {}", response.status())
        }
    }

    /// Calls POST /api/user/{user_id}/orders endpoint
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> anyhow::Result<CheckoutResponse> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/user/{}/orders", self.url, user_id)),
            )
            .json(request)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let error: String = response.json().await.unwrap_or_default();
            bail!("Checkout failed with {} {}", status, error)
        }
    }

    /// Calls GET /api/user/{user_id}/orders endpoint
    pub async fn get_user_orders(&self, user_id: UserId) -> anyhow::Result<Vec<Order>> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/api/user/{}/orders", self.url, user_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get orders: {}", response.status())
        }
    }

    /// Calls GET /api/orders endpoint
    /// Orders the caller manages, depends on the caller's role
    pub async fn get_managed_orders(&self) -> anyhow::Result<Vec<Order>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/orders", self.url)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get orders: {}", response.status())
        }
    }

    /// Calls GET /api/order/{order_id} endpoint
    pub async fn get_order(&self, order_id: OrderId) -> anyhow::Result<Option<Order>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/order/{}", self.url, order_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get order {}: {}", order_id, response.status())
        }
    }

    /// Calls PUT /api/order/{order_id}/status endpoint
    /// Returns false if the caller may not make the change or the order moved on
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> anyhow::Result<bool> {
        let response = self
            .authorized(
                self.client
                    .put(format!("{}/api/order/{}/status", self.url, order_id)),
            )
            .json(&OrderStatusUpdate { status })
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::CONFLICT
        ) {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            bail!("Failed to update order {}: {}", order_id, response.status())
        }
    }

    /// Calls POST /api/order/{order_id}/payment endpoint
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        gateway_payment_id: &str,
    ) -> anyhow::Result<Order> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/order/{}/payment", self.url, order_id)),
            )
            .json(&PaymentConfirmation {
                gateway_payment_id: gateway_payment_id.to_string(),
            })
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to confirm payment of order {}: {}", order_id, response.status())
        }
    }

    /// Calls GET /api/user/{user_id}/wallet endpoint
    pub async fn get_wallet(&self, user_id: UserId) -> anyhow::Result<Wallet> {
        let response = self
            .authorized(self.client.get(format!("{}/api/user/{}/wallet", self.url, user_id)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get wallet: {}", response.status())
        }
    }

    /// Calls POST /api/user/{user_id}/settlements endpoint
    /// None when the balance does not cover the amount
    pub async fn request_settlement(
        &self,
        user_id: UserId,
        request: &SettlementRequest,
    ) -> anyhow::Result<Option<Settlement>> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/user/{}/settlements", self.url, user_id)),
            )
            .json(request)
            .send()
            .await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to request settlement {}", error)
        }
    }

    /// Calls PUT /api/settlement/{settlement_id}/decision endpoint, admin only
    pub async fn decide_settlement(
        &self,
        settlement_id: SettlementId,
        decision: &SettlementDecision,
    ) -> anyhow::Result<Settlement> {
        let response = self
            .authorized(self.client.put(format!(
                "{}/api/settlement/{}/decision",
                self.url, settlement_id
            )))
            .json(decision)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to decide settlement {} {}", settlement_id, error)
        }
    }

    /// Calls POST /api/user/{user_id}/tickets endpoint
    pub async fn create_ticket(&self, user_id: UserId, ticket: &NewTicket) -> anyhow::Result<Ticket> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/user/{}/tickets", self.url, user_id)),
            )
            .json(ticket)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to open ticket {}", error)
        }
    }

    /// Calls POST /api/ticket/{ticket_id}/messages endpoint
    pub async fn reply_to_ticket(&self, ticket_id: TicketId, body: &str) -> anyhow::Result<Ticket> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/api/ticket/{}/messages", self.url, ticket_id)),
            )
            .json(&TicketReply {
                body: body.to_string(),
            })
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to reply to ticket {}: {}", ticket_id, response.status())
        }
    }

    /// Calls GET /api/user/{user_id}/notifications endpoint
    pub async fn get_notifications(&self, user_id: UserId) -> anyhow::Result<NotificationsOverview> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/api/user/{}/notifications", self.url, user_id)),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to get notifications: {}", response.status())
        }
    }

    /// Calls POST /api/user/{user_id}/notifications/read endpoint
    /// Returns how many notifications were unread
    pub async fn mark_all_notifications_read(&self, user_id: UserId) -> anyhow::Result<u32> {
        let response = self
            .authorized(self.client.post(format!(
                "{}/api/user/{}/notifications/read",
                self.url, user_id
            )))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to mark notifications read: {}", response.status())
        }
    }
}
