use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub type UserId = i32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Author,
    Admin,
    DeliveryBoy,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Author => "author",
            Role::Admin => "admin",
            Role::DeliveryBoy => "delivery_boy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Role::Customer),
            "author" => Some(Role::Author),
            "admin" => Some(Role::Admin),
            "delivery_boy" => Some(Role::DeliveryBoy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
/// Authenticated principal resolved from a bearer token
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when the caller is the given user or an admin
    pub fn can_act_for(&self, user_id: UserId) -> bool {
        self.user_id == user_id || self.is_admin()
    }
}
