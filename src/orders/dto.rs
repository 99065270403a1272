use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::OrderSummary;
use crate::auth::repo_types::Gender;
use crate::error::{AppError, AppResult};
use crate::validation::{is_valid_email, is_valid_phone, required};

/// Receiver fields typed at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub receiver_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub note: Option<String>,
}

/// Validated and normalized [`ContactRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderContact {
    pub receiver_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub gender: Gender,
    pub note: Option<String>,
}

impl ContactRequest {
    pub fn validate(self) -> AppResult<OrderContact> {
        let email = self.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::BadRequest("Invalid email".into()));
        }
        let phone = required("phone", &self.phone)?;
        if !is_valid_phone(&phone) {
            return Err(AppError::BadRequest("This is not a phone number".into()));
        }
        Ok(OrderContact {
            receiver_name: required("receiver_name", &self.receiver_name)?,
            address: required("address", &self.address)?,
            phone,
            email,
            gender: self.gender.parse()?,
            note: self
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct GuestCheckoutRequest {
    #[serde(flatten)]
    pub contact: ContactRequest,
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderSummary>,
    pub count: i64,
}

impl OrderList {
    pub fn empty() -> Self {
        OrderList {
            orders: Vec::new(),
            count: 0,
        }
    }
}

/// Body of `PATCH /orders/saleManager/:id`.
#[derive(Debug, Deserialize)]
pub struct ManagerPatch {
    pub status: Option<String>,
    pub saler: Option<Uuid>,
}

/// Body of `PATCH /orders/saler/:id`.
#[derive(Debug, Deserialize)]
pub struct SalerPatch {
    pub status: Option<String>,
}
