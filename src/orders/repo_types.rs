use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{dto::PublicUser, repo_types::Gender};
use crate::error::ParseEnumError;
use crate::products::repo_types::ProductSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Submitted,
    Success,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::Success => "success",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Only submitted orders move; success and cancelled are final.
    /// Re-setting the current status is always allowed and changes nothing.
    pub fn can_become(self, next: OrderStatus) -> bool {
        self == next || self == OrderStatus::Submitted
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "submitted" => Ok(OrderStatus::Submitted),
            "success" => Ok(OrderStatus::Success),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseEnumError {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub receiver_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub total_cost: Decimal,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub note: Option<String>,
    pub owner_id: Option<Uuid>, // None for guest checkouts
    pub saler_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub amount: Decimal, // unit price
    pub total_amount: Decimal,
}

/// An order together with its items: the unit the save pipeline works on.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAggregate {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderAggregate {
    /// Sets `total_amount = amount * quantity` on every item and
    /// `total_cost` to their sum. Returns the ids of items whose stored
    /// total was wrong.
    pub fn recompute_totals(&mut self) -> Vec<Uuid> {
        let mut corrected = Vec::new();
        let mut total = Decimal::ZERO;
        for item in &mut self.items {
            let line = item.amount * Decimal::from(item.quantity);
            if item.total_amount != line {
                item.total_amount = line;
                corrected.push(item.id);
            }
            total += line;
        }
        self.order.total_cost = total;
        corrected
    }
}

/// Row of the order listings: the order plus its saler's name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub saler_name: Option<String>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

/// An item joined with the product it references.
#[derive(Debug, Clone, FromRow)]
pub struct ItemProductRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub amount: Decimal,
    pub total_amount: Decimal,
    pub product_title: String,
    pub product_sale_price: Decimal,
    pub product_quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetails {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: ProductSummary,
}

impl From<ItemProductRow> for OrderItemDetails {
    fn from(r: ItemProductRow) -> Self {
        Self {
            product: ProductSummary {
                id: r.product_id,
                title: r.product_title,
                sale_price: r.product_sale_price,
                quantity: r.product_quantity,
            },
            item: OrderItem {
                id: r.id,
                order_id: r.order_id,
                product_id: r.product_id,
                title: r.title,
                quantity: r.quantity,
                amount: r.amount,
                total_amount: r.total_amount,
            },
        }
    }
}

/// Fully populated order: owner, saler and products resolved.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub owner: Option<PublicUser>,
    pub saler: Option<PublicUser>,
    pub items: Vec<OrderItemDetails>,
}

/// Number of orders currently assigned to an active saler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct SalerLoad {
    pub saler_id: Uuid,
    pub orders: i64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn order(status: OrderStatus) -> Order {
        let now = OffsetDateTime::now_utc();
        Order {
            id: Uuid::new_v4(),
            receiver_name: "Anh".into(),
            address: "Can Tho".into(),
            phone: "0387897777878".into(),
            email: "testing@gmail.com".into(),
            gender: Gender::M,
            total_cost: Decimal::ZERO,
            status,
            note: None,
            owner_id: None,
            saler_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(order_id: Uuid, quantity: i32, amount: &str) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            title: "cookie".into(),
            quantity,
            amount: amount.parse().unwrap(),
            total_amount: Decimal::ZERO,
        }
    }
}
