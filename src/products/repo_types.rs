use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub sale_price: Decimal,
    pub quantity: i32, // units in stock
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Product fields embedded in order and cart details.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub sale_price: Decimal,
    pub quantity: i32,
}
