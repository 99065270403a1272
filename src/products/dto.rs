use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::repo_types::Product;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub sale_price: Decimal,
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sale_price: Option<Decimal>,
    pub quantity: Option<i32>,
}

pub(crate) fn check_price(price: Decimal) -> Result<Decimal, AppError> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("sale_price must not be negative".into()));
    }
    Ok(price)
}

pub(crate) fn check_stock(quantity: i32) -> Result<i32, AppError> {
    if quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn prices_and_stock() {
        assert!(check_price(Decimal::from_str("22.40").unwrap()).is_ok());
        assert!(check_price(Decimal::ZERO).is_ok());
        assert!(check_price(Decimal::from_str("-0.01").unwrap()).is_err());
        assert!(check_stock(0).is_ok());
        assert!(check_stock(-3).is_err());
    }

    #[test]
    fn price_accepts_string_or_number() {
        let a: CreateProductRequest =
            serde_json::from_str(r#"{"title":"Cookie","sale_price":"100.5"}"#).unwrap();
        assert_eq!(a.sale_price, Decimal::from_str("100.5").unwrap());
        assert_eq!(a.quantity, 0);

        let b: CreateProductRequest =
            serde_json::from_str(r#"{"title":"Cookie","sale_price":12,"quantity":3}"#).unwrap();
        assert_eq!(b.sale_price, Decimal::from(12));
    }
}
