use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::products::repo_types::Product;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("not enough quantity (only {available} left)")]
    NotEnough { available: i32 },

    #[error("invalid cart item")]
    InvalidItem,

    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// Returns `needed` when `available` covers it.
pub fn ensure_enough_quantity(available: i32, needed: i32) -> Result<i32, CartError> {
    if available < needed {
        return Err(CartError::NotEnough { available });
    }
    Ok(needed)
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub amount: Decimal, // sale price when the line was added
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub total_amount: Decimal,
}

/// What [`Cart::add`] did, so it can be written back.
#[derive(Debug, Clone, PartialEq)]
pub enum CartChange {
    Merged { item_id: Uuid, quantity: i32 },
    Added(CartItem),
}

impl Cart {
    pub fn new(id: Uuid, user_id: Uuid, items: Vec<CartItem>) -> Self {
        let mut cart = Cart {
            id,
            user_id,
            items,
            total_amount: Decimal::ZERO,
        };
        cart.refresh_total();
        cart
    }

    fn refresh_total(&mut self) {
        self.total_amount = self
            .items
            .iter()
            .map(|i| i.amount * Decimal::from(i.quantity))
            .sum();
    }

    /// Adds `quantity` units of `product`, merging into an existing line.
    /// Stock is checked against the merged quantity.
    pub fn add(&mut self, product: &Product, quantity: i32) -> Result<CartChange, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let change = match self.items.iter_mut().find(|i| i.product_id == product.id) {
            Some(line) => {
                let wanted = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::NotEnough {
                        available: product.quantity,
                    })?;
                line.quantity = ensure_enough_quantity(product.quantity, wanted)?;
                CartChange::Merged {
                    item_id: line.id,
                    quantity: line.quantity,
                }
            }
            None => {
                let item = CartItem {
                    id: Uuid::new_v4(),
                    cart_id: self.id,
                    product_id: product.id,
                    title: product.title.clone(),
                    quantity: ensure_enough_quantity(product.quantity, quantity)?,
                    amount: product.sale_price,
                };
                self.items.push(item.clone());
                CartChange::Added(item)
            }
        };
        self.refresh_total();
        Ok(change)
    }

    pub fn set_quantity(&mut self, item_id: Uuid, quantity: i32, available: i32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let line = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(CartError::InvalidItem)?;
        line.quantity = ensure_enough_quantity(available, quantity)?;
        self.refresh_total();
        Ok(())
    }

    pub fn remove(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or(CartError::InvalidItem)?;
        let item = self.items.remove(pos);
        self.refresh_total();
        Ok(item)
    }

    /// Product referenced by a cart line.
    pub fn product_of(&self, item_id: Uuid) -> Result<Uuid, CartError> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.product_id)
            .ok_or(CartError::InvalidItem)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_amount = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn product(price: &str, quantity: i32) -> Product {
        let now = OffsetDateTime::now_utc();
        Product {
            id: Uuid::new_v4(),
            title: "Dế Mèn phiêu lưu ký".into(),
            description: None,
            sale_price: price.parse().unwrap(),
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    fn empty_cart() -> Cart {
        Cart::new(Uuid::new_v4(), Uuid::new_v4(), vec![])
    }

    #[test]
    fn enough_quantity() {
        assert_eq!(ensure_enough_quantity(5, 5), Ok(5));
        assert_eq!(
            ensure_enough_quantity(2, 3),
            Err(CartError::NotEnough { available: 2 })
        );
        assert_eq!(
            CartError::NotEnough { available: 2 }.to_string(),
            "not enough quantity (only 2 left)"
        );
    }

    #[test]
    fn add_snapshots_product() {
        let mut cart = empty_cart();
        let p = product("12.50", 10);
        let change = cart.add(&p, 2).unwrap();
        let CartChange::Added(item) = change else {
            panic!("expected a new line");
        };
        assert_eq!(item.title, p.title);
        assert_eq!(item.amount, p.sale_price);
        assert_eq!(item.cart_id, cart.id);
        assert_eq!(cart.total_amount, "25.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn add_merges_and_rechecks_stock() {
        let mut cart = empty_cart();
        let p = product("3", 4);
        cart.add(&p, 3).unwrap();
        let item_id = cart.items[0].id;

        assert_eq!(cart.add(&p, 2), Err(CartError::NotEnough { available: 4 }));
        assert_eq!(cart.items[0].quantity, 3);

        assert_eq!(
            cart.add(&p, 1).unwrap(),
            CartChange::Merged {
                item_id,
                quantity: 4
            }
        );
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_amount, Decimal::from(12));
    }

    #[test]
    fn add_huge_quantity_onto_existing_line() {
        let mut cart = empty_cart();
        let p = product("1", 50);
        cart.add(&p, 1).unwrap();
        assert_eq!(
            cart.add(&p, i32::MAX),
            Err(CartError::NotEnough { available: 50 })
        );
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.total_amount, Decimal::from(1));
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = empty_cart();
        assert_eq!(cart.add(&product("1", 9), 0), Err(CartError::InvalidQuantity));
        assert!(cart.items.is_empty());
    }

    #[test]
    fn set_quantity_and_remove() {
        let mut cart = empty_cart();
        let p = product("2", 5);
        cart.add(&p, 1).unwrap();
        let id = cart.items[0].id;

        cart.set_quantity(id, 5, p.quantity).unwrap();
        assert_eq!(cart.total_amount, Decimal::from(10));
        assert_eq!(
            cart.set_quantity(id, 6, p.quantity),
            Err(CartError::NotEnough { available: 5 })
        );
        assert_eq!(
            cart.set_quantity(Uuid::new_v4(), 1, 5),
            Err(CartError::InvalidItem)
        );

        let removed = cart.remove(id).unwrap();
        assert_eq!(removed.product_id, p.id);
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, Decimal::ZERO);
    }

    #[test]
    fn product_of_unknown_line() {
        let mut cart = empty_cart();
        let p = product("1", 1);
        cart.add(&p, 1).unwrap();
        assert_eq!(cart.product_of(cart.items[0].id), Ok(p.id));
        assert_eq!(cart.product_of(Uuid::new_v4()), Err(CartError::InvalidItem));
        assert_eq!(CartError::InvalidItem.to_string(), "invalid cart item");
    }
}
