//! Cart operations. Each one locks the cart row for its transaction so
//! concurrent requests of the same user apply one after the other.

use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::repo;
use super::repo_types::{Cart, CartChange};
use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    orders::{
        dto::OrderContact,
        repo_types::OrderAggregate,
        services::{place_order, NewOrder, OrderLine},
    },
    products::{self, repo_types::Product},
};

async fn load_product(conn: &mut PgConnection, id: Uuid) -> AppResult<Product> {
    products::repo::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

pub async fn get(db: &PgPool, user_id: Uuid) -> AppResult<Cart> {
    let mut tx = db.begin().await?;
    let cart = repo::lock_or_create(&mut *tx, user_id).await?;
    tx.commit().await?;
    Ok(cart)
}

pub async fn add_item(db: &PgPool, user_id: Uuid, product_id: Uuid, quantity: i32) -> AppResult<Cart> {
    let mut tx = db.begin().await?;
    let mut cart = repo::lock_or_create(&mut *tx, user_id).await?;
    let product = load_product(&mut *tx, product_id).await?;

    match cart.add(&product, quantity)? {
        CartChange::Merged { item_id, quantity } => {
            repo::set_quantity(&mut *tx, item_id, quantity).await?
        }
        CartChange::Added(item) => repo::insert_item(&mut *tx, &item).await?,
    }
    tx.commit().await?;
    info!(cart_id = %cart.id, %product_id, quantity, "cart item added");
    Ok(cart)
}

pub async fn update_item(db: &PgPool, user_id: Uuid, item_id: Uuid, quantity: i32) -> AppResult<Cart> {
    let mut tx = db.begin().await?;
    let mut cart = repo::lock_or_create(&mut *tx, user_id).await?;
    let product_id = cart.product_of(item_id)?;
    let product = load_product(&mut *tx, product_id).await?;

    cart.set_quantity(item_id, quantity, product.quantity)?;
    repo::set_quantity(&mut *tx, item_id, quantity).await?;
    tx.commit().await?;
    Ok(cart)
}

pub async fn remove_item(db: &PgPool, user_id: Uuid, item_id: Uuid) -> AppResult<Cart> {
    let mut tx = db.begin().await?;
    let mut cart = repo::lock_or_create(&mut *tx, user_id).await?;
    cart.remove(item_id)?;
    repo::delete_item(&mut *tx, item_id).await?;
    tx.commit().await?;
    Ok(cart)
}

pub async fn empty(db: &PgPool, user_id: Uuid) -> AppResult<Cart> {
    let mut tx = db.begin().await?;
    let mut cart = repo::lock_or_create(&mut *tx, user_id).await?;
    repo::clear(&mut *tx, cart.id).await?;
    tx.commit().await?;
    cart.clear();
    Ok(cart)
}

/// Turns the cart into an order at the prices it was filled with, then
/// empties it. Stock is reserved in the same transaction.
pub async fn checkout(db: &PgPool, buyer: &User, contact: OrderContact) -> AppResult<OrderAggregate> {
    let mut tx = db.begin().await?;
    let cart = repo::lock_or_create(&mut *tx, buyer.id).await?;
    if cart.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let lines = cart
        .items
        .iter()
        .map(|i| OrderLine {
            product_id: i.product_id,
            quantity: i.quantity,
            title: Some(i.title.clone()),
            amount: Some(i.amount),
        })
        .collect();
    let order = place_order(
        &mut *tx,
        NewOrder {
            contact,
            owner_id: Some(buyer.id),
            lines,
        },
    )
    .await?;
    repo::clear(&mut *tx, cart.id).await?;
    tx.commit().await?;

    info!(cart_id = %cart.id, order_id = %order.order.id, "cart checked out");
    Ok(order)
}
