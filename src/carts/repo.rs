use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::repo_types::{Cart, CartItem};

/// Loads the user's cart, creating an empty one on first use. The cart row
/// stays locked until the surrounding transaction ends.
pub async fn lock_or_create(conn: &mut PgConnection, user_id: Uuid) -> anyhow::Result<Cart> {
    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    let items = items_of(&mut *conn, id).await?;
    Ok(Cart::new(id, user_id, items))
}

pub async fn items_of<'e>(db: impl PgExecutor<'e>, cart_id: Uuid) -> anyhow::Result<Vec<CartItem>> {
    let rows = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, cart_id, product_id, title, quantity, amount
          FROM cart_items
         WHERE cart_id = $1
         ORDER BY created_at, id
        "#,
    )
    .bind(cart_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert_item<'e>(db: impl PgExecutor<'e>, item: &CartItem) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, title, quantity, amount)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(item.id)
    .bind(item.cart_id)
    .bind(item.product_id)
    .bind(&item.title)
    .bind(item.quantity)
    .bind(item.amount)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_quantity<'e>(db: impl PgExecutor<'e>, item_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
        .bind(item_id)
        .bind(quantity)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_item<'e>(db: impl PgExecutor<'e>, item_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(item_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn clear<'e>(db: impl PgExecutor<'e>, cart_id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
