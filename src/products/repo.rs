use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::repo_types::Product;

pub async fn list<'e>(
    db: impl PgExecutor<'e>,
    search: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, title, description, sale_price, quantity, created_at, updated_at
          FROM products
         WHERE $1::text IS NULL OR strpos(lower(title), lower($1)) > 0
         ORDER BY created_at DESC, id
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search)
    .bind(limit)
    .bind(offset.unwrap_or(0))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count<'e>(db: impl PgExecutor<'e>, search: Option<&str>) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE $1::text IS NULL OR strpos(lower(title), lower($1)) > 0",
    )
    .bind(search)
    .fetch_one(db)
    .await?;
    Ok(n)
}

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, title, description, sale_price, quantity, created_at, updated_at
          FROM products
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn create<'e>(
    db: impl PgExecutor<'e>,
    title: &str,
    description: Option<&str>,
    sale_price: Decimal,
    quantity: i32,
) -> anyhow::Result<Product> {
    let row = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (title, description, sale_price, quantity)
        VALUES ($1, $2, $3, $4)
        RETURNING id, title, description, sale_price, quantity, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(sale_price)
    .bind(quantity)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Partial update; `None` keeps the stored value.
pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    sale_price: Option<Decimal>,
    quantity: Option<i32>,
) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
           SET title = COALESCE($2, title),
               description = COALESCE($3, description),
               sale_price = COALESCE($4, sale_price),
               quantity = COALESCE($5, quantity),
               updated_at = now()
         WHERE id = $1
        RETURNING id, title, description, sale_price, quantity, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(sale_price)
    .bind(quantity)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Takes `quantity` units out of stock. Returns `None` when the product
/// does not exist or has fewer units left; nothing is changed then.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    id: Uuid,
    quantity: i32,
) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
           SET quantity = quantity - $2, updated_at = now()
         WHERE id = $1 AND quantity >= $2
        RETURNING id, title, description, sale_price, quantity, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Puts `quantity` units back into stock.
pub async fn restock(conn: &mut PgConnection, id: Uuid, quantity: i32) -> anyhow::Result<()> {
    sqlx::query("UPDATE products SET quantity = quantity + $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
